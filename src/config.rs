#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;

use crate::backend::RequestConfig;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature; low to favour consistent grading.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;

/// Default per-attempt request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default pause before the single retry, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// OpenAI credentials and endpoint sourced from the environment.
#[derive(Clone)]
pub struct OpenAiEnv {
    /// Base URL for the OpenAI-compatible API endpoint.
    api_base: String,
    /// API key used to authenticate OpenAI requests.
    api_key:  String,
    /// Model identifier for chat completions.
    model:    String,
}

impl OpenAiEnv {
    /// Bundles explicit credentials.
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key:  api_key.into(),
            model:    model.into(),
        }
    }

    /// Returns the API base URL used for OpenAI requests.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the API key used for OpenAI requests.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEnv")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Everything a grading pipeline needs to reach its backend.
///
/// Built once at startup and handed to [`crate::backend::OpenAiBackend`];
/// nothing in the crate reads the environment after that.
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Backend credentials.
    openai:      OpenAiEnv,
    /// Per-request generation settings.
    request:     RequestConfig,
    /// Shared reqwest HTTP client reused across backend calls.
    http_client: Client,
}

impl GraderConfig {
    /// Bundles explicit settings with a fresh HTTP client.
    pub fn new(openai: OpenAiEnv, request: RequestConfig) -> Result<Self> {
        let http_client = Client::builder()
            // Avoid macOS dynamic store lookups that fail in sandboxed environments.
            .no_proxy()
            .build()
            .context("Failed to construct shared HTTP client")?;

        Ok(Self {
            openai,
            request,
            http_client,
        })
    }

    /// Reads the configuration from process environment variables.
    ///
    /// A missing `OPENAI_API_KEY` is an error here, at startup, rather than on
    /// every request.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let Some(api_key) = read("OPENAI_API_KEY") else {
            bail!("OPENAI_API_KEY must be set to reach the grading backend.");
        };
        let api_base = read("OPENAI_ENDPOINT").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = read("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match read("GRADEMARK_TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .with_context(|| format!("GRADEMARK_TEMPERATURE `{raw}` is not a number"))?,
            None => DEFAULT_TEMPERATURE,
        };
        let max_output_tokens = match read("GRADEMARK_MAX_OUTPUT_TOKENS") {
            Some(raw) => raw.parse::<u32>().with_context(|| {
                format!("GRADEMARK_MAX_OUTPUT_TOKENS `{raw}` is not a positive integer")
            })?,
            None => DEFAULT_MAX_OUTPUT_TOKENS,
        };

        let request = RequestConfig::builder()
            .temperature(temperature)
            .max_output_tokens(max_output_tokens)
            .request_timeout(read_duration(
                "GRADEMARK_TIMEOUT_SECS",
                read("GRADEMARK_TIMEOUT_SECS"),
                Duration::from_secs,
                DEFAULT_TIMEOUT_SECS,
            )?)
            .retry_backoff(read_duration(
                "GRADEMARK_RETRY_BACKOFF_MS",
                read("GRADEMARK_RETRY_BACKOFF_MS"),
                Duration::from_millis,
                DEFAULT_RETRY_BACKOFF_MS,
            )?)
            .build()
            .validated()?;

        Self::new(OpenAiEnv::new(api_base, api_key, model), request)
    }

    /// Returns the backend credentials.
    pub fn openai(&self) -> &OpenAiEnv {
        &self.openai
    }

    /// Returns the per-request generation settings.
    pub fn request(&self) -> &RequestConfig {
        &self.request
    }

    /// Returns a clone of the shared reqwest HTTP client.
    pub fn http_client(&self) -> Client {
        self.http_client.clone()
    }
}

/// Parses an integer duration read from `key`, using `default` when the value
/// is missing.
fn read_duration(
    key: &str,
    raw: Option<String>,
    unit: fn(u64) -> Duration,
    default: u64,
) -> Result<Duration> {
    let amount = match raw {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("{key} `{value}` is not a non-negative integer"))?,
        None => default,
    };
    Ok(unit(amount))
}
