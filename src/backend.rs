#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Access to the generative text service that does the actual grading.

use std::{future::Future, time::Duration};

use anyhow::{Result, ensure};
use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use backoff::ExponentialBackoffBuilder;
use bon::Builder;
use thiserror::Error;
use tokio::time::{sleep, timeout};

use crate::{config::GraderConfig, error::GradingError, prompt::SYSTEM_MESSAGE};

/// Total attempts per request: the first call plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Prompt used to check that the backend answers at all.
pub const PING_PROMPT: &str = "Hello, this is a test message.";

/// Token cap for [`PING_PROMPT`].
const PING_MAX_TOKENS: u32 = 10;

/// Generation settings sent with every request.
#[derive(Debug, Clone, Builder)]
pub struct RequestConfig {
    /// Upper bound on generated tokens.
    #[builder(default = crate::config::DEFAULT_MAX_OUTPUT_TOKENS)]
    max_output_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    #[builder(default = crate::config::DEFAULT_TEMPERATURE)]
    temperature:       f32,
    /// Deadline for a single attempt.
    #[builder(default = Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS))]
    request_timeout:   Duration,
    /// Pause between a failed attempt and the retry.
    #[builder(default = Duration::from_millis(crate::config::DEFAULT_RETRY_BACKOFF_MS))]
    retry_backoff:     Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RequestConfig {
    /// Checks the ranges the backend contract relies on.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&self.temperature),
            "temperature must be between 0 and 1, got {}",
            self.temperature
        );
        ensure!(self.max_output_tokens > 0, "max_output_tokens must be greater than zero");
        ensure!(!self.request_timeout.is_zero(), "request_timeout must be greater than zero");
        Ok(self)
    }

    /// Returns the cap on generated tokens.
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the per-attempt deadline.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the pause before a retry.
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}

/// How a single attempt against the service went wrong.
#[derive(Debug, Clone, Error)]
pub enum BackendFailure {
    /// Network-class problem worth retrying: connection errors, rate limits,
    /// overloaded or erroring servers.
    #[error("transient backend failure: {0}")]
    Transient(String),
    /// The request itself was rejected (bad credentials, unknown model, invalid
    /// arguments); retrying would not help.
    #[error("backend rejected the request: {0}")]
    Permanent(String),
    /// The attempt did not finish before its deadline.
    #[error("backend attempt timed out")]
    TimedOut,
}

/// A text-completion service: prompt in, text out.
///
/// Implementations only make the call. Deadlines and retries are applied by
/// [`BackendAdapter`], so a fake used in tests can simply return scripted text.
pub trait CompletionService: Send + Sync {
    /// Sends `prompt` and returns the generated text.
    fn complete(
        &self,
        prompt: &str,
        config: &RequestConfig,
    ) -> impl Future<Output = Result<String, BackendFailure>> + Send;
}

/// Wraps a [`CompletionService`] with a per-attempt deadline and a single
/// retry for transient failures.
#[derive(Debug, Clone)]
pub struct BackendAdapter<S> {
    /// The wrapped service.
    service: S,
    /// Settings applied to every request.
    config:  RequestConfig,
}

impl<S: CompletionService> BackendAdapter<S> {
    /// Wraps `service`, applying `config` to every request.
    pub fn new(service: S, config: RequestConfig) -> Self {
        Self { service, config }
    }

    /// Returns the request settings.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Returns the wrapped service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Runs one attempt under the configured deadline.
    async fn attempt(&self, prompt: &str, config: &RequestConfig) -> Result<String, BackendFailure> {
        match timeout(config.request_timeout, self.service.complete(prompt, config)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendFailure::TimedOut),
        }
    }

    /// Sends `prompt`, retrying once after a transient failure or timeout.
    ///
    /// Whatever text comes back is returned as-is, even if empty; judging its
    /// shape is the parser's job.
    pub async fn complete(&self, prompt: &str) -> Result<String, GradingError> {
        let mut last = BackendFailure::TimedOut;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(prompt, &self.config).await {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "backend answered");
                    return Ok(text);
                }
                Err(BackendFailure::Permanent(cause)) => {
                    tracing::error!(attempt, %cause, "backend rejected the request");
                    return Err(GradingError::BackendUnavailable(cause));
                }
                Err(failure) => {
                    tracing::warn!(attempt, error = %failure, "backend attempt failed");
                    last = failure;
                    if attempt < MAX_ATTEMPTS {
                        sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        Err(match last {
            BackendFailure::TimedOut => GradingError::BackendTimeout,
            BackendFailure::Transient(cause) | BackendFailure::Permanent(cause) => {
                GradingError::BackendUnavailable(cause)
            }
        })
    }

    /// Sends a tiny prompt once to check that the backend is reachable.
    pub async fn ping(&self) -> Result<(), GradingError> {
        let config = RequestConfig {
            max_output_tokens: PING_MAX_TOKENS,
            ..self.config.clone()
        };

        match self.attempt(PING_PROMPT, &config).await {
            Ok(_) => Ok(()),
            Err(BackendFailure::TimedOut) => Err(GradingError::BackendTimeout),
            Err(BackendFailure::Transient(cause) | BackendFailure::Permanent(cause)) => {
                Err(GradingError::BackendUnavailable(cause))
            }
        }
    }
}

/// Markers in API error messages that indicate a temporary condition.
const TRANSIENT_MARKERS: [&str; 8] = [
    "rate limit",
    "rate_limit",
    "overloaded",
    "server_error",
    "server error",
    "temporarily",
    "unavailable",
    "timeout",
];

/// Sorts an OpenAI client error into retryable and final failures.
///
/// async-openai reports a 5xx response as an `ApiError` holding only the raw
/// body, with no type, code or param; those are treated as transient.
fn classify(err: OpenAIError) -> BackendFailure {
    match err {
        OpenAIError::Reqwest(e) => {
            if e.is_timeout() {
                BackendFailure::TimedOut
            } else {
                BackendFailure::Transient(e.to_string())
            }
        }
        // Gateways that fail tend to answer with HTML instead of JSON.
        OpenAIError::JSONDeserialize(..) => BackendFailure::Transient(err.to_string()),
        OpenAIError::ApiError(api) => {
            let server_side = api.r#type.is_none() && api.code.is_none() && api.param.is_none();
            let message = api.to_string();
            let lowered = message.to_lowercase();
            if server_side || TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
                BackendFailure::Transient(message)
            } else {
                BackendFailure::Permanent(message)
            }
        }
        other => BackendFailure::Permanent(other.to_string()),
    }
}

/// [`CompletionService`] backed by an OpenAI-compatible chat completion API.
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Configured API client.
    client: OpenAIClient<OpenAIConfig>,
    /// Model identifier sent with each request.
    model:  String,
}

impl OpenAiBackend {
    /// Builds a client from the credentials in `config`.
    ///
    /// The client's own retry loop is switched off so that every call is a
    /// single HTTP request; [`BackendAdapter`] owns the retry policy.
    pub fn new(config: &GraderConfig) -> Self {
        let openai = config.openai();
        let no_retries = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(openai.api_base())
                .with_api_key(openai.api_key()),
        )
        .with_http_client(config.http_client())
        .with_backoff(no_retries);

        Self {
            client,
            model: openai.model().to_string(),
        }
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Builds the system and user messages for `prompt`.
    fn messages(prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_MESSAGE.trim())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ])
    }
}

impl CompletionService for OpenAiBackend {
    async fn complete(&self, prompt: &str, config: &RequestConfig) -> Result<String, BackendFailure> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::messages(prompt).map_err(classify)?)
            .temperature(config.temperature())
            .max_completion_tokens(config.max_output_tokens())
            .build()
            .map_err(classify)?;

        let response = self.client.chat().create(request).await.map_err(classify)?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
