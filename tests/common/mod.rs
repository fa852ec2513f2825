#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use grademark::{
    RequestConfig,
    backend::{BackendFailure, CompletionService},
};

/// One scripted backend behaviour.
pub enum Step {
    Reply(String),
    Fail(BackendFailure),
    Hang,
}

/// Backend fake that plays back a fixed script, one step per call.
pub struct ScriptedBackend {
    steps:   Mutex<VecDeque<Step>>,
    calls:   AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps:   Mutex::new(steps.into_iter().collect()),
            calls:   AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new([Step::Reply(text.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

impl CompletionService for ScriptedBackend {
    async fn complete(&self, prompt: &str, _config: &RequestConfig) -> Result<String, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        let step = self.steps.lock().expect("steps lock").pop_front();

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
            None => Err(BackendFailure::Permanent("script exhausted".into())),
        }
    }
}

/// Backend fake that answers with the reply of the first key found in the
/// prompt, so concurrent calls stay deterministic.
pub struct KeyedBackend {
    replies: Vec<(String, String)>,
}

impl KeyedBackend {
    pub fn new<'a>(replies: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl CompletionService for KeyedBackend {
    async fn complete(&self, prompt: &str, _config: &RequestConfig) -> Result<String, BackendFailure> {
        self.replies
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| BackendFailure::Permanent("no scripted reply".into()))
    }
}

/// Short deadlines so timeout tests finish quickly.
pub fn fast_config() -> RequestConfig {
    RequestConfig::builder()
        .request_timeout(Duration::from_millis(50))
        .retry_backoff(Duration::from_millis(1))
        .build()
}

pub const PHOTOSYNTHESIS_QUESTION: &str = "Explain photosynthesis";

pub const PHOTOSYNTHESIS_IDEAL: &str = "Photosynthesis is the process by which green plants \
     convert light energy into chemical energy. It takes place mainly in the chloroplasts of \
     leaf cells. Chlorophyll absorbs sunlight, which drives the splitting of water and releases \
     oxygen. The energy captured is used to fix carbon dioxide into glucose in the Calvin cycle. \
     The overall reaction turns carbon dioxide and water into glucose and oxygen.";

pub const PHOTOSYNTHESIS_PARTIAL: &str = "Plants use sunlight to make food in their leaves. \
     They take in carbon dioxide and give off oxygen.";

pub const WELL_FORMED_REPLY: &str = "SCORE: 6.0
CRITERION [Keyword Match]: Mentions sunlight, carbon dioxide and oxygen but not chlorophyll.
CRITERION [Coherence]: The two sentences follow logically.
CRITERION [Fluency]: Clear and grammatical.
CRITERION [Semantic Similarity]: Captures the gist but omits glucose and the Calvin cycle.
REASONING: A correct but partial answer that covers inputs and outputs without the mechanism.";
