#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grading pipeline: extract, prompt, call the backend, parse.

use std::fmt::Display;

use futures::{StreamExt, stream};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    backend::{BackendAdapter, CompletionService, RequestConfig},
    error::GradingError,
    extract::extract,
    parser::parse,
    prompt::build_prompt,
    types::{GradingRequest, GradingResult, Submission},
    util::{looks_thin, preview},
};

/// Stages of one grading run. A run only moves forward, or to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Nothing has happened yet.
    Idle,
    /// Turning the submission into text and checking the inputs.
    Extracting,
    /// Rendering the prompt.
    Prompting,
    /// Waiting on the backend.
    AwaitingBackend,
    /// Parsing and validating the backend text.
    Parsing,
    /// A result was produced.
    Done,
    /// A stage failed; the error was returned to the caller.
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Extracting => "extracting",
            Stage::Prompting => "prompting",
            Stage::AwaitingBackend => "awaiting-backend",
            Stage::Parsing => "parsing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of a single run and logs every transition.
#[derive(Debug)]
struct Pipeline {
    /// Current stage.
    stage: Stage,
}

impl Pipeline {
    /// Starts a run in [`Stage::Idle`].
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    /// Moves to `next`, which must come after the current stage.
    fn enter(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "pipeline cannot move from {} to {next}", self.stage);
        tracing::debug!(from = %self.stage, to = %next, "pipeline stage");
        self.stage = next;
    }

    /// Records the outcome of the current stage, moving to `Failed` on error.
    fn check<T>(&mut self, outcome: Result<T, GradingError>) -> Result<T, GradingError> {
        if let Err(e) = &outcome {
            tracing::warn!(stage = %self.stage, error = %e, "grading failed");
            self.enter(Stage::Failed);
        }
        outcome
    }
}

/// Rejects blank text fields.
fn require_text(field: &str, value: &str) -> Result<(), GradingError> {
    if value.trim().is_empty() {
        Err(GradingError::validation(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Extracts the submission text and checks every text input.
fn prepare_submission(request: &GradingRequest) -> Result<String, GradingError> {
    require_text("question", request.question())?;
    require_text("ideal_answer", request.ideal_answer())?;

    let submission = match request.submission() {
        Submission::Text(text) => text.clone(),
        Submission::Document(raw) => extract(raw)?,
    };
    require_text("student_submission", &submission)?;

    if looks_thin(&submission) {
        tracing::warn!(
            preview = %preview(&submission, 80),
            "submission is very short or mostly symbols; grading anyway"
        );
    }

    Ok(submission)
}

/// Renders the prompt `request` would send, without calling any backend.
pub fn render_prompt(request: &GradingRequest) -> Result<String, GradingError> {
    let submission = prepare_submission(request)?;
    Ok(build_prompt(request.question(), request.ideal_answer(), request.rubric(), &submission))
}

/// Grades submissions through a backend.
///
/// Holds no per-request state, so one grader can serve any number of
/// concurrent [`Grader::grade`] calls.
#[derive(Debug, Clone)]
pub struct Grader<S> {
    /// Backend with its timeout and retry policy.
    backend: BackendAdapter<S>,
}

impl<S: CompletionService> Grader<S> {
    /// Creates a grader that sends requests to `service` with `config`.
    pub fn new(service: S, config: RequestConfig) -> Self {
        Self {
            backend: BackendAdapter::new(service, config),
        }
    }

    /// Returns the backend adapter.
    pub fn backend(&self) -> &BackendAdapter<S> {
        &self.backend
    }

    /// Grades one submission.
    ///
    /// The first failing stage ends the run and its error is returned as-is;
    /// no partial result is ever produced.
    pub async fn grade(&self, request: &GradingRequest) -> Result<GradingResult, GradingError> {
        let span = tracing::info_span!("grade", request_id = %Uuid::new_v4());
        self.run(request).instrument(span).await
    }

    /// Runs the pipeline stages in order.
    async fn run(&self, request: &GradingRequest) -> Result<GradingResult, GradingError> {
        let mut pipeline = Pipeline::new();

        pipeline.enter(Stage::Extracting);
        let submission = pipeline.check(prepare_submission(request))?;

        pipeline.enter(Stage::Prompting);
        let prompt =
            build_prompt(request.question(), request.ideal_answer(), request.rubric(), &submission);

        pipeline.enter(Stage::AwaitingBackend);
        let raw = pipeline.check(self.backend.complete(&prompt).await)?;

        pipeline.enter(Stage::Parsing);
        let result = pipeline.check(parse(&raw, request.rubric()))?;

        pipeline.enter(Stage::Done);
        tracing::info!(score = result.overall_score(), "graded submission");
        Ok(result)
    }

    /// Grades many submissions with at most `concurrency` in flight.
    ///
    /// Every request gets its own pipeline and one outcome, returned in the
    /// same order as `requests`.
    pub async fn grade_batch(
        &self,
        requests: &[GradingRequest],
        concurrency: usize,
    ) -> Vec<Result<GradingResult, GradingError>> {
        stream::iter(requests)
            .map(|request| self.grade(request))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
