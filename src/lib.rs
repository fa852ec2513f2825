//! # grademark
//!
//! Grades a student's written answer against an ideal answer and a rubric
//! using a generative text backend, and turns the backend's free-form reply
//! into a validated score with per-criterion notes.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Backend trait, the OpenAI-compatible client, and the retry/timeout adapter
pub mod backend;
/// Startup configuration: credentials and request settings
pub mod config;
/// Labels and layout shared by the prompt builder and the response parser
pub mod contract;
/// The error type returned by every pipeline stage
pub mod error;
/// Document-to-text extraction
pub mod extract;
/// The grading pipeline and batch grading
pub mod grade;
/// Parsing and validation of backend replies
pub mod parser;
/// Prompt rendering
pub mod prompt;
/// Batch statistics and letter grades
pub mod report;
/// Request and result types
pub mod types;
/// Utility functions for convenience
pub mod util;

pub use backend::{BackendAdapter, CompletionService, OpenAiBackend, RequestConfig};
pub use config::GraderConfig;
pub use error::GradingError;
pub use extract::{RawDocument, SourceFormat, extract};
pub use grade::Grader;
pub use parser::parse;
pub use prompt::build_prompt;
pub use types::{CriterionScore, CriterionStatus, GradingRequest, GradingResult, Rubric, Submission};

/// Grades one submission with the default backend described by `config`.
///
/// Convenience wrapper for callers that grade a single answer; build a
/// [`Grader`] directly to reuse one across many requests.
pub async fn grade(
    config: &GraderConfig,
    question: &str,
    ideal_answer: &str,
    rubric: Rubric,
    submission: impl Into<Submission>,
) -> Result<GradingResult, GradingError> {
    let request = GradingRequest::builder()
        .question(question)
        .ideal_answer(ideal_answer)
        .rubric(rubric)
        .submission(submission)
        .build();

    Grader::new(OpenAiBackend::new(config), config.request().clone())
        .grade(&request)
        .await
}
