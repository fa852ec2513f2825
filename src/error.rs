#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use thiserror::Error;

use crate::extract::SourceFormat;

/// Everything that can stop a grading pipeline.
///
/// Lower stages return these as values and the orchestrator hands them back
/// to the caller unchanged. Recoverable defects in backend output (a missing
/// criterion note, a missing summary) are repaired by the parser and never
/// show up here.
#[derive(Debug, Error)]
pub enum GradingError {
    /// The uploaded document could not be turned into text.
    #[error("Could not extract text from the {format} document: {cause}")]
    ExtractionFailure {
        /// Format the document was declared as.
        format: SourceFormat,
        /// Description of the underlying failure.
        cause:  String,
    },
    /// The grading backend could not be reached or refused the request.
    #[error("The grading backend is unavailable: {0}")]
    BackendUnavailable(String),
    /// Every attempt to reach the grading backend ran past the request
    /// timeout.
    #[error("The grading backend did not answer before the request timeout.")]
    BackendTimeout,
    /// The backend answered, but not in the requested structure.
    #[error("The grading backend returned a response that could not be parsed: {cause}")]
    MalformedResponse {
        /// The backend's text, untouched, for diagnostics.
        raw_text: String,
        /// Why the text was rejected.
        cause:    String,
    },
    /// A value broke one of the grading contracts.
    #[error("Invalid `{field}`: {reason}")]
    ValidationFailure {
        /// Name of the offending field.
        field:    String,
        /// What was wrong with it.
        reason:   String,
        /// The backend's text, when the value came from a backend reply.
        raw_text: Option<String>,
    },
}

impl GradingError {
    /// Shorthand for [`GradingError::ExtractionFailure`].
    pub fn extraction(format: SourceFormat, cause: impl Display) -> Self {
        Self::ExtractionFailure {
            format,
            cause: cause.to_string(),
        }
    }

    /// Shorthand for [`GradingError::MalformedResponse`].
    pub fn malformed(raw_text: &str, cause: impl Into<String>) -> Self {
        Self::MalformedResponse {
            raw_text: raw_text.to_string(),
            cause:    cause.into(),
        }
    }

    /// Shorthand for [`GradingError::ValidationFailure`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailure {
            field:    field.into(),
            reason:   reason.into(),
            raw_text: None,
        }
    }

    /// A [`GradingError::ValidationFailure`] for a value read from the
    /// backend reply `raw_text`, which is kept for diagnostics.
    pub fn rejected(field: impl Into<String>, reason: impl Into<String>, raw_text: &str) -> Self {
        Self::ValidationFailure {
            field:    field.into(),
            reason:   reason.into(),
            raw_text: Some(raw_text.to_string()),
        }
    }

    /// Raw backend text carried by the error, if any.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw_text, .. } => Some(raw_text),
            Self::ValidationFailure { raw_text, .. } => raw_text.as_deref(),
            _ => None,
        }
    }
}
