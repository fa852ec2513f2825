#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use bon::Builder;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use tabled::Tabled;

use crate::{error::GradingError, extract::RawDocument};

/// Criteria used when the caller does not supply a rubric.
pub const DEFAULT_CRITERIA: [&str; 4] =
    ["Keyword Match", "Coherence", "Fluency", "Semantic Similarity"];

/// Lowercases a criterion name and collapses its inner whitespace so that
/// `" keyword   MATCH"` and `"Keyword Match"` compare equal.
pub(crate) fn normalize_name(name: &str) -> String {
    name.split_whitespace().join(" ").to_lowercase()
}

/// Ordered, non-empty list of named grading dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rubric(Vec<String>);

impl Rubric {
    /// Builds a rubric, trimming each name.
    ///
    /// Fails with a validation error on an empty list, a blank name, or two
    /// names that only differ by case or spacing.
    pub fn new<I, S>(criteria: I) -> Result<Self, GradingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let criteria: Vec<String> = criteria
            .into_iter()
            .map(|c| c.into().trim().to_string())
            .collect();

        if criteria.is_empty() {
            return Err(GradingError::validation("rubric", "at least one criterion is required"));
        }
        if criteria.iter().any(String::is_empty) {
            return Err(GradingError::validation("rubric", "criterion names cannot be empty"));
        }
        if let Some(dup) = criteria
            .iter()
            .duplicates_by(|c| normalize_name(c))
            .next()
        {
            return Err(GradingError::validation(
                "rubric",
                format!("criterion `{dup}` is listed more than once"),
            ));
        }
        if let Some(bad) = criteria.iter().find(|c| c.contains(['[', ']', '\n'])) {
            return Err(GradingError::validation(
                "rubric",
                format!("criterion `{bad}` cannot contain brackets or line breaks"),
            ));
        }

        Ok(Self(criteria))
    }

    /// Criterion names in rubric order.
    pub fn criteria(&self) -> &[String] {
        &self.0
    }

    /// Number of criteria.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed rubric; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self(DEFAULT_CRITERIA.iter().map(ToString::to_string).collect())
    }
}

/// The student's answer, either as text or as an uploaded document.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Already-extracted text.
    Text(String),
    /// A document that still needs extraction.
    Document(RawDocument),
}

impl From<String> for Submission {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Submission {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<RawDocument> for Submission {
    fn from(value: RawDocument) -> Self {
        Self::Document(value)
    }
}

/// Everything needed to grade one answer.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct GradingRequest {
    /// The question the student answered.
    question:     String,
    /// The reference answer the submission is compared against.
    ideal_answer: String,
    /// Dimensions the backend must assess individually.
    #[builder(default)]
    rubric:       Rubric,
    /// The student's answer.
    #[builder(into)]
    submission:   Submission,
}

impl GradingRequest {
    /// Returns the question text.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Returns the ideal answer text.
    pub fn ideal_answer(&self) -> &str {
        &self.ideal_answer
    }

    /// Returns the rubric.
    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Returns the submission.
    pub fn submission(&self) -> &Submission {
        &self.submission
    }
}

/// Whether the backend actually commented on a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    /// The backend supplied a note.
    Assessed,
    /// The backend skipped this criterion; the note is a placeholder.
    Unscored,
}

impl Display for CriterionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assessed => write!(f, "assessed"),
            Self::Unscored => write!(f, "unscored"),
        }
    }
}

/// The backend's note for one rubric criterion.
#[derive(Tabled, Debug, Clone, PartialEq, Serialize)]
pub struct CriterionScore {
    #[tabled(rename = "Criterion")]
    /// * `name`: rubric criterion this note belongs to
    pub(crate) name:   String,
    #[tabled(rename = "Note")]
    /// * `note`: what the backend said about it
    pub(crate) note:   String,
    #[tabled(rename = "Status")]
    /// * `status`: whether `note` is real or a placeholder
    pub(crate) status: CriterionStatus,
}

impl CriterionScore {
    /// Returns the criterion name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the note.
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Returns whether the note came from the backend.
    pub fn status(&self) -> CriterionStatus {
        self.status
    }
}

/// Validated outcome of one grading invocation.
///
/// Only the response parser constructs these, so `overall_score` is always a
/// finite number in `[0, 10]`, there is one [`CriterionScore`] per rubric
/// criterion in rubric order, and `reasoning_summary` is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct GradingResult {
    /// Overall score out of ten.
    pub(crate) overall_score:     f64,
    /// One entry per rubric criterion.
    pub(crate) per_criterion:     Vec<CriterionScore>,
    /// Short overall reasoning.
    pub(crate) reasoning_summary: String,
    /// When the result was produced.
    pub(crate) produced_at:       DateTime<Utc>,
}

impl GradingResult {
    /// Returns the overall score out of ten.
    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    /// Returns the overall score as a percentage.
    pub fn percentage(&self) -> f64 {
        self.overall_score * 10.0
    }

    /// Returns the per-criterion notes in rubric order.
    pub fn per_criterion(&self) -> &[CriterionScore] {
        &self.per_criterion
    }

    /// Returns the overall reasoning.
    pub fn reasoning_summary(&self) -> &str {
        &self.reasoning_summary
    }

    /// Returns the creation timestamp.
    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }
}
