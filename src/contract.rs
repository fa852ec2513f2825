#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The response layout the backend is asked for.
//!
//! The prompt builder renders these constants into its instructions and the
//! response parser recognizes exactly these labels, so both sides always agree
//! on the shape of a grading block:
//!
//! ```text
//! SCORE: 7.5
//! CRITERION [Keyword Match]: Mentions chlorophyll and light energy.
//! CRITERION [Coherence]: Ideas follow a clear order.
//! REASONING: A mostly complete answer that skips the Calvin cycle.
//! ```

/// Label of the overall score line.
pub const SCORE_LABEL: &str = "SCORE";

/// Label of each per-criterion line.
pub const CRITERION_LABEL: &str = "CRITERION";

/// Label of the overall reasoning line.
pub const REASONING_LABEL: &str = "REASONING";

/// Separates a label from its value.
pub const SEPARATOR: char = ':';

/// Opens the criterion name on a criterion line.
pub const NAME_OPEN: char = '[';

/// Closes the criterion name on a criterion line.
pub const NAME_CLOSE: char = ']';

/// Lowest score the backend may give.
pub const MIN_SCORE: f64 = 0.0;

/// Highest score the backend may give.
pub const MAX_SCORE: f64 = 10.0;

/// Note used when the backend skipped a criterion.
pub const MISSING_NOTE: &str = "No assessment provided";

/// Field labels in the order they must appear.
pub const FIELD_ORDER: [&str; 3] = [SCORE_LABEL, CRITERION_LABEL, REASONING_LABEL];

/// Renders the score line with a placeholder value.
pub fn score_line_template() -> String {
    format!("{SCORE_LABEL}{SEPARATOR} <number from {MIN_SCORE} to {MAX_SCORE}, at most one decimal place>")
}

/// Renders the line the backend should emit for `criterion`.
pub fn criterion_line_template(criterion: &str) -> String {
    format!(
        "{CRITERION_LABEL} {NAME_OPEN}{criterion}{NAME_CLOSE}{SEPARATOR} <one or two sentences on \
         {criterion}>"
    )
}

/// Renders the reasoning line with a placeholder value.
pub fn reasoning_line_template() -> String {
    format!("{REASONING_LABEL}{SEPARATOR} <a short paragraph justifying the overall score>")
}

/// Which field a labelled line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// The overall score.
    Score,
    /// A per-criterion note.
    Criterion,
    /// The overall reasoning.
    Reasoning,
}

impl Label {
    /// Resolves a label word ignoring case, spaces and underscores, so
    /// `score`, `Score` and `SCORE` all match. `Overall Score` is accepted as
    /// an alias for the score label.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let key: String = word
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        match key.as_str() {
            k if k == SCORE_LABEL || k == "OVERALLSCORE" => Some(Self::Score),
            k if k == CRITERION_LABEL => Some(Self::Criterion),
            k if k == REASONING_LABEL => Some(Self::Reasoning),
            _ => None,
        }
    }
}
