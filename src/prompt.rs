#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Renders grading prompts.

use itertools::Itertools;

use crate::{
    contract::{
        CRITERION_LABEL, FIELD_ORDER, MAX_SCORE, MIN_SCORE, REASONING_LABEL, SCORE_LABEL,
        criterion_line_template, reasoning_line_template, score_line_template,
    },
    types::Rubric,
};

/// System message sent alongside every grading prompt.
pub const SYSTEM_MESSAGE: &str = include_str!("prompts/system_message.md");

/// Renders the grading prompt for one submission.
///
/// The output depends only on the arguments, so identical inputs always give
/// byte-identical prompts.
pub fn build_prompt(question: &str, ideal_answer: &str, rubric: &Rubric, submission: &str) -> String {
    let criteria_list = rubric
        .criteria()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .join("\n");

    let format_block = std::iter::once(score_line_template())
        .chain(rubric.criteria().iter().map(|c| criterion_line_template(c)))
        .chain(std::iter::once(reasoning_line_template()))
        .join("\n");

    format!(
        include_str!("prompts/grading_template.md"),
        QUESTION = question.trim(),
        IDEAL_ANSWER = ideal_answer.trim(),
        SUBMISSION = submission.trim(),
        CRITERIA_LIST = criteria_list,
        FIELD_ORDER = FIELD_ORDER.join(", "),
        FORMAT_BLOCK = format_block,
        MIN_SCORE = MIN_SCORE,
        MAX_SCORE = MAX_SCORE,
        CRITERION_LABEL = CRITERION_LABEL,
        SCORE_LABEL = SCORE_LABEL,
        REASONING_LABEL = REASONING_LABEL,
    )
}
