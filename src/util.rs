#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use itertools::Itertools;

/// Submissions shorter than this many characters are flagged as thin.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Submissions with a lower share of alphanumeric characters are flagged as
/// thin.
pub const MIN_ALNUM_RATIO: f64 = 0.3;

/// True when `text` is too short or mostly symbols, which usually means the
/// extraction picked up layout artefacts rather than an answer.
pub fn looks_thin(text: &str) -> bool {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total < MIN_CONTENT_CHARS {
        return true;
    }

    let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f64 / total as f64) < MIN_ALNUM_RATIO
}

/// Collapses whitespace and truncates `text` to at most `max_chars`
/// characters, cutting at a word boundary and adding `...` when shortened.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cleaned = text.split_whitespace().join(" ");
    if cleaned.is_empty() {
        return String::from("No text content available");
    }
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }

    let cut: String = cleaned.chars().take(max_chars).collect();
    let truncated = match cut.rsplit_once(' ') {
        Some((head, _)) if !head.is_empty() => head,
        _ => cut.as_str(),
    };
    format!("{truncated}...")
}
