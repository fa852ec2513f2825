#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Parses and validates the backend's grading block.
//!
//! The backend is asked for the layout described in [`crate::contract`], but
//! what comes back is still free text. Parsing works line by line: a line that
//! starts with a known label opens a field, and any other non-blank line is
//! appended to the field opened before it, so a reasoning paragraph that wraps
//! onto several lines is kept whole. Text before the first label (greetings,
//! "Here is my assessment:") and code fences are ignored.
//!
//! Defects are split into two kinds. A missing or unreadable score is fatal
//! and a score outside `0..=10` is a contract violation; both are returned as
//! errors. A missing criterion note or a missing summary is repaired in place.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::{
    contract::{Label, MAX_SCORE, MIN_SCORE, MISSING_NOTE, SCORE_LABEL},
    error::GradingError,
    types::{CriterionScore, CriterionStatus, GradingResult, Rubric, normalize_name},
};

peg::parser! {
    /// Grammar for labelled lines of a grading block and for score values.
    pub grammar grading() for str {
        /// matches spaces and tabs
        rule ws() = quiet!{[' ' | '\t']*}

        /// matches markdown emphasis, headings, bullets and quotes around a label
        rule markup() = quiet!{['*' | '#' | '-' | '>' | '`' | '_' | '|']*}

        /// matches a run of ascii letters
        rule word() = ['a'..='z' | 'A'..='Z']+

        /// matches one or more words joined by spaces or underscores and resolves
        /// them to a field label
        rule label() -> Label
            = w:$(word() ((" " / "_")+ word())*)
            {? Label::from_keyword(w).ok_or("field label") }

        /// matches a bracketed criterion name, eg. `[Coherence]`
        rule name() -> &'input str
            = "[" ws() n:$([^ '[' | ']']+) "]" { n.trim() }

        /// matches the rest of the line
        rule value() -> &'input str
            = v:$([_]*) { v.trim() }

        /// parses a labelled line into its label, optional criterion name and value
        pub rule field() -> (Label, Option<&'input str>, &'input str)
            = ws() markup() ws() l:label() ws() n:name()? ws() markup() ws() ":"
              markup() ws() v:value()
            { (l, n, v) }

        /// parses an unlabelled `Some Name: value` line into its key and value
        pub rule keyed() -> (&'input str, &'input str)
            = ws() markup() ws() k:$([^ ':' | '*' | '`']+) markup() ":" markup() ws() v:value()
            { (k.trim(), v) }

        /// matches one or more digits
        rule digits() = ['0'..='9']+

        /// matches a decimal number, eg. `7`, `7.5`, `.5`, `-1`
        rule number() -> f64
            = n:$(("-"? digits() ("." digits())?) / ("-"? "." digits()))
            {? n.parse().or(Err("number")) }

        /// matches quotes, emphasis and brackets before the number
        rule lead() = quiet!{[' ' | '\t' | '*' | '`' | '"' | '\'' | '(' | '[']*}

        /// matches quotes, emphasis, brackets and punctuation after the number
        rule tail() = quiet!{[' ' | '\t' | '*' | '`' | '"' | '\'' | ')' | ']' | '.' | ',' | ';' | '!']*}

        /// matches "out of", in any case
        rule out_of_words()
            = ['o' | 'O'] ['u' | 'U'] ['t' | 'T'] [' ' | '\t']+ ['o' | 'O'] ['f' | 'F']

        /// matches a `/10` or `out of 10` suffix
        rule out_of_ten()
            = ws() ("/" / out_of_words()) ws() "10" ("." "0"+)?

        /// parses a score value, stripping the decorations above, and fails on
        /// anything else
        pub rule score() -> f64
            = lead() n:number() out_of_ten()? tail() ![_] { n }
    }
}

/// Where continuation lines currently go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Note of the criterion with this normalized name.
    Criterion(String),
    /// The reasoning paragraph.
    Reasoning,
}

/// Raw field values collected from the backend text, before validation.
#[derive(Debug, Default)]
struct Fields {
    /// Value of the first score line.
    score:     Option<String>,
    /// Notes keyed by normalized criterion name.
    notes:     HashMap<String, String>,
    /// Value of the first reasoning line plus its continuation lines.
    reasoning: Option<String>,
}

impl Fields {
    /// Appends a continuation line to the open field.
    fn extend(&mut self, slot: &Slot, line: &str) {
        let target = match slot {
            Slot::Criterion(key) => self.notes.get_mut(key),
            Slot::Reasoning => self.reasoning.as_mut(),
        };
        if let Some(text) = target {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
    }
}

/// Splits the backend text into fields. The first occurrence of each field
/// wins; later duplicates are dropped along with their continuation lines.
fn collect_fields(raw_text: &str, rubric: &Rubric) -> Fields {
    let known: HashSet<String> = rubric.criteria().iter().map(|c| normalize_name(c)).collect();

    let mut fields = Fields::default();
    let mut open: Option<Slot> = None;

    for line in raw_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("```") {
            continue;
        }

        match grading::field(line) {
            Ok((Label::Score, _, value)) => {
                open = None;
                if fields.score.is_none() {
                    fields.score = Some(value.to_string());
                } else {
                    tracing::warn!(value, "ignoring repeated score line");
                }
            }
            Ok((Label::Criterion, Some(name), value)) => {
                let key = normalize_name(name);
                if !known.contains(&key) {
                    tracing::debug!(name, "ignoring note for a criterion outside the rubric");
                    open = None;
                } else if fields.notes.contains_key(&key) {
                    tracing::warn!(name, "ignoring repeated criterion line");
                    open = None;
                } else {
                    fields.notes.insert(key.clone(), value.to_string());
                    open = Some(Slot::Criterion(key));
                }
            }
            Ok((Label::Criterion, None, _)) => {
                tracing::warn!(line = trimmed, "criterion line without a bracketed name");
                open = None;
            }
            Ok((Label::Reasoning, _, value)) => {
                if fields.reasoning.is_none() {
                    fields.reasoning = Some(value.to_string());
                    open = Some(Slot::Reasoning);
                } else {
                    tracing::warn!("ignoring repeated reasoning line");
                    open = None;
                }
            }
            // Reasoning comes last, so only a labelled line may close it.
            Err(_) if open == Some(Slot::Reasoning) => fields.extend(&Slot::Reasoning, trimmed),
            Err(_) => match grading::keyed(line) {
                // `Coherence: ...` without the CRITERION label still counts.
                Ok((key, value)) if known.contains(&normalize_name(key)) => {
                    let key = normalize_name(key);
                    if fields.notes.contains_key(&key) {
                        open = None;
                    } else {
                        fields.notes.insert(key.clone(), value.to_string());
                        open = Some(Slot::Criterion(key));
                    }
                }
                _ => {
                    if let Some(slot) = &open {
                        fields.extend(slot, trimmed);
                    }
                }
            },
        }
    }

    fields
}

/// Parses a score value such as `"7.5/10."` into a number.
pub fn parse_score(value: &str) -> Option<f64> {
    grading::score(value).ok()
}

/// Builds a one-line summary from whatever the backend did say.
fn synthesize_summary(score: f64, per_criterion: &[CriterionScore]) -> String {
    let assessed = per_criterion
        .iter()
        .filter(|c| c.status == CriterionStatus::Assessed)
        .map(|c| format!("{}: {}", c.name, c.note.trim_end_matches('.')))
        .join("; ");

    if assessed.is_empty() {
        format!("Scored {score:.1}/10; no per-criterion assessment was provided.")
    } else {
        format!("Scored {score:.1}/10. {assessed}.")
    }
}

/// Parses backend text into a validated [`GradingResult`] stamped with the
/// current time.
pub fn parse(raw_text: &str, rubric: &Rubric) -> Result<GradingResult, GradingError> {
    parse_at(raw_text, rubric, Utc::now())
}

/// Same as [`parse`], with an explicit timestamp.
pub fn parse_at(
    raw_text: &str,
    rubric: &Rubric,
    produced_at: DateTime<Utc>,
) -> Result<GradingResult, GradingError> {
    let mut fields = collect_fields(raw_text, rubric);

    let score_text = fields.score.take().ok_or_else(|| {
        GradingError::malformed(raw_text, format!("no `{SCORE_LABEL}:` line was found"))
    })?;
    let overall_score = grading::score(&score_text).map_err(|e| {
        GradingError::malformed(
            raw_text,
            format!("score `{score_text}` is not a single number (expected {})", e.expected),
        )
    })?;

    if !overall_score.is_finite() {
        return Err(GradingError::malformed(raw_text, "score is not a finite number"));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&overall_score) {
        return Err(GradingError::rejected(
            "overall_score",
            format!("{overall_score} is outside the allowed range {MIN_SCORE}..={MAX_SCORE}"),
            raw_text,
        ));
    }

    let per_criterion: Vec<CriterionScore> = rubric
        .criteria()
        .iter()
        .map(|name| match fields.notes.remove(&normalize_name(name)) {
            Some(note) if !note.is_empty() => CriterionScore {
                name: name.clone(),
                note,
                status: CriterionStatus::Assessed,
            },
            _ => {
                tracing::warn!(criterion = %name, "backend skipped a criterion; using placeholder");
                CriterionScore {
                    name:   name.clone(),
                    note:   MISSING_NOTE.to_string(),
                    status: CriterionStatus::Unscored,
                }
            }
        })
        .collect();

    let reasoning_summary = match fields.reasoning.filter(|r| !r.is_empty()) {
        Some(reasoning) => reasoning,
        None => {
            tracing::warn!("backend omitted the reasoning; synthesizing a summary");
            synthesize_summary(overall_score, &per_criterion)
        }
    };

    Ok(GradingResult {
        overall_score,
        per_criterion,
        reasoning_summary,
        produced_at,
    })
}
