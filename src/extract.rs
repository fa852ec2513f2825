#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Turns uploaded documents into plain text for prompting.

use std::{fmt::Display, path::Path};

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, read_docx};
use itertools::Itertools;
use serde::Serialize;

use crate::error::GradingError;

/// Separates the text of consecutive PDF pages.
pub const PAGE_BREAK: char = '\u{000C}';

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceFormat {
    /// Plain text in any ASCII-compatible encoding.
    PlainText,
    /// Office Open XML word-processor document (`.docx`).
    WordProcessor,
    /// Portable Document Format.
    Pdf,
}

impl SourceFormat {
    /// Maps a file extension to a format, case-insensitively.
    ///
    /// `.doc` is treated as a word-processor document; if it is actually the
    /// legacy binary format, extraction fails with a readable error.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" | "md" => Some(Self::PlainText),
            "docx" | "doc" => Some(Self::WordProcessor),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlainText => write!(f, "plain text"),
            Self::WordProcessor => write!(f, "word-processor"),
            Self::Pdf => write!(f, "PDF"),
        }
    }
}

/// An uploaded artifact waiting to be extracted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Declared format of `bytes`.
    format: SourceFormat,
    /// File contents.
    bytes:  Vec<u8>,
}

impl RawDocument {
    /// Wraps bytes whose format is already known.
    pub fn new(format: SourceFormat, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    /// Reads a file, picking the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GradingError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = SourceFormat::from_extension(ext).ok_or_else(|| {
            GradingError::validation(
                "submission",
                format!(
                    "`{}` has an unsupported extension; expected .txt, .md, .docx, .doc or .pdf",
                    path.display()
                ),
            )
        })?;

        let bytes = std::fs::read(path).map_err(|e| {
            GradingError::extraction(format, format!("cannot read `{}`: {e}", path.display()))
        })?;

        Ok(Self { format, bytes })
    }

    /// Returns the declared format.
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Returns the raw contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Converts a document into a single text string.
///
/// An empty string is a valid result; deciding whether empty text is
/// acceptable is up to the caller.
pub fn extract(raw: &RawDocument) -> Result<String, GradingError> {
    let text = match raw.format {
        SourceFormat::PlainText => Ok(plain_text(&raw.bytes)),
        SourceFormat::WordProcessor => word_processor_text(&raw.bytes),
        SourceFormat::Pdf => pdf_text(&raw.bytes),
    }?;

    tracing::debug!(format = %raw.format, chars = text.chars().count(), "extracted document");
    Ok(text)
}

/// Decodes bytes as UTF-8, replacing invalid sequences with U+FFFD.
fn plain_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Joins the paragraphs of a DOCX body with newlines. Tables and drawings are
/// skipped.
fn word_processor_text(bytes: &[u8]) -> Result<String, GradingError> {
    let docx = read_docx(bytes)
        .map_err(|e| GradingError::extraction(SourceFormat::WordProcessor, e))?;

    Ok(docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .join("\n"))
}

/// Concatenates the text runs of a paragraph, including runs nested in
/// hyperlinks.
fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    collect_runs(&para.children, &mut text);
    text
}

/// Appends the text of `children` to `out`.
fn collect_runs(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_runs(&link.children, out),
            _ => {}
        }
    }
}

/// Extracts each page in order, separated by [`PAGE_BREAK`]. Pages that fail
/// contribute nothing but their separator.
fn pdf_text(bytes: &[u8]) -> Result<String, GradingError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| GradingError::extraction(SourceFormat::Pdf, e))?;

    Ok(doc
        .get_pages()
        .keys()
        .map(|&page| match doc.extract_text(&[page]) {
            Ok(text) => text.trim_end_matches('\n').to_string(),
            Err(e) => {
                tracing::warn!(page, error = %e, "could not extract PDF page; leaving it empty");
                String::new()
            }
        })
        .join(&PAGE_BREAK.to_string()))
}
