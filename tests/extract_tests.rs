use std::{
    fs,
    io::Cursor,
    path::PathBuf,
};

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use grademark::{
    GradingError, RawDocument, SourceFormat, extract,
    extract::PAGE_BREAK,
};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use uuid::Uuid;

fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
    let root = std::env::temp_dir().join(format!("grademark-extract-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    let path = root.join(name);
    fs::write(&path, bytes).expect("write temp file");
    path
}

fn docx_bytes() -> Vec<u8> {
    let table = Table::new(vec![TableRow::new(vec![
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("InTable"))),
    ])]);

    let mut cursor = Cursor::new(Vec::new());
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Plants need light.")))
        .add_table(table)
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Chlorophyll"))
                .add_run(Run::new().add_text("absorbs it.")),
        )
        .build()
        .pack(&mut cursor)
        .expect("pack docx");
    cursor.into_inner()
}

fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }))
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

#[test]
fn plain_text_replaces_invalid_utf8() {
    let raw = RawDocument::new(SourceFormat::PlainText, b"caf\xff answer".to_vec());
    let text = extract(&raw).expect("plain text never fails");
    assert_eq!(text, "caf\u{FFFD} answer");
}

#[test]
fn plain_text_drops_byte_order_mark() {
    let raw = RawDocument::new(SourceFormat::PlainText, b"\xEF\xBB\xBFhello".to_vec());
    assert_eq!(extract(&raw).expect("extract"), "hello");
}

#[test]
fn empty_document_is_empty_text() {
    let raw = RawDocument::new(SourceFormat::PlainText, Vec::new());
    assert_eq!(extract(&raw).expect("extract"), "");
}

#[test]
fn docx_paragraphs_are_joined_and_tables_skipped() {
    let raw = RawDocument::new(SourceFormat::WordProcessor, docx_bytes());
    let text = extract(&raw).expect("extract docx");

    assert_eq!(text, "Plants need light.\nChlorophyllabsorbs it.");
    assert!(!text.contains("InTable"));
}

#[test]
fn pdf_pages_are_separated_by_page_breaks() {
    let raw = RawDocument::new(SourceFormat::Pdf, pdf_bytes(&["First page", "Second page"]));
    let text = extract(&raw).expect("extract pdf");

    assert_eq!(text.matches(PAGE_BREAK).count(), 1);
    let (first, second) = text.split_once(PAGE_BREAK).expect("two pages");
    assert!(first.contains("First page"));
    assert!(second.contains("Second page"));
}

#[test]
fn corrupted_documents_fail_with_their_format() {
    for format in [SourceFormat::WordProcessor, SourceFormat::Pdf] {
        let raw = RawDocument::new(format, b"definitely not a document".to_vec());
        match extract(&raw) {
            Err(GradingError::ExtractionFailure { format: reported, .. }) => {
                assert_eq!(reported, format)
            }
            other => panic!("expected ExtractionFailure, got {other:?}"),
        }
    }
}

#[test]
fn from_path_picks_format_by_extension() {
    let path = temp_file("Answer.TXT", b"An answer");
    let raw = RawDocument::from_path(&path).expect("load");
    assert_eq!(raw.format(), SourceFormat::PlainText);
    assert_eq!(raw.bytes(), b"An answer");

    let path = temp_file("answer.docx", &docx_bytes());
    let raw = RawDocument::from_path(&path).expect("load");
    assert_eq!(raw.format(), SourceFormat::WordProcessor);
}

#[test]
fn from_path_rejects_unsupported_extension() {
    let path = temp_file("answer.xlsx", b"cells");
    match RawDocument::from_path(&path) {
        Err(GradingError::ValidationFailure { field, .. }) => assert_eq!(field, "submission"),
        other => panic!("expected ValidationFailure, got {other:?}"),
    }
}

#[test]
fn from_path_reports_missing_file_as_extraction_failure() {
    let path = std::env::temp_dir().join(format!("grademark-missing-{}.pdf", Uuid::new_v4()));
    assert!(matches!(
        RawDocument::from_path(&path),
        Err(GradingError::ExtractionFailure {
            format: SourceFormat::Pdf,
            ..
        })
    ));
}
