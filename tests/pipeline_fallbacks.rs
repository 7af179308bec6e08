// Orchestrator behavior across the text-layer / OCR / fallback paths
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Timelike};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use recibo::error::ExtractionError;
use recibo::extraction::{ExtractionPipeline, OcrEngine};
use tempfile::NamedTempFile;

/// A pipeline whose OCR engine points at a directory with no models, the
/// situation every test machine is in.
fn pipeline() -> ExtractionPipeline {
    let ocr = Arc::new(Mutex::new(OcrEngine::new(PathBuf::from(
        "/nonexistent-model-dir",
    ))));
    ExtractionPipeline::new(ocr)
}

/// Build a single-page PDF whose text layer holds the given lines.
fn pdf_with_text(lines: &[&str]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    let mut y = 750;
    for line in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![50.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
        y -= 18;
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save_pdf(mut doc: Document) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .expect("temp pdf");
    doc.save(file.path()).expect("save pdf");
    file
}

#[test]
fn text_layer_pdf_is_parsed_without_ocr() {
    // The OCR engine has no models, so a parsed result proves the embedded
    // text layer was used directly.
    let file = save_pdf(pdf_with_text(&[
        "DIA SUPERMERCADO",
        "Fecha 15/03/2024 10:30",
        "Total a pagar 23,45",
    ]));

    let record = pipeline().extract(file.path()).expect("extraction");

    assert_eq!(record.merchant.as_deref(), Some("DIA"));
    let timestamp = record.timestamp.expect("timestamp");
    assert_eq!(
        (timestamp.year(), timestamp.month(), timestamp.day()),
        (2024, 3, 15)
    );
    assert_eq!((timestamp.hour(), timestamp.minute()), (10, 30));
    assert_eq!(record.total_amount, Some(23.45));
    assert!(record.items.is_empty());
}

#[test]
fn extraction_is_idempotent_for_the_same_document() {
    let file = save_pdf(pdf_with_text(&[
        "MERCADONA",
        "Fecha 01/02/2024",
        "Total: 7,00",
    ]));
    let pipeline = pipeline();

    let first = pipeline.extract(file.path()).expect("first pass");
    let second = pipeline.extract(file.path()).expect("second pass");
    assert_eq!(first, second);
}

#[test]
fn blank_pdf_degrades_to_the_fallback_record() {
    let file = save_pdf(pdf_with_text(&[]));

    let record = pipeline().extract(file.path()).expect("extraction");

    assert_eq!(record.merchant.as_deref(), Some("Unknown"));
    assert_eq!(record.total_amount, Some(0.0));
    assert!(record.items.is_empty());
    assert!(record.timestamp.is_some());
}

#[test]
fn non_pdf_input_is_the_one_surfaced_error() {
    let mut file = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .expect("temp file");
    file.write_all(b"this is not a pdf at all").expect("write");
    file.flush().expect("flush");

    let result = pipeline().extract(file.path());
    assert!(matches!(result, Err(ExtractionError::SourceUnreadable(_))));
}
