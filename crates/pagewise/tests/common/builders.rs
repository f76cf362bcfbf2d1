//! Fixture builders.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use pagewise::config::Config;
use pagewise::{AnalysisKind, Finding, Severity};

/// A plain-text document with one form feed between pages.
pub fn text_document(pages: &[&str]) -> Vec<u8> {
    pages.join("\x0c").into_bytes()
}

/// `count` pages reading "Page 1", "Page 2", ...
pub fn numbered_pages(count: usize) -> Vec<u8> {
    let pages: Vec<String> = (1..=count).map(|n| format!("Page {}", n)).collect();
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    text_document(&refs)
}

/// A minimal PDF with one line of text per page.
pub fn pdf_document(pages: &[&str]) -> Vec<u8> {
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

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

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
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn finding(kind: AnalysisKind, category: &str) -> Finding {
    Finding::new(kind, category, Severity::Warning, format!("{} found", category))
}

/// Default configuration with a custom chunk size.
pub fn config_with_chunk_size(pages_per_chunk: usize) -> Config {
    let mut config = Config::default();
    config.pipeline.pages_per_chunk = pages_per_chunk;
    config
}
