use std::path::Path;
use std::process::Command;

use super::PageImage;
use crate::chunker::join_pages;
use crate::error::ExtractError;

/// Extracts text page by page, in page order, joined with page markers.
///
/// A page whose text cannot be decoded still counts as a page, with empty
/// text, so page numbers in findings stay aligned with the document.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let _span = tracing::info_span!("document.pdf_text").entered();

    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for (page_num, _) in pages {
        match doc.extract_text(&[page_num]) {
            Ok(text) => texts.push(text.trim_end().to_string()),
            Err(e) => {
                tracing::warn!(page = page_num, "No extractable text on page: {}", e);
                texts.push(String::new());
            }
        }
    }

    tracing::debug!(pages = texts.len(), "Extracted PDF text");
    Ok(join_pages(texts.iter().map(String::as_str)))
}

/// Number of pages according to the PDF's page tree.
pub fn page_count(bytes: &[u8]) -> Result<usize, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;
    Ok(doc.get_pages().len())
}

/// Renders every page to PNG with `pdftoppm` (poppler-utils).
pub fn render_pages(bytes: &[u8], dpi: u32) -> Result<Vec<PageImage>, ExtractError> {
    let _span = tracing::info_span!("document.pdf_render", dpi).entered();

    let expected = page_count(bytes)?;
    if expected == 0 {
        return Ok(Vec::new());
    }

    let dir = tempfile::tempdir()
        .map_err(|e| ExtractError::Render(format!("Failed to create temp dir: {}", e)))?;
    let pdf_path = dir.path().join("input.pdf");
    let prefix = dir.path().join("page");

    std::fs::write(&pdf_path, bytes)
        .map_err(|e| ExtractError::Render(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(&pdf_path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ExtractError::Render(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractError::Render(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let pages = collect_rendered(dir.path())?;
    if pages.len() != expected {
        tracing::warn!(
            expected,
            rendered = pages.len(),
            "pdftoppm rendered an unexpected number of pages"
        );
    }
    Ok(pages)
}

/// Reads `page-N.png` files (N possibly zero-padded) in page order.
fn collect_rendered(dir: &Path) -> Result<Vec<PageImage>, ExtractError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ExtractError::Render(format!("Failed to list rendered pages: {}", e)))?;

    let mut numbered = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(page) = rendered_page_number(&path) {
            numbered.push((page, path));
        }
    }
    numbered.sort_by_key(|(page, _)| *page);

    numbered
        .into_iter()
        .map(|(page, path)| {
            let bytes = std::fs::read(&path).map_err(|e| {
                ExtractError::Render(format!("Failed to read rendered page {}: {}", page, e))
            })?;
            Ok(PageImage {
                page,
                mime_type: "image/png".to_string(),
                bytes,
            })
        })
        .collect()
}

fn rendered_page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::split_pages;
    use lopdf::{dictionary, Document, Object, Stream};

    fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
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

        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
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

    #[test]
    fn test_one_marker_per_page() {
        let bytes = pdf_with_pages(&["First page", "Second page", "Third page"]);
        let text = extract_text(&bytes).unwrap();
        let pages = split_pages(&text);
        let numbers: Vec<_> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(page_count(&bytes).unwrap(), 3);
    }

    #[test]
    fn test_corrupted_pdf_error() {
        match extract_text(b"%PDF-1.5 but nothing else") {
            Err(ExtractError::Pdf(msg)) => assert!(msg.contains("Failed to load PDF")),
            other => panic!("Expected Pdf error, got {:?}", other),
        }
    }

    #[test]
    fn test_rendered_page_number() {
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-07.png")), Some(7));
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(rendered_page_number(Path::new("/tmp/x/input.pdf")), None);
        assert_eq!(rendered_page_number(Path::new("/tmp/x/other-1.png")), None);
    }

    #[test]
    fn test_collect_rendered_orders_pages() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-01.png", "input.pdf"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let pages = collect_rendered(dir.path()).unwrap();
        let numbers: Vec<_> = pages.iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(pages[0].bytes, b"page-01.png");
    }
}
