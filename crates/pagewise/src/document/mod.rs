//! Content extraction from uploaded bytes.
//!
//! Text-oriented analyses receive one string with page markers; the asset
//! analysis receives rendered page images.

pub mod image;
pub mod pdf;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Document formats the pipeline can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Text,
    Image,
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const JPEG_MAGIC: &[u8] = &[0xff, 0xd8, 0xff];

impl DocumentFormat {
    /// Sniffs the format from content, falling back to the MIME type.
    pub fn detect(mime_type: &str, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(DocumentFormat::Pdf);
        }
        if bytes.starts_with(PNG_MAGIC) || bytes.starts_with(JPEG_MAGIC) {
            return Some(DocumentFormat::Image);
        }

        match mime_type {
            "application/pdf" => Some(DocumentFormat::Pdf),
            m if m.starts_with("image/") => Some(DocumentFormat::Image),
            m if m.starts_with("text/") => Some(DocumentFormat::Text),
            "application/json" | "application/xml" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// The uploaded file as received at submission.
#[derive(Clone)]
pub struct RawContent {
    pub source_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl RawContent {
    pub fn new(
        source_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Guesses the MIME type from the file name.
    pub fn from_upload(source_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let source_name = source_name.into();
        let mime_type = mime_guess::from_path(&source_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(source_name, mime_type, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> Result<DocumentFormat, ExtractError> {
        DocumentFormat::detect(&self.mime_type, &self.bytes).ok_or_else(|| {
            ExtractError::UnsupportedFormat(format!("{} ({})", self.source_name, self.mime_type))
        })
    }
}

impl std::fmt::Debug for RawContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawContent")
            .field("source_name", &self.source_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One rendered page.
#[derive(Clone, PartialEq)]
pub struct PageImage {
    /// 1-based page number.
    pub page: u32,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page", &self.page)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedContent {
    /// Text with embedded page markers.
    Text(String),
    Pages(Vec<PageImage>),
}

/// Extracts page-marked text.
pub fn extract_text(raw: &RawContent) -> Result<String, ExtractError> {
    match raw.format()? {
        DocumentFormat::Pdf => pdf::extract_text(&raw.bytes),
        DocumentFormat::Text => text::extract_text(&raw.bytes),
        DocumentFormat::Image => Err(ExtractError::UnsupportedFormat(format!(
            "{} is an image and has no text layer",
            raw.source_name
        ))),
    }
}

/// Produces one image per page.
pub fn extract_page_images(raw: &RawContent, dpi: u32) -> Result<Vec<PageImage>, ExtractError> {
    match raw.format()? {
        DocumentFormat::Pdf => pdf::render_pages(&raw.bytes, dpi),
        DocumentFormat::Image => Ok(vec![image::page_image(&raw.bytes)?]),
        DocumentFormat::Text => Err(ExtractError::UnsupportedFormat(format!(
            "{} is plain text and has no page images",
            raw.source_name
        ))),
    }
}
