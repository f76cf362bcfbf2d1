//! Splits page-marked text (or page images) into bounded, page-aligned chunks.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{ExtractedContent, PageImage};

/// Returns the marker that precedes page `number` (1-based).
pub fn page_marker(number: u32) -> String {
    format!("\n--- Page {} ---\n", number)
}

static RE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n--- Page (\d+) ---\n").unwrap());

/// A line inside page text that would read as a marker.
static RE_MARKER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^--- Page \d+ ---$").unwrap());

/// Joins page texts, numbering pages from 1. No pages gives an empty string.
///
/// Lines in the text that look like a page marker get a leading space, so
/// [`split_pages`] finds the same page boundaries.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        out.push_str(&page_marker(i as u32 + 1));
        out.push_str(&RE_MARKER_LINE.replace_all(page, " $0"));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

impl Page {
    fn render(&self, out: &mut String) {
        out.push_str(&page_marker(self.number));
        out.push_str(&self.text);
    }
}

/// Parses page-marked text back into pages.
///
/// Text without any marker is a single page 1, unless it is blank, in which
/// case there are no pages. Non-blank text before the first marker becomes
/// page 0.
pub fn split_pages(text: &str) -> Vec<Page> {
    let markers: Vec<_> = RE_MARKER.captures_iter(text).collect();

    if markers.is_empty() {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Page {
            number: 1,
            text: text.to_string(),
        }];
    }

    let mut pages = Vec::with_capacity(markers.len() + 1);

    let first_start = markers[0].get(0).map(|m| m.start()).unwrap_or(0);
    let preamble = &text[..first_start];
    if !preamble.trim().is_empty() {
        pages.push(Page {
            number: 0,
            text: preamble.to_string(),
        });
    }

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        pages.push(Page {
            number: num.as_str().parse().unwrap_or(u32::MAX),
            text: text[whole.end()..end].to_string(),
        });
    }

    pages
}

// ─── Chunks ─────────────────────────────────────────────────────────────────

/// What one inference call receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkPayload {
    /// Whole pages with their markers.
    Text(String),
    Image(PageImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position in the document.
    pub index: usize,
    pub first_page: u32,
    pub last_page: u32,
    pub payload: ChunkPayload,
}

impl Chunk {
    pub fn page_span(&self) -> String {
        if self.first_page == self.last_page {
            format!("page {}", self.first_page)
        } else {
            format!("pages {}-{}", self.first_page, self.last_page)
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            ChunkPayload::Text(text) => Some(text),
            ChunkPayload::Image(_) => None,
        }
    }
}

/// Groups pages into chunks of at most `pages_per_chunk` pages.
///
/// Never splits a page. A bound of 0 is treated as 1.
pub fn chunk_pages(text: &str, pages_per_chunk: usize) -> Vec<Chunk> {
    let bound = pages_per_chunk.max(1);
    split_pages(text)
        .chunks(bound)
        .enumerate()
        .map(|(index, pages)| {
            let mut payload = String::new();
            for page in pages {
                page.render(&mut payload);
            }
            Chunk {
                index,
                first_page: pages.first().map(|p| p.number).unwrap_or(0),
                last_page: pages.last().map(|p| p.number).unwrap_or(0),
                payload: ChunkPayload::Text(payload),
            }
        })
        .collect()
}

/// One chunk per page image.
pub fn chunk_images(pages: Vec<PageImage>) -> Vec<Chunk> {
    pages
        .into_iter()
        .enumerate()
        .map(|(index, image)| Chunk {
            index,
            first_page: image.page,
            last_page: image.page,
            payload: ChunkPayload::Image(image),
        })
        .collect()
}

/// Chunks whatever the extraction stage produced.
pub fn chunk_content(content: ExtractedContent, pages_per_chunk: usize) -> Vec<Chunk> {
    match content {
        ExtractedContent::Text(text) => chunk_pages(&text, pages_per_chunk),
        ExtractedContent::Pages(pages) => chunk_images(pages),
    }
}
