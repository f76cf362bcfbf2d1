use crate::chunker::join_pages;
use crate::error::ExtractError;

/// Page separator in plain-text uploads.
const FORM_FEED: char = '\x0c';

/// Decodes UTF-8 text and marks pages at form feeds.
///
/// Blank input has no pages and yields an empty string.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ExtractError::Text(format!("content is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let mut pages: Vec<&str> = text.split(FORM_FEED).collect();
    // A trailing form feed does not start a new page
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }

    Ok(join_pages(pages))
}
