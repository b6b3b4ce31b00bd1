//! Plain-text extraction from supported attachment formats.
//!
//! Dispatch happens on the declared MIME type: PDF through `lopdf`, OOXML
//! word-processing documents through `zip` plus a minimal `word/document.xml`
//! text scan, and `text/plain` as UTF-8. Anything else is an unsupported
//! format, which the ingestor treats as a per-attachment failure rather than a
//! batch abort.

use std::io::{Cursor, Read};
use thiserror::Error;

/// MIME type of OOXML word-processing documents.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Errors raised while extracting text from an attachment.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Declared content type has no registered extractor.
    #[error("unsupported attachment format: {content_type}")]
    UnsupportedFormat {
        /// Content type declared by the forwarding collaborator.
        content_type: String,
    },
    /// A matching extractor failed to decode the attachment bytes.
    #[error("failed to extract text: {0}")]
    ExtractionFailed(String),
}

/// Extract plain text from attachment bytes based on the declared content type.
///
/// MIME parameters (`; charset=...`) are ignored for dispatch.
pub fn extract_text(content_type: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "application/pdf" => extract_pdf(bytes),
        DOCX_CONTENT_TYPE => extract_docx(bytes),
        "text/plain" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(ExtractError::UnsupportedFormat {
            content_type: content_type.to_string(),
        }),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|error| ExtractError::ExtractionFailed(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| ExtractError::ExtractionFailed(error.to_string()))?;
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    // A textless document is valid; it simply produces nothing to index.
    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| ExtractError::ExtractionFailed(error.to_string()))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|error| ExtractError::ExtractionFailed(error.to_string()))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|error| ExtractError::ExtractionFailed(error.to_string()))?;

    Ok(document_xml_text(&xml))
}

/// Collect the contents of `<w:t>` runs, inserting newlines at paragraph ends.
///
/// This intentionally handles only the subset of WordprocessingML needed for
/// retrieval: text runs and paragraph boundaries. Formatting is dropped.
fn document_xml_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    loop {
        let Some(tag_start) = rest.find('<') else {
            break;
        };
        rest = &rest[tag_start + 1..];
        let Some(tag_end) = rest.find('>') else {
            break;
        };
        let tag = &rest[..tag_end];
        rest = &rest[tag_end + 1..];

        if tag == "/w:p" {
            if !out.ends_with('\n') {
                out.push('\n');
            }
        } else if tag == "w:t" || tag.starts_with("w:t ") {
            let Some(close) = rest.find("</w:t>") else {
                break;
            };
            unescape_xml_into(&rest[..close], &mut out);
            rest = &rest[close + "</w:t>".len()..];
        }
    }

    out
}

fn unescape_xml_into(raw: &str, out: &mut String) {
    let mut rest = raw;
    while let Some(position) = rest.find('&') {
        out.push_str(&rest[..position]);
        rest = &rest[position..];
        let entity_end = rest.find(';').map(|end| end + 1).unwrap_or(rest.len());
        match &rest[..entity_end] {
            "&amp;" => out.push('&'),
            "&lt;" => out.push('<'),
            "&gt;" => out.push('>'),
            "&quot;" => out.push('"'),
            "&apos;" => out.push('\''),
            other => out.push_str(other),
        }
        rest = &rest[entity_end..];
    }
    out.push_str(rest);
}
