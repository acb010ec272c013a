// src/extract.rs
//
// Text extraction for the teaching-material formats. PDF goes through
// pdf-extract, DOCX is read as a zip and the text runs are pulled straight
// out of word/document.xml, TXT must be valid UTF-8.

use std::fs;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdf extraction failed: {0}")]
    Pdf(#[from] pdf_extract::OutputError),
    #[error("docx archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("missing word/document.xml")]
    MissingDocumentXml,
    #[error("unsupported file type")]
    Unsupported,
}

/// Extracts plain text from a supported file, dispatching on the extension.
/// Extensions are matched exactly (lowercase), like the rest of the loader.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => Ok(pdf_extract::extract_text(path)?),
        Some("docx") => docx_text(path),
        Some("txt") => Ok(fs::read_to_string(path)?),
        _ => Err(ExtractError::Unsupported),
    }
}

fn docx_text(path: &Path) -> Result<String, ExtractError> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::MissingDocumentXml)?
        .read_to_string(&mut xml)?;
    Ok(document_xml_text(&xml))
}

// Naive scan over the document XML: keep w:t run contents, map tabs and
// breaks, end paragraphs with a newline. Non-text markup is skipped.
fn document_xml_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        let tag = &rest[open..];
        if is_tab_mark(tag) {
            out.push('\t');
        } else if tag.starts_with("<w:br") || tag.starts_with("<w:cr") || tag.starts_with("</w:p>")
        {
            out.push('\n');
        } else if is_text_run(tag) {
            if let Some(gt) = tag.find('>') {
                let body = &tag[gt + 1..];
                if let Some(end) = body.find("</w:t>") {
                    out.push_str(&body[..end]);
                    rest = &body[end..];
                    continue;
                }
            }
        }
        rest = &tag[1..];
    }
    out
}

// "<w:t" also prefixes w:tab, w:tbl, w:tr and friends, so require the tag
// name to end right after the t.
fn is_text_run(tag: &str) -> bool {
    tag.starts_with("<w:t")
        && matches!(tag.as_bytes().get(4), Some(b'>') | Some(b' ') | Some(b'/'))
}

// "<w:tab" also prefixes the <w:tabs> stop list in paragraph properties,
// and the stop definitions inside it carry attributes. A tab in run content
// is always the bare element.
fn is_tab_mark(tag: &str) -> bool {
    tag.starts_with("<w:tab") && matches!(tag.as_bytes().get(6), Some(b'>') | Some(b'/'))
}
