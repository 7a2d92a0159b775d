//! Text extraction for uploaded legal documents.
//!
//! Produces either per-page text (PDF) or a single whole-document body
//! (DOCX, plain text). The two shapes stay distinct through segmentation:
//! paged input keeps real 1-based page numbers and honors the front-matter
//! skip policy, whole-document input collapses to page 1.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracted document text, tagged by labeling mode.
#[derive(Debug, Clone)]
pub enum DocumentText {
    /// One entry per page, in page order. Chunk pages are `index + 1`.
    Paged(Vec<String>),
    /// A single body with no page structure. Chunks are labeled page 1.
    Whole(String),
}

/// Extract text from a document file, dispatching on extension.
///
/// Unsupported or unreadable files are errors; a readable file with no
/// text content is not (it flows through as zero chunks downstream).
pub fn extract_file(path: &Path) -> Result<DocumentText> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            extract_pdf(&bytes)
        }
        "docx" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            extract_docx(&bytes).map(DocumentText::Whole)
        }
        "txt" | "md" => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(DocumentText::Whole(body))
        }
        other => bail!(
            "Unsupported file type '{}' for {}. Supported: pdf, docx, txt, md.",
            other,
            path.display()
        ),
    }
}

/// Extract per-page text from PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<DocumentText> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;
    Ok(DocumentText::Paged(pages))
}

/// Extract the body text of a DOCX: `w:t` runs of `word/document.xml`.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| anyhow::anyhow!("DOCX extraction failed: {}", e))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| anyhow::anyhow!("DOCX extraction failed: word/document.xml not found"))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| anyhow::anyhow!("DOCX extraction failed: {}", e))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            bail!("DOCX extraction failed: word/document.xml exceeds size limit");
        }
    }

    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => bail!("DOCX extraction failed: {}", e),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unsupported_extension_is_error() {
        let f = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        assert!(extract_file(f.path()).is_err());
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        assert!(extract_pdf(b"not a pdf").is_err());
    }

    #[test]
    fn test_invalid_docx_is_error() {
        assert!(extract_docx(b"not a zip").is_err());
    }

    #[test]
    fn test_txt_is_whole_document() {
        let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        f.write_all(b"The parties agree as follows.").unwrap();
        match extract_file(f.path()).unwrap() {
            DocumentText::Whole(body) => assert_eq!(body, "The parties agree as follows."),
            DocumentText::Paged(_) => panic!("txt must extract as whole-document"),
        }
    }
}
