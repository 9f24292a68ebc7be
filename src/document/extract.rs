//! Document extraction: raw file bytes to ordered pages of text.
//!
//! PDFs go through `pdf-extract` page by page with a layout-recording
//! output device, so every page carries char boxes. Plain text is decoded as
//! UTF-8 and split into pages on form feeds, which is also how `pdftotext`
//! style exports mark page breaks.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::layout::{self, PageLayout};
use super::{Document, DocumentKind, DocumentLimits, DocumentSource};
use crate::linking::compute_hash;

/// Page separator used by text exports of paginated documents
const FORM_FEED: char = '\x0C';

/// Fatal extraction errors. Any of these aborts the run before normalization.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to read document {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document is not a readable PDF: {0}")]
    InvalidPdf(String),

    #[error("PDF is password protected")]
    PasswordProtected,

    #[error("Document too large: {actual} > {limit} bytes")]
    TooLarge { actual: u64, limit: u64 },

    #[error("Document contains no extractable text")]
    EmptyDocument,
}

/// Decide whether bytes are a PDF (magic header or `.pdf` extension)
pub fn detect_kind(path: Option<&Path>, bytes: &[u8]) -> DocumentKind {
    if bytes.starts_with(b"%PDF") {
        return DocumentKind::Pdf;
    }

    let has_pdf_extension = path
        .and_then(|p| p.extension())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if has_pdf_extension {
        DocumentKind::Pdf
    } else {
        DocumentKind::Text
    }
}

/// Read and extract a document from disk
#[instrument(skip(limits), fields(path = %path.display()))]
pub async fn extract_file(path: &Path, limits: &DocumentLimits) -> Result<Document, ExtractionError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    limits.validate_size(metadata.len())?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    extract_from_bytes(&bytes, Some(path), limits)
}

/// Extract a document from raw bytes
pub fn extract_from_bytes(
    bytes: &[u8],
    path: Option<&Path>,
    limits: &DocumentLimits,
) -> Result<Document, ExtractionError> {
    limits.validate_size(bytes.len() as u64)?;

    let kind = detect_kind(path, bytes);
    let (pages, layouts): (Vec<String>, Vec<PageLayout>) = match kind {
        DocumentKind::Pdf => extract_pdf_pages(bytes)?.into_iter().unzip(),
        DocumentKind::Text => (split_pages(&decode_text(bytes)), Vec::new()),
    };

    let source = DocumentSource {
        path: path.map(Path::to_path_buf),
        kind,
        sha256: compute_hash(bytes),
        size_bytes: bytes.len() as u64,
    };
    let document = Document::from_pages(source, pages).with_layouts(layouts);

    if document.is_blank() {
        return Err(ExtractionError::EmptyDocument);
    }

    info!(
        kind = %document.source.kind,
        pages = document.page_count(),
        "Extracted document"
    );

    Ok(document)
}

/// Extract per-page text and char boxes from PDF bytes
fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<(String, PageLayout)>, ExtractionError> {
    let mut doc = pdf_extract::Document::load_mem(bytes).map_err(|e| {
        let error_msg = e.to_string();
        let lowered = error_msg.to_lowercase();

        if lowered.contains("encrypted") || lowered.contains("password") {
            ExtractionError::PasswordProtected
        } else {
            ExtractionError::InvalidPdf(error_msg)
        }
    })?;

    // Owner-password-only files open with the empty user password
    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| {
            debug!(error = %e, "Empty password rejected");
            ExtractionError::PasswordProtected
        })?;
    }

    Ok(layout::extract_pages(&doc))
}

/// Decode text bytes, falling back to lossy UTF-8
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(
                valid_up_to = e.valid_up_to(),
                "Document is not valid UTF-8, decoding lossily"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Split text into pages on form feeds
///
/// A single trailing form feed does not open an extra empty page.
pub(crate) fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(FORM_FEED).map(str::to_string).collect();

    if pages.len() > 1 && pages.last().map(|p| p.is_empty()).unwrap_or(false) {
        pages.pop();
    }

    debug!(pages = pages.len(), "Split text into pages");
    pages
}
