//! Source documents as ordered pages of raw extracted text.
//!
//! A [`Document`] is created once per analysis run and is read-only
//! afterwards. Page numbers are 1-based; raw offsets into a page are char
//! offsets into [`Page::text`].

pub mod extract;
pub mod layout;
pub mod limits;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use extract::{detect_kind, extract_file, extract_from_bytes, ExtractionError};
pub use layout::{BoundingBox, PageLayout};
pub use limits::DocumentLimits;

/// Kind of source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "pdf"),
            DocumentKind::Text => write!(f, "text"),
        }
    }
}

/// Where a document came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Path of the source file, if loaded from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub kind: DocumentKind,
    /// Hash of the raw file bytes ("sha256:...")
    pub sha256: String,
    pub size_bytes: u64,
}

/// One page of raw extracted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    /// Raw text exactly as extracted
    pub text: String,
    /// Char boxes aligned with `text`, PDF pages only
    #[serde(skip)]
    pub layout: Option<PageLayout>,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            layout: None,
        }
    }

    /// Bounding box of raw chars `raw_start..raw_end`
    pub fn bbox(&self, raw_start: usize, raw_end: usize) -> Option<BoundingBox> {
        self.layout.as_ref()?.bbox(raw_start, raw_end)
    }

    /// Length of the raw text in chars
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// True if the page has no non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An extracted document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source: DocumentSource,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build a document from raw page texts, numbering pages from 1
    pub fn from_pages<I, S>(source: DocumentSource, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page::new((i + 1) as u32, text))
            .collect();

        Self { source, pages }
    }

    /// Attach page layouts in page order; extra layouts are ignored
    pub fn with_layouts(mut self, layouts: Vec<PageLayout>) -> Self {
        for (page, layout) in self.pages.iter_mut().zip(layouts) {
            page.layout = Some(layout);
        }
        self
    }

    /// In-memory plain text document (one page per form-feed separated block)
    pub fn from_text(text: &str) -> Self {
        let source = DocumentSource {
            path: None,
            kind: DocumentKind::Text,
            sha256: crate::linking::compute_hash(text.as_bytes()),
            size_bytes: text.len() as u64,
        };
        Self::from_pages(source, extract::split_pages(text))
    }

    /// Look up a page by its 1-based number
    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == number)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Raw text of all pages, separated by blank lines
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// True if no page has any non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(Page::is_blank)
    }
}
