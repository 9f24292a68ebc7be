//! Text normalization with an exact map back to raw page offsets.
//!
//! Rules, applied left to right per page:
//! - whitespace runs collapse to a single space, page edges are trimmed
//! - `<letter>-<linebreak><letter>` hyphenation breaks are joined
//! - soft hyphens (U+00AD) are dropped
//! - pages are joined with a single-space page-break marker
//!
//! Case folding never touches the stored text. A parallel lowercase
//! comparison key, aligned char for char with the text, is built alongside.
//! Queries go through [`normalize_query`] so both sides of a comparison
//! follow identical rules.

pub mod offset_map;

use std::ops::Range;

use tracing::{debug, instrument};

use crate::document::Document;

pub use offset_map::{OffsetMap, Segment, SegmentKind};
use offset_map::OffsetMapBuilder;

const SOFT_HYPHEN: char = '\u{00AD}';

/// Quote marks a model may wrap around echoed text
const QUOTE_MARKS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{00AB}', '\u{00BB}'];

/// Normalized text, its comparison key and the offset map
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    text: Vec<char>,
    key: Vec<char>,
    offset_map: OffsetMap,
    /// (page number, raw char length) for every page, in order
    page_lengths: Vec<(u32, usize)>,
}

impl NormalizedDocument {
    /// Normalize every page of a document
    #[instrument(skip(document), fields(pages = document.page_count()))]
    pub fn from_document(document: &Document) -> Self {
        let mut text = Vec::new();
        let mut builder = OffsetMapBuilder::default();
        let mut page_lengths = Vec::with_capacity(document.pages.len());
        let mut previous_page: Option<(u32, usize)> = None;

        for page in &document.pages {
            let raw: Vec<char> = page.text.chars().collect();
            page_lengths.push((page.number, raw.len()));

            let (page_text, page_builder) = normalize_page(&raw, page.number);
            if page_text.is_empty() {
                continue;
            }

            if let Some((prev_number, prev_len)) = previous_page {
                let at = text.len();
                text.push(' ');
                builder.push(at..at + 1, prev_number, prev_len..prev_len, SegmentKind::PageBreak);
            }

            let offset = text.len();
            text.extend_from_slice(&page_text);
            builder.append_shifted(page_builder, offset);
            previous_page = Some((page.number, raw.len()));
        }

        let key = comparison_key(&text);
        let offset_map = builder.build();

        debug!(
            normalized_chars = text.len(),
            segments = offset_map.segments().len(),
            "Normalized document"
        );

        Self {
            text,
            key,
            offset_map,
            page_lengths,
        }
    }

    /// Normalized text with original case
    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn chars(&self) -> &[char] {
        &self.text
    }

    /// Lowercase comparison key, same length as the text
    pub fn key(&self) -> &[char] {
        &self.key
    }

    pub fn offset_map(&self) -> &OffsetMap {
        &self.offset_map
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Normalized text of a span
    pub fn slice(&self, span: Range<usize>) -> String {
        let end = span.end.min(self.text.len());
        let start = span.start.min(end);
        self.text[start..end].iter().collect()
    }

    /// Raw char length of a page
    pub fn page_raw_len(&self, page: u32) -> Option<usize> {
        self.page_lengths
            .iter()
            .find(|(number, _)| *number == page)
            .map(|(_, len)| *len)
    }
}

/// Normalize a single string with the document rules (original case)
pub fn normalize_text(text: &str) -> String {
    let raw: Vec<char> = text.chars().collect();
    normalize_page(&raw, 1).0.into_iter().collect()
}

/// Comparison key for query text
///
/// Echoed quote marks around the whole text are removed first, then the
/// document rules and case folding apply.
pub fn normalize_query(query: &str) -> Vec<char> {
    let trimmed = strip_quote_marks(query.trim());
    let raw: Vec<char> = trimmed.chars().collect();
    comparison_key(&normalize_page(&raw, 1).0)
}

fn strip_quote_marks(text: &str) -> &str {
    let mut current = text;
    loop {
        let mut chars = current.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) if QUOTE_MARKS.contains(&first) && QUOTE_MARKS.contains(&last) => {
                current = chars.as_str().trim();
            }
            _ => return current,
        }
    }
}

/// Fold case char for char, keeping the key aligned with the text
fn comparison_key(text: &[char]) -> Vec<char> {
    text.iter().map(|&c| fold_char(c)).collect()
}

fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}

/// If a hyphenation break starts at `i`, return the index where the
/// joined word continues
fn hyphen_break_end(raw: &[char], i: usize) -> Option<usize> {
    if raw[i] != '-' || i == 0 || !raw[i - 1].is_alphabetic() {
        return None;
    }

    let is_blank = |c: char| c == ' ' || c == '\t';

    let mut j = i + 1;
    while j < raw.len() && is_blank(raw[j]) {
        j += 1;
    }
    if j < raw.len() && raw[j] == '\r' {
        j += 1;
    }
    if j >= raw.len() || raw[j] != '\n' {
        return None;
    }
    j += 1;
    while j < raw.len() && is_blank(raw[j]) {
        j += 1;
    }

    match raw.get(j) {
        Some(c) if c.is_alphabetic() => Some(j),
        _ => None,
    }
}

/// Normalize one page of raw chars, returning the text and its segments
/// (normalized offsets relative to the page)
fn normalize_page(raw: &[char], page: u32) -> (Vec<char>, OffsetMapBuilder) {
    let mut out: Vec<char> = Vec::with_capacity(raw.len());
    let mut builder = OffsetMapBuilder::default();

    // Start of the current verbatim run in raw coordinates
    let mut run_start: Option<usize> = None;
    // Raw whitespace run waiting for the next emitted char
    let mut pending_space: Option<Range<usize>> = None;

    let flush = |out: &Vec<char>, builder: &mut OffsetMapBuilder, run_start: &mut Option<usize>, raw_end: usize| {
        if let Some(start) = run_start.take() {
            let len = raw_end - start;
            let norm_end = out.len();
            builder.push(norm_end - len..norm_end, page, start..raw_end, SegmentKind::Verbatim);
        }
    };

    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];

        if c == SOFT_HYPHEN {
            flush(&out, &mut builder, &mut run_start, i);
            i += 1;
            continue;
        }

        if let Some(next) = hyphen_break_end(raw, i) {
            flush(&out, &mut builder, &mut run_start, i);
            i = next;
            continue;
        }

        if c.is_whitespace() {
            flush(&out, &mut builder, &mut run_start, i);
            let start = pending_space.take().map(|r| r.start).unwrap_or(i);
            while i < raw.len() && raw[i].is_whitespace() {
                i += 1;
            }
            pending_space = Some(start..i);
            continue;
        }

        if let Some(space) = pending_space.take() {
            // Leading whitespace of the page is dropped
            if !out.is_empty() {
                let at = out.len();
                out.push(' ');
                builder.push(at..at + 1, page, space, SegmentKind::Whitespace);
            }
        }

        if run_start.is_none() {
            run_start = Some(i);
        }
        out.push(c);
        i += 1;
    }

    flush(&out, &mut builder, &mut run_start, raw.len());
    // Trailing whitespace in `pending_space` is dropped

    (out, builder)
}
