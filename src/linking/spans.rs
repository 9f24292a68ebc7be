//! Span utilities shared by the matcher, resolver and report layers.
//!
//! All offsets handled here are **char** offsets, never UTF-8 byte
//! offsets: model output, normalized buffers and raw page text are all
//! compared and addressed in chars so that a location survives any
//! re-encoding of the source.

use sha2::{Digest, Sha256};

/// Find all exact occurrences of `needle` in `haystack`
///
/// Returns `(start, end)` char offset pairs, overlapping occurrences included.
/// Simple sliding window over the first char - O(n*m) worst case.
pub fn find_exact_matches(haystack: &[char], needle: &[char]) -> Vec<(usize, usize)> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let first = needle[0];
    let needle_len = needle.len();

    (0..=(haystack.len() - needle_len))
        .filter(|&i| haystack[i] == first && haystack[i..i + needle_len] == *needle)
        .map(|i| (i, i + needle_len))
        .collect()
}

/// Compute SHA256 hash of a byte slice, returning hex string with prefix
///
/// # Returns
/// * String in format "sha256:abc123..."
pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    format!("sha256:{}", hex::encode(result))
}

/// Slice `text` by a char range, clamping to the text length
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |offset: usize| {
        text.char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end.max(start));
    &text[start_byte..end_byte]
}

/// Compute the hash of the raw slice a location points at
pub fn compute_slice_hash(text: &str, start: usize, end: usize) -> String {
    compute_hash(char_slice(text, start, end).as_bytes())
}

/// Extract anchor text around a span
///
/// Returns roughly `window` chars of context centred on the span, with
/// whitespace flattened to single spaces so the anchor fits on one line.
pub fn extract_anchor_text(text: &str, start: usize, end: usize, window: usize) -> String {
    let total = text.chars().count();
    let end = end.min(total);
    let start = start.min(end);

    let span_len = end - start;
    let each_side = window.saturating_sub(span_len) / 2;

    let anchor_start = start.saturating_sub(each_side);
    let anchor_end = (end + each_side).min(total);

    let anchor = char_slice(text, anchor_start, anchor_end)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let prefix = if anchor_start > 0 { "..." } else { "" };
    let suffix = if anchor_end < total { "..." } else { "" };

    format!("{}{}{}", prefix, anchor, suffix)
}

/// Line and column position (1-indexed for editor compatibility)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

/// Convert a char offset to a 1-indexed line/column position
pub fn offset_to_line_col(text: &str, offset: usize) -> LineCol {
    let mut line = 1;
    let mut col = 1;

    for c in text.chars().take(offset) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    LineCol { line, col }
}
