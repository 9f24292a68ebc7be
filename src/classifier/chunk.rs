//! Splitting raw document text into model-sized units.
//!
//! Paragraph mode splits on blank lines and normalizes each paragraph, so
//! wrapped lines and hyphenation breaks are joined the same way the linker
//! sees them. Paragraphs that are too short are merged, fragments under ten
//! chars are dropped, and blocks far above the target size are re-split at
//! sentence ends. Sentence mode normalizes the whole text and keeps each
//! sentence longer than ten chars.

use crate::normalize::normalize_text;

/// Fragments shorter than this are not worth a model call
const MIN_FRAGMENT_CHARS: usize = 10;

/// Sentences on each side used as context in sentence mode
pub const CONTEXT_WINDOW: usize = 2;

/// Split text into paragraph chunks for classification
///
/// Text with no usable paragraph at all falls back to length chunks.
pub fn chunk_text(text: &str, min_paragraph_chars: usize, target_chars: usize) -> Vec<String> {
    let paragraphs = merge_short_paragraphs(split_paragraphs(text), min_paragraph_chars);
    if paragraphs.is_empty() {
        return chunk_by_length(&normalize_text(text), target_chars);
    }

    let oversized = 2 * target_chars;
    let mut chunks = Vec::with_capacity(paragraphs.len());
    for paragraph in paragraphs {
        if paragraph.chars().count() > oversized {
            chunks.extend(chunk_by_length(&paragraph, target_chars));
        } else {
            chunks.push(paragraph);
        }
    }
    chunks
}

/// Normalized sentences longer than ten chars
pub fn segment_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    split_sentences(&normalized)
        .into_iter()
        .filter(|s| s.chars().count() > MIN_FRAGMENT_CHARS)
        .map(str::to_string)
        .collect()
}

/// Up to `window` sentences before and after `index`, each side joined
/// with spaces
pub fn context_window(sentences: &[String], index: usize, window: usize) -> (String, String) {
    if index >= sentences.len() {
        return (String::new(), String::new());
    }

    let before = sentences[index.saturating_sub(window)..index].join(" ");
    let after_end = (index + 1 + window).min(sentences.len());
    let after = sentences[index + 1..after_end].join(" ");
    (before, after)
}

/// Blank-line separated paragraphs, normalized
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(normalize_text(&current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(normalize_text(&current.join("\n")));
    }

    paragraphs
}

fn merge_short_paragraphs(paragraphs: Vec<String>, min_chars: usize) -> Vec<String> {
    let mut merged = Vec::new();
    let mut buffer = String::new();

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if len < MIN_FRAGMENT_CHARS {
            continue;
        }

        if len < min_chars {
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.push_str(&paragraph);
        } else {
            if !buffer.is_empty() {
                merged.push(std::mem::take(&mut buffer));
            }
            merged.push(paragraph);
        }
    }

    if !buffer.is_empty() {
        merged.push(buffer);
    }
    merged
}

/// Greedy sentence packing up to roughly `target_chars` per chunk
fn chunk_by_length(text: &str, target_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current_len + len > target_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split at `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_index, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..i + c.len_utf8()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_index;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
