//! Property tests for normalization and linking.

use proptest::prelude::*;

use vaguelink::linking::{char_slice, link, Finding, MatchingConfig};
use vaguelink::normalize::{normalize_text, SegmentKind};
use vaguelink::{Document, NormalizedDocument};

const WORDS: &[&str] = &[
    "the", "results", "were", "some-\nwhat", "significant.", "Delivery", "soon", "may", "vary,", "approximately",
    "fair", "über", "con\u{00AD}tract", "in", "due", "course",
];

const SEPARATORS: &[&str] = &[" ", " ", "\n", "  ", "\n\t"];

const SOFT_HYPHEN: char = '\u{00AD}';

fn raw_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[abcABCé .\n\t\u{00AD}-]{0,60}", 1..4).prop_map(|pages| pages.join("\x0C"))
}

/// Pages of vocabulary words, each word tagged with its page index
fn worded_pages_strategy() -> impl Strategy<Value = Vec<Vec<(usize, usize)>>> {
    prop::collection::vec(
        prop::collection::vec((0..WORDS.len(), 0..SEPARATORS.len()), 1..25),
        1..3,
    )
}

fn render_pages(pages: &[Vec<(usize, usize)>]) -> (String, Vec<&'static str>) {
    let mut words = Vec::new();
    let rendered: Vec<String> = pages
        .iter()
        .map(|page| {
            let mut text = String::new();
            for (i, &(word, sep)) in page.iter().enumerate() {
                if i > 0 {
                    text.push_str(SEPARATORS[sep]);
                }
                text.push_str(WORDS[word]);
                words.push(WORDS[word]);
            }
            text
        })
        .collect();
    (rendered.join("\x0C"), words)
}

fn quotes_from(words: &[&str], ranges: &[(usize, usize)]) -> Vec<Finding> {
    ranges
        .iter()
        .enumerate()
        .map(|(ordinal, &(start, len))| {
            let start = start % words.len();
            let end = (start + len).min(words.len());
            Finding::new(ordinal, words[start..end].join(" "), "vague", "")
        })
        .collect()
}

proptest! {
    /// Property: segments tile the normalized text with no gap or overlap
    #[test]
    fn offset_map_is_contiguous(raw in raw_text_strategy()) {
        let doc = NormalizedDocument::from_document(&Document::from_text(&raw));

        let mut expected = 0;
        for seg in doc.offset_map().segments() {
            prop_assert_eq!(seg.norm.start, expected);
            prop_assert!(seg.norm.end > seg.norm.start);
            expected = seg.norm.end;
        }
        prop_assert_eq!(expected, doc.len());
    }

    /// Property: every segment agrees with the raw page it points into
    #[test]
    fn segments_agree_with_raw_pages(raw in raw_text_strategy()) {
        let document = Document::from_text(&raw);
        let doc = NormalizedDocument::from_document(&document);

        for seg in doc.offset_map().segments() {
            let page = document.page(seg.page).expect("segment page exists");
            let page_chars: Vec<char> = page.text.chars().collect();
            prop_assert!(seg.raw.end <= page_chars.len());

            let norm = &doc.chars()[seg.norm.clone()];
            match seg.kind {
                SegmentKind::Verbatim => {
                    prop_assert_eq!(norm, &page_chars[seg.raw.clone()]);
                }
                SegmentKind::Whitespace => {
                    prop_assert_eq!(norm, &[' '][..]);
                    prop_assert!(!seg.raw.is_empty());
                    let collapsed = &page_chars[seg.raw.clone()];
                    prop_assert!(collapsed.iter().all(|c| c.is_whitespace() || *c == SOFT_HYPHEN));
                }
                SegmentKind::PageBreak => {
                    prop_assert_eq!(norm, &[' '][..]);
                    prop_assert!(seg.raw.is_empty());
                    prop_assert_eq!(seg.raw.start, page_chars.len());
                }
            }
        }
    }

    /// Property: raw ranges never go backwards within a page
    #[test]
    fn raw_offsets_are_monotonic(raw in raw_text_strategy()) {
        let doc = NormalizedDocument::from_document(&Document::from_text(&raw));

        for pair in doc.offset_map().segments().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.page <= b.page);
            if a.page == b.page {
                prop_assert!(a.raw.end <= b.raw.start);
            }
        }
    }

    /// Property: normalizing normalized text changes nothing
    #[test]
    fn normalization_is_idempotent(raw in "[abcABCé .\n\t\u{00AD}-]{0,80}") {
        let once = normalize_text(&raw);
        prop_assert_eq!(normalize_text(&once), once);
    }

    /// Property: one result per finding, in ordinal order, with no shared text
    #[test]
    fn linking_preserves_count_order_and_exclusivity(
        pages in worded_pages_strategy(),
        ranges in prop::collection::vec((0usize..60, 1usize..6), 0..8),
    ) {
        let (raw, words) = render_pages(&pages);
        let document = Document::from_text(&raw);
        let doc = NormalizedDocument::from_document(&document);

        let mut findings = quotes_from(&words, &ranges);
        findings.reverse();
        let outcome = link(&doc, findings, &MatchingConfig::default());

        prop_assert_eq!(outcome.findings.len(), ranges.len());
        for (i, resolved) in outcome.findings.iter().enumerate() {
            prop_assert_eq!(resolved.finding.ordinal, i);
        }

        let mut spans: Vec<_> = outcome.findings.iter().filter_map(|r| r.span()).collect();
        prop_assert_eq!(spans.len(), outcome.consumed.len());
        spans.sort_by_key(|s| s.start);
        for pair in spans.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
    }

    /// Property: a resolved location's raw slice normalizes to the matched text
    #[test]
    fn located_raw_slice_normalizes_to_span(
        pages in worded_pages_strategy(),
        ranges in prop::collection::vec((0usize..60, 1usize..6), 1..6),
    ) {
        let (raw, words) = render_pages(&pages);
        let document = Document::from_text(&raw);
        let doc = NormalizedDocument::from_document(&document);

        let outcome = link(&doc, quotes_from(&words, &ranges), &MatchingConfig::default());

        for resolved in &outcome.findings {
            let (Some(location), Some(span)) = (resolved.location(), resolved.span()) else {
                continue;
            };
            if location.crosses_page {
                continue;
            }
            let page = document.page(location.page).expect("located page exists");
            let slice = char_slice(&page.text, location.raw_start, location.raw_end);
            prop_assert_eq!(normalize_text(slice), doc.slice(span));
        }
    }
}
