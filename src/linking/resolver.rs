//! Location resolution: one claimed span per finding, translated to raw
//! page coordinates.
//!
//! Findings are resolved strictly in ordinal order. A finding takes its
//! best candidate that does not overlap a span claimed by an earlier
//! finding, so a sentence echoed twice by the model is only linked once.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{debug, info, instrument};

use super::matcher::{MatchingConfig, SpanMatcher};
use super::types::{Finding, Location, MatchCandidate, ResolvedFinding, UnresolvedReason};
use crate::normalize::{normalize_query, NormalizedDocument};

/// Normalized spans already claimed during one resolution pass
///
/// Spans are kept non-overlapping, keyed by start, so an overlap test is a
/// single predecessor lookup.
#[derive(Debug, Clone, Default)]
pub struct ConsumedSpans {
    spans: BTreeMap<usize, usize>,
}

impl ConsumedSpans {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `span` shares at least one char with a claimed span
    pub fn overlaps(&self, span: &Range<usize>) -> bool {
        if span.is_empty() {
            return false;
        }
        self.spans
            .range(..span.end)
            .next_back()
            .map(|(_, &end)| end > span.start)
            .unwrap_or(false)
    }

    /// Claim a span. Returns false (and claims nothing) on overlap.
    pub fn insert(&mut self, span: Range<usize>) -> bool {
        if span.is_empty() || self.overlaps(&span) {
            return false;
        }
        self.spans.insert(span.start, span.end);
        true
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Claimed spans in document order
    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.spans.iter().map(|(&start, &end)| start..end)
    }
}

/// Translate a normalized span to a single-page raw location
///
/// Start and last char are found by binary search over the offset map. A
/// span continuing onto a later page keeps its start page and is clipped to
/// that page's raw length.
pub fn locate(document: &NormalizedDocument, span: &Range<usize>) -> Option<Location> {
    if span.is_empty() || span.end > document.len() {
        return None;
    }

    let map = document.offset_map();
    let first = map.segment_at(span.start)?;
    let last = map.segment_at(span.end - 1)?;
    let raw_start = first.raw_offset(span.start);

    if last.page == first.page {
        return Some(Location {
            page: first.page,
            raw_start,
            raw_end: last.raw_end_after(span.end - 1),
            crosses_page: false,
        });
    }

    let raw_end = document.page_raw_len(first.page)?;
    Some(Location {
        page: first.page,
        raw_start,
        raw_end,
        crosses_page: true,
    })
}

/// Single sequential pass assigning spans to findings
pub struct Resolver<'a> {
    document: &'a NormalizedDocument,
    consumed: ConsumedSpans,
}

impl<'a> Resolver<'a> {
    pub fn new(document: &'a NormalizedDocument) -> Self {
        Self {
            document,
            consumed: ConsumedSpans::new(),
        }
    }

    /// Resolve one finding against its ranked candidates
    ///
    /// Must be called in ordinal order for exclusivity to follow ordinals.
    pub fn resolve(&mut self, finding: Finding, candidates: &[MatchCandidate]) -> ResolvedFinding {
        let candidate_count = candidates.len();

        if normalize_query(&finding.quoted_text).is_empty() {
            return ResolvedFinding::new_unresolved(finding, UnresolvedReason::EmptyQuote, 0);
        }
        if candidates.is_empty() {
            return ResolvedFinding::new_unresolved(finding, UnresolvedReason::NoMatch, 0);
        }

        for candidate in candidates {
            if self.consumed.overlaps(&candidate.span) {
                continue;
            }
            let Some(location) = locate(self.document, &candidate.span) else {
                continue;
            };

            self.consumed.insert(candidate.span.clone());
            debug!(
                ordinal = finding.ordinal,
                page = location.page,
                similarity = candidate.similarity,
                "Resolved finding"
            );
            return ResolvedFinding::new_resolved(finding, candidate, location, candidate_count);
        }

        debug!(ordinal = finding.ordinal, candidate_count, "All candidates already claimed");
        ResolvedFinding::new_unresolved(finding, UnresolvedReason::AlreadyClaimed, candidate_count)
    }

    pub fn consumed(&self) -> &ConsumedSpans {
        &self.consumed
    }

    pub fn into_consumed(self) -> ConsumedSpans {
        self.consumed
    }
}

/// Resolved findings together with the spans they claimed
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub findings: Vec<ResolvedFinding>,
    pub consumed: ConsumedSpans,
}

/// Match and resolve a batch of findings
///
/// Returns exactly one entry per finding, ordered by ordinal.
#[instrument(skip_all, fields(findings = findings.len()))]
pub fn link(document: &NormalizedDocument, mut findings: Vec<Finding>, config: &MatchingConfig) -> LinkOutcome {
    findings.sort_by_key(|f| f.ordinal);

    let matcher = SpanMatcher::new(document, config);
    let candidates = matcher.candidates_for_all(&findings);

    let mut resolver = Resolver::new(document);
    let resolved: Vec<ResolvedFinding> = findings
        .into_iter()
        .zip(candidates.iter())
        .map(|(finding, candidates)| resolver.resolve(finding, candidates))
        .collect();

    let resolved_count = resolved.iter().filter(|r| r.is_resolved()).count();
    info!(
        total = resolved.len(),
        resolved = resolved_count,
        unresolved = resolved.len() - resolved_count,
        "Linked findings"
    );

    LinkOutcome {
        findings: resolved,
        consumed: resolver.into_consumed(),
    }
}

/// Match and resolve a batch of findings, discarding the claimed-span set
pub fn link_findings(
    document: &NormalizedDocument,
    findings: Vec<Finding>,
    config: &MatchingConfig,
) -> Vec<ResolvedFinding> {
    link(document, findings, config).findings
}
