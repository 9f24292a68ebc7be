//! Span matching: locating a finding's quoted text in the normalized buffer.
//!
//! Matching runs on the lowercase comparison key. Exact occurrences win
//! outright; otherwise windows whose length is within the configured
//! tolerance of the query length are scored by normalized edit distance
//! `1 - lev(window, query) / max(len_window, len_query)`.
//!
//! Scoring every window directly is O(n * w * m^2). Instead a semi-global
//! alignment pass (Sellers) computes, for each window end, the smallest
//! edit distance of the query against *any* substring ending there. That
//! is a lower bound for every window ending at that position, so ends that
//! cannot reach the threshold are skipped. Each remaining end is scored
//! with one reverse DP that yields the distance for every admissible
//! window length at once.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::spans::find_exact_matches;
use super::types::{Finding, MatchCandidate, MatchMethod};
use crate::normalize::{normalize_query, NormalizedDocument};

/// Floating point slack for threshold comparisons
const EPSILON: f64 = 1e-9;

/// Matching policy constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum similarity for an approximate window (default: 0.75)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,

    /// Allowed window length deviation from the query length, as a
    /// fraction of the query length (default: 0.20)
    #[serde(default = "default_window_tolerance")]
    pub window_tolerance: f64,
}

fn default_acceptance_threshold() -> f64 {
    0.75
}
fn default_window_tolerance() -> f64 {
    0.20
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            window_tolerance: default_window_tolerance(),
        }
    }
}

/// A scored window in comparison-key coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    start: usize,
    end: usize,
    similarity: f64,
}

impl Window {
    fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Generates ranked match candidates against one normalized document
pub struct SpanMatcher<'a> {
    document: &'a NormalizedDocument,
    config: &'a MatchingConfig,
}

impl<'a> SpanMatcher<'a> {
    pub fn new(document: &'a NormalizedDocument, config: &'a MatchingConfig) -> Self {
        Self { document, config }
    }

    /// Candidates for one finding, best first
    ///
    /// Sorted by similarity descending, then by earliest start.
    pub fn candidates(&self, finding: &Finding) -> Vec<MatchCandidate> {
        let query = normalize_query(&finding.quoted_text);
        let key = self.document.key();

        if query.is_empty() || query.len() > key.len() {
            return Vec::new();
        }

        let exact = find_exact_matches(key, &query);

        let mut candidates: Vec<MatchCandidate> = if !exact.is_empty() {
            exact
                .into_iter()
                .map(|(start, end)| MatchCandidate {
                    ordinal: finding.ordinal,
                    span: start..end,
                    similarity: 1.0,
                    method: MatchMethod::Exact,
                })
                .collect()
        } else {
            approximate_windows(
                key,
                &query,
                self.config.acceptance_threshold,
                self.config.window_tolerance,
            )
            .into_iter()
            .map(|w| MatchCandidate {
                ordinal: finding.ordinal,
                span: w.start..w.end,
                similarity: w.similarity,
                method: MatchMethod::Approximate,
            })
            .collect()
        };

        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.span.start.cmp(&b.span.start))
        });

        debug!(
            ordinal = finding.ordinal,
            candidates = candidates.len(),
            "Matched finding"
        );

        candidates
    }

    /// Candidates for a batch of findings, computed in parallel
    ///
    /// The result is index-aligned with `findings`.
    #[instrument(skip_all, fields(findings = findings.len()))]
    pub fn candidates_for_all(&self, findings: &[Finding]) -> Vec<Vec<MatchCandidate>> {
        findings.par_iter().map(|f| self.candidates(f)).collect()
    }
}

/// Approximate windows above the threshold, non-maximum suppressed
fn approximate_windows(text: &[char], query: &[char], threshold: f64, tolerance: f64) -> Vec<Window> {
    let m = query.len();
    let n = text.len();

    let slack = ((m as f64) * tolerance.max(0.0) + EPSILON).floor() as usize;
    let min_len = m.saturating_sub(slack).max(1);
    let max_len = (m + slack).min(n);
    if min_len > max_len {
        return Vec::new();
    }

    // No window of admissible length can clear the threshold above this distance
    let max_distance = ((1.0 - threshold) * max_len as f64 + EPSILON).floor();
    if max_distance < 0.0 {
        return Vec::new();
    }
    let max_distance = max_distance as usize;

    let best_per_end = best_distance_per_end(text, query);

    let windows: Vec<Window> = (min_len..=n)
        .filter(|&end| best_per_end[end] <= max_distance && !text[end - 1].is_whitespace())
        .filter_map(|end| best_window_ending_at(text, query, end, min_len, max_len, threshold))
        .collect();

    suppress_overlaps(windows)
}

/// Semi-global edit distance of `query` against substrings of `text`
///
/// Entry `e` is the minimum distance between the query and any substring
/// `text[s..e]`; entry 0 is the query length.
fn best_distance_per_end(text: &[char], query: &[char]) -> Vec<usize> {
    let m = query.len();
    let mut column: Vec<usize> = (0..=m).collect();
    let mut best = Vec::with_capacity(text.len() + 1);
    best.push(m);

    for &tc in text {
        let mut diagonal = column[0];
        column[0] = 0;
        for i in 1..=m {
            let above = column[i];
            let cost = usize::from(query[i - 1] != tc);
            let value = (diagonal + cost).min(above + 1).min(column[i - 1] + 1);
            diagonal = above;
            column[i] = value;
        }
        best.push(column[m]);
    }

    best
}

/// Best-scoring window ending exactly at `end`
///
/// Runs the edit-distance DP over the reversed query and the text read
/// backwards from `end`, so row `r` holds `lev(text[end - r..end], query)`.
/// Ties keep the shorter window.
fn best_window_ending_at(
    text: &[char],
    query: &[char],
    end: usize,
    min_len: usize,
    max_len: usize,
    threshold: f64,
) -> Option<Window> {
    let m = query.len();
    let rows = max_len.min(end);

    let mut previous: Vec<usize> = (0..=m).collect();
    let mut current = vec![0usize; m + 1];
    let mut best: Option<Window> = None;

    for r in 1..=rows {
        let tc = text[end - r];
        current[0] = r;
        for k in 1..=m {
            let cost = usize::from(query[m - k] != tc);
            current[k] = (previous[k - 1] + cost)
                .min(previous[k] + 1)
                .min(current[k - 1] + 1);
        }

        let start = end - r;
        if r >= min_len && !text[start].is_whitespace() {
            let distance = current[m];
            let similarity = 1.0 - distance as f64 / r.max(m) as f64;
            let improves = best.map(|b| similarity > b.similarity).unwrap_or(true);
            if similarity + EPSILON >= threshold && improves {
                best = Some(Window {
                    start,
                    end,
                    similarity,
                });
            }
        }

        std::mem::swap(&mut previous, &mut current);
    }

    best
}

/// Collapse overlapping windows to their best-scoring representative
///
/// Greedy by similarity; ties prefer the earliest, then the shortest window.
fn suppress_overlaps(mut windows: Vec<Window>) -> Vec<Window> {
    windows.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.start.cmp(&b.start))
            .then((a.end - a.start).cmp(&(b.end - b.start)))
    });

    let mut kept: Vec<Window> = Vec::new();
    for window in windows {
        if !kept.iter().any(|k| k.overlaps(&window)) {
            kept.push(window);
        }
    }

    kept
}
