//! Normalized-to-raw offset map.
//!
//! The map is an ordered list of segments built once while normalizing and
//! never modified afterwards. Segments are contiguous in normalized
//! coordinates and cover the whole normalized buffer, so any normalized
//! offset is answered by one binary search.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// How a segment's normalized chars relate to its raw chars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Chars copied unchanged; normalized and raw lengths are equal
    Verbatim,
    /// One space standing for a raw whitespace run
    Whitespace,
    /// One space separating two pages; raw range is empty at the end of
    /// the preceding page
    PageBreak,
}

/// One normalized range and the raw page range it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Char range in the normalized buffer
    pub norm: Range<usize>,
    /// 1-based page number of the raw text
    pub page: u32,
    /// Char range in that page's raw text
    pub raw: Range<usize>,
    pub kind: SegmentKind,
}

impl Segment {
    /// Raw char offset for a normalized offset inside this segment
    ///
    /// Verbatim segments map char for char; collapsed segments map every
    /// normalized offset to the start of their raw range.
    pub fn raw_offset(&self, norm_offset: usize) -> usize {
        match self.kind {
            SegmentKind::Verbatim => self.raw.start + (norm_offset - self.norm.start),
            SegmentKind::Whitespace | SegmentKind::PageBreak => self.raw.start,
        }
    }

    /// Exclusive raw end for a span whose last normalized char is `last`
    pub fn raw_end_after(&self, last: usize) -> usize {
        match self.kind {
            SegmentKind::Verbatim => self.raw.start + (last - self.norm.start) + 1,
            SegmentKind::Whitespace | SegmentKind::PageBreak => self.raw.end,
        }
    }
}

/// Immutable, ordered segment list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetMap {
    segments: Vec<Segment>,
}

impl OffsetMap {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Normalized length covered by the map
    pub fn len(&self) -> usize {
        self.segments.last().map(|s| s.norm.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment containing a normalized offset
    pub fn segment_at(&self, norm_offset: usize) -> Option<&Segment> {
        let idx = self
            .segments
            .partition_point(|s| s.norm.end <= norm_offset);
        self.segments
            .get(idx)
            .filter(|s| s.norm.contains(&norm_offset))
    }

    /// Segments overlapping a normalized range, in order
    pub fn segments_in(&self, span: Range<usize>) -> &[Segment] {
        let first = self.segments.partition_point(|s| s.norm.end <= span.start);
        let last = self.segments.partition_point(|s| s.norm.start < span.end);
        &self.segments[first..last.max(first)]
    }
}

/// Appends segments while the normalizer walks the raw text
#[derive(Debug, Default)]
pub(crate) struct OffsetMapBuilder {
    segments: Vec<Segment>,
}

impl OffsetMapBuilder {
    pub(crate) fn push(&mut self, norm: Range<usize>, page: u32, raw: Range<usize>, kind: SegmentKind) {
        debug_assert_eq!(norm.start, self.len(), "segments must be contiguous");
        debug_assert!(kind != SegmentKind::Verbatim || norm.len() == raw.len());
        self.segments.push(Segment {
            norm,
            page,
            raw,
            kind,
        });
    }

    /// Append another builder's segments shifted by `offset` normalized chars
    pub(crate) fn append_shifted(&mut self, other: OffsetMapBuilder, offset: usize) {
        self.segments.extend(other.segments.into_iter().map(|mut s| {
            s.norm = (s.norm.start + offset)..(s.norm.end + offset);
            s
        }));
    }

    pub(crate) fn len(&self) -> usize {
        self.segments.last().map(|s| s.norm.end).unwrap_or(0)
    }

    pub(crate) fn build(self) -> OffsetMap {
        OffsetMap {
            segments: self.segments,
        }
    }
}
