//! Location linking: from model-echoed quotes to document positions
//!
//! Each finding's quoted text is searched for in the normalized document
//! (exact first, then approximate), one non-overlapping span is claimed per
//! finding in ordinal order, and the span is translated back to a page and
//! raw character range through the offset map.
//!
//! # Design Principles
//!
//! - **Honest unresolved**: A finding with no acceptable span is reported as
//!   unresolved with a reason, never pinned to a guessed location.
//! - **Exclusive spans**: Two findings never claim overlapping text.
//! - **Hash verification**: Reports carry the SHA-256 of the matched raw slice.
//!
//! # Example
//!
//! ```ignore
//! use vaguelink::linking::{link_findings, Finding, MatchingConfig};
//!
//! let results = link_findings(&normalized, findings, &MatchingConfig::default());
//! for result in &results {
//!     if let Some(location) = result.location() {
//!         println!("page {} [{}..{}]", location.page, location.raw_start, location.raw_end);
//!     }
//! }
//! ```

pub mod matcher;
pub mod resolver;
pub mod spans;
pub mod types;

pub use matcher::{MatchingConfig, SpanMatcher};
pub use resolver::{link, link_findings, locate, ConsumedSpans, LinkOutcome, Resolver};
pub use spans::{
    char_slice, compute_hash, compute_slice_hash, extract_anchor_text, find_exact_matches,
    offset_to_line_col, LineCol,
};
pub use types::{
    Finding, Location, MatchCandidate, MatchMethod, Resolution, ResolvedFinding, Status,
    UnresolvedReason,
};
