//! Finding, candidate and resolution types.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One vague-language detection returned by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Position in the classifier's returned list (stable identity)
    pub ordinal: usize,
    /// Sentence as echoed by the model
    pub quoted_text: String,
    /// Why the sentence is vague
    pub explanation: String,
    /// Suggested rewrite
    pub suggestion: String,
}

impl Finding {
    pub fn new(
        ordinal: usize,
        quoted_text: impl Into<String>,
        explanation: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            ordinal,
            quoted_text: quoted_text.into(),
            explanation: explanation.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// How a candidate span was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Case-folded exact substring
    Exact,
    /// Edit-distance window above the acceptance threshold
    Approximate,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Approximate => "approximate",
        }
    }
}

/// A possible location for a finding in normalized coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub ordinal: usize,
    /// Char range in the normalized buffer
    pub span: Range<usize>,
    /// 1.0 for exact matches, otherwise normalized edit-distance similarity
    pub similarity: f64,
    pub method: MatchMethod,
}

/// Resolution status for a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Linked to a document location
    Resolved,
    /// No acceptable span could be claimed
    Unresolved,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Resolved => "resolved",
            Status::Unresolved => "unresolved",
        }
    }
}

/// Reason for unresolved status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Quoted text was empty or whitespace only
    EmptyQuote,
    /// No span cleared the acceptance threshold
    NoMatch,
    /// Every candidate span was already claimed by an earlier finding
    AlreadyClaimed,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::EmptyQuote => "empty_quote",
            UnresolvedReason::NoMatch => "no_match",
            UnresolvedReason::AlreadyClaimed => "already_claimed",
        }
    }
}

/// A displayable location: always a single page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based page number
    pub page: u32,
    /// Raw char offset range within the page text
    pub raw_start: usize,
    pub raw_end: usize,
    /// The matched span continued onto a following page and was clipped
    #[serde(default)]
    pub crosses_page: bool,
}

/// Outcome of resolving one finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        location: Location,
        /// Claimed span in normalized coordinates
        span: Range<usize>,
        similarity: f64,
        method: MatchMethod,
        /// Number of candidates the matcher produced
        candidate_count: usize,
    },
    Unresolved {
        reason: UnresolvedReason,
        candidate_count: usize,
    },
}

/// A finding joined with its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFinding {
    pub finding: Finding,
    pub resolution: Resolution,
}

impl ResolvedFinding {
    /// Create a resolved entry
    pub fn new_resolved(
        finding: Finding,
        candidate: &MatchCandidate,
        location: Location,
        candidate_count: usize,
    ) -> Self {
        Self {
            finding,
            resolution: Resolution::Resolved {
                location,
                span: candidate.span.clone(),
                similarity: candidate.similarity,
                method: candidate.method,
                candidate_count,
            },
        }
    }

    /// Create an unresolved entry
    pub fn new_unresolved(finding: Finding, reason: UnresolvedReason, candidate_count: usize) -> Self {
        Self {
            finding,
            resolution: Resolution::Unresolved {
                reason,
                candidate_count,
            },
        }
    }

    pub fn status(&self) -> Status {
        match self.resolution {
            Resolution::Resolved { .. } => Status::Resolved,
            Resolution::Unresolved { .. } => Status::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status() == Status::Resolved
    }

    pub fn location(&self) -> Option<&Location> {
        match &self.resolution {
            Resolution::Resolved { location, .. } => Some(location),
            Resolution::Unresolved { .. } => None,
        }
    }

    /// Claimed normalized span, if resolved
    pub fn span(&self) -> Option<Range<usize>> {
        match &self.resolution {
            Resolution::Resolved { span, .. } => Some(span.clone()),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn unresolved_reason(&self) -> Option<UnresolvedReason> {
        match self.resolution {
            Resolution::Unresolved { reason, .. } => Some(reason),
            Resolution::Resolved { .. } => None,
        }
    }
}
