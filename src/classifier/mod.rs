//! Finding classifiers: the boundary to the language model.
//!
//! A classifier turns document text into a list of [`Finding`]s. The model
//! output is untrusted: fields may be missing, quotes may be paraphrased or
//! empty, and the same sentence may be returned twice. Nothing here tries
//! to fix that up; the linking stage decides what can be located.

pub mod chunk;
pub mod file;
pub mod gemini;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linking::Finding;

pub use chunk::{chunk_text, context_window, segment_sentences, split_sentences};
pub use file::FileClassifier;
pub use gemini::GeminiClassifier;

/// Errors at the classifier boundary
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("No Gemini API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Failed to read findings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClassifierError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Http(_) | ClassifierError::Timeout(_) => true,
            ClassifierError::MalformedResponse(_) => true,
            ClassifierError::Api { status, .. } => *status == 429 || *status >= 500,
            ClassifierError::MissingApiKey | ClassifierError::Io { .. } => false,
        }
    }
}

/// Unit of text sent to the model in one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Paragraphs, merged and split to the configured sizes
    #[default]
    Paragraph,
    /// Single sentences with their neighbours as context
    Sentence,
}

impl AnalysisMode {
    /// Plural unit name for reports
    pub fn unit_label(&self) -> &'static str {
        match self {
            AnalysisMode::Paragraph => "paragraphs",
            AnalysisMode::Sentence => "sentences",
        }
    }
}

/// Per-unit counts from a classification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub mode: AnalysisMode,
    /// Units sent to the model
    pub analyzed: usize,
    /// Units with at least one finding
    pub vague: usize,
}

impl UnitStats {
    pub fn clear(&self) -> usize {
        self.analyzed.saturating_sub(self.vague)
    }

    /// Share of vague units as a percentage
    pub fn vague_percent(&self) -> f64 {
        if self.analyzed == 0 {
            return 0.0;
        }
        self.vague as f64 / self.analyzed as f64 * 100.0
    }

    /// 100 minus the vague percentage; 100 when nothing was analyzed
    pub fn clarity_score(&self) -> f64 {
        100.0 - self.vague_percent()
    }
}

/// Output of one classifier run
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Findings with ordinals assigned in returned order
    pub findings: Vec<Finding>,
    /// Unit counts, when the classifier works unit by unit
    pub units: Option<UnitStats>,
}

/// Produces findings for a document's text
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Human-readable classifier name
    fn name(&self) -> &str;

    /// Classify raw document text (pages joined by blank lines)
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}

/// Retry policy for failed model calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Model and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Gemini model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Timeout for one model call in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Target chunk size in chars when long text is split at sentence ends
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Paragraphs shorter than this are merged with their neighbours
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,

    /// Paragraph or sentence requests
    #[serde(default)]
    pub mode: AnalysisMode,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// API key, normally taken from GEMINI_API_KEY
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout_seconds() -> u64 {
    120
}
fn default_chunk_chars() -> usize {
    500
}
fn default_min_paragraph_chars() -> usize {
    50
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout_seconds(),
            chunk_chars: default_chunk_chars(),
            min_paragraph_chars: default_min_paragraph_chars(),
            mode: AnalysisMode::default(),
            retry_policy: RetryPolicy::default(),
            api_key: None,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// One finding as emitted by a model or a findings file
///
/// Accepts both the model's field names (`sentence`, `reason`) and the
/// report's (`quoted_text`, `explanation`). Missing or null fields become
/// empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFinding {
    #[serde(default, alias = "sentence", alias = "quote")]
    pub quoted_text: Option<String>,

    #[serde(default, alias = "reason")]
    pub explanation: Option<String>,

    #[serde(default)]
    pub suggestion: Option<String>,

    /// Entries explicitly marked as not vague are dropped
    #[serde(default)]
    pub is_vague: Option<bool>,
}

impl RawFinding {
    /// True if the entry carries at least one recognised field
    pub fn has_content(&self) -> bool {
        self.quoted_text.is_some() || self.explanation.is_some() || self.suggestion.is_some() || self.is_vague.is_some()
    }

    pub fn into_finding(self, ordinal: usize) -> Finding {
        Finding::new(
            ordinal,
            self.quoted_text.unwrap_or_default(),
            self.explanation.unwrap_or_default(),
            self.suggestion.unwrap_or_default(),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FindingsPayload {
    List(Vec<RawFinding>),
    Wrapped { findings: Vec<RawFinding> },
    Single(RawFinding),
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model or file output into raw findings
///
/// Accepts a JSON array, an object with a `findings` array, or a single
/// finding object, optionally wrapped in a code fence. An entry with none
/// of the finding fields (an error object, a differently named wrapper) is
/// a malformed response rather than an empty finding.
pub fn parse_findings(text: &str) -> Result<Vec<RawFinding>, ClassifierError> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let payload: FindingsPayload =
        serde_json::from_str(body).map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

    let raw = match payload {
        FindingsPayload::List(list) => list,
        FindingsPayload::Wrapped { findings } => findings,
        FindingsPayload::Single(single) => vec![single],
    };

    if let Some(pos) = raw.iter().position(|f| !f.has_content()) {
        return Err(ClassifierError::MalformedResponse(format!(
            "entry {} has no finding fields",
            pos
        )));
    }

    Ok(raw.into_iter().filter(|f| f.is_vague != Some(false)).collect())
}

/// Number raw findings consecutively starting at `first_ordinal`
pub fn assign_ordinals(raw: Vec<RawFinding>, first_ordinal: usize) -> Vec<Finding> {
    raw.into_iter()
        .enumerate()
        .map(|(i, f)| f.into_finding(first_ordinal + i))
        .collect()
}
