//! vaguelink - Locate LLM-flagged vague language in documents
//!
//! A language model reads a document and returns the sentences it finds
//! vague, echoed back in its own words. vaguelink finds each of those
//! sentences again in the original PDF or text file and reports its page,
//! raw character range and, for PDFs, its bounding box.
//!
//! # Architecture
//!
//! Locating echoed text is the hard part:
//! - Page text is normalized (whitespace, hyphenation, case) with an exact
//!   offset map back to raw page coordinates
//! - Quotes are matched exactly, then approximately by edit distance
//! - Each finding claims one span; no two findings share text
//!
//! # Modules
//!
//! - `document`: Extraction of pages from PDF and text files
//! - `normalize`: Normalized text and the offset map
//! - `classifier`: Model boundary (Gemini, findings files)
//! - `linking`: Span matching and location resolution
//! - `report`: Report records and export formats
//! - `core`: End-to-end analysis
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Analyze a document with Gemini
//! GEMINI_API_KEY=... vaguelink analyze contract.pdf --format markdown
//!
//! # One model call per sentence, exported as CSV
//! GEMINI_API_KEY=... vaguelink analyze paper.pdf --mode sentence --format csv
//!
//! # Re-link a saved findings file
//! vaguelink link contract.pdf --findings findings.json
//!
//! # Debug a single quote
//! vaguelink locate contract.pdf "the works shall be completed soon"
//! ```

pub mod classifier;
pub mod cli;
pub mod config;
pub mod core;
pub mod document;
pub mod linking;
pub mod normalize;
pub mod report;

// Re-export main types at crate root for convenience
pub use classifier::{AnalysisMode, Classification, Classifier, ClassifierError, FileClassifier, GeminiClassifier, UnitStats};
pub use core::Analyzer;
pub use document::{BoundingBox, Document, ExtractionError, Page};
pub use linking::{link_findings, Finding, Location, MatchingConfig, ResolvedFinding, UnresolvedReason};
pub use normalize::{NormalizedDocument, OffsetMap};
pub use report::{AnalysisReport, ExportFormat, FindingRecord};
