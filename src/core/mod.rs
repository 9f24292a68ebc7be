//! Core orchestration logic.
//!
//! This module contains:
//! - Analyzer: runs a document through extraction, normalization,
//!   classification, linking and aggregation

pub mod analyzer;

pub use analyzer::Analyzer;
