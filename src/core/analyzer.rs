//! End-to-end analysis: extract, normalize, classify, link, aggregate.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::classifier::{Classification, Classifier};
use crate::config::ResolvedConfig;
use crate::document::{extract_file, Document, DocumentLimits};
use crate::linking::{link_findings, Finding, MatchingConfig, ResolvedFinding};
use crate::normalize::NormalizedDocument;
use crate::report::AnalysisReport;

/// Runs one document through the pipeline
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    matching: MatchingConfig,
    limits: DocumentLimits,
}

impl Analyzer {
    pub fn new(matching: MatchingConfig, limits: DocumentLimits) -> Self {
        Self { matching, limits }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.matching.clone(), config.limits.clone())
    }

    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    /// Load a document with the configured limits
    pub async fn load(&self, path: &Path) -> Result<Document> {
        extract_file(path, &self.limits)
            .await
            .with_context(|| format!("Failed to load document: {}", path.display()))
    }

    /// Analyze a file with the given classifier
    #[instrument(skip(self, classifier), fields(path = %path.display(), classifier = classifier.name()))]
    pub async fn analyze(&self, path: &Path, classifier: &dyn Classifier) -> Result<AnalysisReport> {
        let document = self.load(path).await?;
        self.analyze_document(&document, classifier).await
    }

    /// Analyze an already extracted document
    pub async fn analyze_document(
        &self,
        document: &Document,
        classifier: &dyn Classifier,
    ) -> Result<AnalysisReport> {
        let started = Instant::now();
        let normalized = NormalizedDocument::from_document(document);

        let Classification { findings, units } = classifier
            .classify(&document.full_text())
            .await
            .with_context(|| format!("Classifier '{}' failed", classifier.name()))?;
        info!(findings = findings.len(), "Classifier returned findings");

        let resolved = self.link(&normalized, findings);
        let report = AnalysisReport::new(document, classifier.name(), units, &resolved);

        if report.summary.unresolved > 0 {
            warn!(
                unresolved = report.summary.unresolved,
                "Some findings could not be located in the document"
            );
        }
        info!(
            total = report.summary.total,
            resolved = report.summary.resolved,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(report)
    }

    /// Link findings against a normalized document
    pub fn link(&self, normalized: &NormalizedDocument, findings: Vec<Finding>) -> Vec<ResolvedFinding> {
        link_findings(normalized, findings, &self.matching)
    }
}
