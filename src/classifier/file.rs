//! Offline classifier reading findings from a JSON file.
//!
//! Useful for re-linking a saved model response, or for findings produced
//! by another tool. The document text is ignored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{assign_ordinals, parse_findings, Classification, Classifier, ClassifierError};

/// Classifier backed by a findings file
#[derive(Debug, Clone)]
pub struct FileClassifier {
    path: PathBuf,
}

impl FileClassifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Classifier for FileClassifier {
    fn name(&self) -> &str {
        "file"
    }

    async fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ClassifierError::Io {
                path: self.path.clone(),
                source,
            })?;

        let findings = assign_ordinals(parse_findings(&content)?, 0);
        info!(path = %self.path.display(), findings = findings.len(), "Loaded findings file");
        Ok(Classification { findings, units: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_findings_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("findings.json");
        std::fs::write(
            &path,
            r#"[{"sentence": "Costs are low.", "reason": "No figure", "suggestion": "State the cost."},
                {"quoted_text": "It might work."}]"#,
        )
        .unwrap();

        let classifier = FileClassifier::new(&path);
        let result = classifier.classify("ignored").await.unwrap();
        assert!(result.units.is_none());

        let findings = result.findings;
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].ordinal, 0);
        assert_eq!(findings[0].explanation, "No figure");
        assert_eq!(findings[1].quoted_text, "It might work.");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let classifier = FileClassifier::new("/nonexistent/findings.json");
        let err = classifier.classify("").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Io { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("findings.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileClassifier::new(&path).classify("").await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }
}
