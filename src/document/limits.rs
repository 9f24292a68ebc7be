//! Size limits applied before a document is extracted.

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Limits on input documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLimits {
    /// Maximum raw file size in bytes (default: 25MB)
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
}

fn default_max_document_bytes() -> u64 {
    25 * 1024 * 1024
} // 25MB

impl Default for DocumentLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl DocumentLimits {
    /// Validate a raw document size against the limit
    pub fn validate_size(&self, size: u64) -> Result<(), ExtractionError> {
        if size > self.max_document_bytes {
            return Err(ExtractionError::TooLarge {
                actual: size,
                limit: self.max_document_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DocumentLimits::default();
        assert_eq!(limits.max_document_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn test_size_validation() {
        let limits = DocumentLimits {
            max_document_bytes: 100,
        };

        assert!(limits.validate_size(100).is_ok());

        let result = limits.validate_size(200);
        assert!(matches!(
            result,
            Err(ExtractionError::TooLarge {
                actual: 200,
                limit: 100
            })
        ));
    }

    #[test]
    fn test_limits_yaml_defaults() {
        let limits: DocumentLimits = serde_yaml::from_str("{}").unwrap();
        assert_eq!(limits.max_document_bytes, 25 * 1024 * 1024);
    }
}
