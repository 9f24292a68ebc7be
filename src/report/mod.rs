//! Result aggregation: resolved findings to report records.
//!
//! Aggregation is a pure, order-preserving projection. Each record carries
//! the raw location plus a line/column, a one-line anchor snippet and the
//! SHA-256 of the located raw slice, so a reader can verify the location
//! against the source page without re-running the analysis.

pub mod export;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::UnitStats;
use crate::document::{BoundingBox, Document, DocumentSource};
use crate::linking::{
    compute_slice_hash, extract_anchor_text, offset_to_line_col, MatchMethod, Resolution,
    ResolvedFinding, UnresolvedReason,
};

pub use export::{render, write_report, ExportFormat};

/// Context chars included in an anchor snippet
const ANCHOR_WINDOW: usize = 120;

/// One exported finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub ordinal: usize,
    pub quoted_text: String,
    pub explanation: String,
    pub suggestion: String,

    pub resolved: bool,
    /// Location fields are null for unresolved findings
    pub page: Option<u32>,
    pub raw_start: Option<usize>,
    pub raw_end: Option<usize>,
    #[serde(default)]
    pub crosses_page: bool,
    /// Box of the located chars on `page`, PDF input only
    #[serde(default)]
    pub bbox: Option<BoundingBox>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_method: Option<MatchMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_reason: Option<UnresolvedReason>,

    /// 1-based line within the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 1-based column within the line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    /// Hash of the located raw slice ("sha256:...")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_sha256: Option<String>,
}

impl FindingRecord {
    fn from_resolved(document: &Document, resolved: &ResolvedFinding) -> Self {
        let finding = &resolved.finding;
        let mut record = Self {
            ordinal: finding.ordinal,
            quoted_text: finding.quoted_text.clone(),
            explanation: finding.explanation.clone(),
            suggestion: finding.suggestion.clone(),
            resolved: false,
            page: None,
            raw_start: None,
            raw_end: None,
            crosses_page: false,
            bbox: None,
            similarity: None,
            match_method: None,
            unresolved_reason: None,
            line: None,
            column: None,
            anchor_text: None,
            slice_sha256: None,
        };

        match &resolved.resolution {
            Resolution::Resolved {
                location,
                similarity,
                method,
                ..
            } => {
                record.resolved = true;
                record.page = Some(location.page);
                record.raw_start = Some(location.raw_start);
                record.raw_end = Some(location.raw_end);
                record.crosses_page = location.crosses_page;
                record.similarity = Some(*similarity);
                record.match_method = Some(*method);

                if let Some(page) = document.page(location.page) {
                    record.bbox = page.bbox(location.raw_start, location.raw_end);
                    let line_col = offset_to_line_col(&page.text, location.raw_start);
                    record.line = Some(line_col.line);
                    record.column = Some(line_col.col);
                    record.anchor_text = Some(extract_anchor_text(
                        &page.text,
                        location.raw_start,
                        location.raw_end,
                        ANCHOR_WINDOW,
                    ));
                    record.slice_sha256 = Some(compute_slice_hash(
                        &page.text,
                        location.raw_start,
                        location.raw_end,
                    ));
                }
            }
            Resolution::Unresolved { reason, .. } => {
                record.unresolved_reason = Some(*reason);
            }
        }

        record
    }
}

/// Project resolved findings into records, preserving order
pub fn aggregate(document: &Document, resolved: &[ResolvedFinding]) -> Vec<FindingRecord> {
    resolved
        .iter()
        .map(|r| FindingRecord::from_resolved(document, r))
        .collect()
}

/// Counts over a report's findings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub exact: usize,
    pub approximate: usize,
    /// Paragraphs or sentences sent to the model, when counted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitStats>,
    /// 100 minus the share of vague units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_score: Option<f64>,
}

impl Summary {
    pub fn from_records(records: &[FindingRecord], units: Option<UnitStats>) -> Self {
        let mut summary = Self {
            total: records.len(),
            units,
            clarity_score: units.map(|u| u.clarity_score()),
            ..Default::default()
        };

        for record in records {
            if record.resolved {
                summary.resolved += 1;
            } else {
                summary.unresolved += 1;
            }
            match record.match_method {
                Some(MatchMethod::Exact) => summary.exact += 1,
                Some(MatchMethod::Approximate) => summary.approximate += 1,
                None => {}
            }
        }

        summary
    }
}

/// Full result of one analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Unique identifier for this analysis session
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: DocumentSource,
    /// Name of the classifier that produced the findings
    pub classifier: String,
    pub page_count: usize,
    pub summary: Summary,
    pub findings: Vec<FindingRecord>,
}

impl AnalysisReport {
    pub fn new(
        document: &Document,
        classifier: impl Into<String>,
        units: Option<UnitStats>,
        resolved: &[ResolvedFinding],
    ) -> Self {
        let findings = aggregate(document, resolved);
        Self {
            session_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: document.source.clone(),
            classifier: classifier.into(),
            page_count: document.page_count(),
            summary: Summary::from_records(&findings, units),
            findings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::AnalysisMode;
    use crate::document::PageLayout;
    use crate::linking::{link_findings, Finding, MatchingConfig};
    use crate::normalize::NormalizedDocument;

    fn analyze(text: &str, quotes: &[&str]) -> (Document, Vec<ResolvedFinding>) {
        let document = Document::from_text(text);
        let normalized = NormalizedDocument::from_document(&document);
        let findings = quotes
            .iter()
            .enumerate()
            .map(|(i, q)| Finding::new(i, *q, "reason", "suggestion"))
            .collect();
        let resolved = link_findings(&normalized, findings, &MatchingConfig::default());
        (document, resolved)
    }

    #[test]
    fn test_aggregate_resolved_record() {
        let (document, resolved) = analyze(
            "Title\x0CIntro line.\nThe results were some-\nwhat significant.",
            &["the results were somewhat significant."],
        );
        let records = aggregate(&document, &resolved);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.resolved);
        assert_eq!(record.page, Some(2));
        assert_eq!(record.raw_start, Some(12));
        assert_eq!(record.line, Some(2));
        assert_eq!(record.column, Some(1));
        assert_eq!(record.match_method, Some(MatchMethod::Exact));
        assert_eq!(
            record.slice_sha256.as_deref(),
            Some(compute_slice_hash("The results were some-\nwhat significant.", 0, 40).as_str())
        );
        assert!(record.anchor_text.as_deref().unwrap().contains("some- what significant"));
    }

    #[test]
    fn test_aggregate_preserves_order_and_unresolved() {
        let (document, resolved) = analyze(
            "Delivery will happen soon. Costs are reasonable.",
            &["Costs are reasonable.", "", "Delivery will happen soon."],
        );
        let records = aggregate(&document, &resolved);

        let ordinals: Vec<usize> = records.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(records[1].unresolved_reason, Some(UnresolvedReason::EmptyQuote));
        assert!(records[1].page.is_none());
        assert_eq!(records[2].raw_start, Some(0));
    }

    #[test]
    fn test_summary_counts() {
        let (document, resolved) = analyze(
            "Some preamble here. The work is done. Costs are low.",
            &["The work is now done.", "Costs are low.", "Nothing like this appears anywhere."],
        );
        let report = AnalysisReport::new(&document, "test", None, &resolved);

        assert_eq!(
            report.summary,
            Summary {
                total: 3,
                resolved: 2,
                unresolved: 1,
                exact: 1,
                approximate: 1,
                units: None,
                clarity_score: None,
            }
        );
        assert_eq!(report.page_count, 1);
        assert_eq!(report.classifier, "test");
    }

    #[test]
    fn test_unresolved_record_serialization() {
        let (document, resolved) = analyze("Short text here.", &["Missing quote"]);
        let records = aggregate(&document, &resolved);
        let json = serde_json::to_value(&records[0]).unwrap();

        assert_eq!(json["resolved"], false);
        assert_eq!(json["unresolved_reason"], "no_match");
        for key in ["page", "raw_start", "raw_end", "bbox"] {
            assert!(json.get(key).is_some(), "{key} missing");
            assert!(json[key].is_null(), "{key} not null");
        }
    }

    #[test]
    fn test_summary_clarity_from_units() {
        let (document, resolved) = analyze("Costs are low. Work is done.", &["Costs are low."]);
        let units = UnitStats {
            mode: AnalysisMode::Sentence,
            analyzed: 2,
            vague: 1,
        };
        let report = AnalysisReport::new(&document, "test", Some(units), &resolved);

        assert_eq!(report.summary.units, Some(units));
        assert_eq!(report.summary.clarity_score, Some(50.0));

        let json = serde_json::to_value(&report.summary).unwrap();
        assert_eq!(json["units"]["mode"], "sentence");
        assert_eq!(json["clarity_score"], 50.0);
    }

    #[test]
    fn test_resolved_record_carries_page_bbox() {
        let text = "Costs are low.";
        let boxes = (0..text.chars().count())
            .map(|i| {
                Some(BoundingBox {
                    x0: 72. + 6. * i as f64,
                    y0: 80.,
                    x1: 78. + 6. * i as f64,
                    y1: 92.,
                })
            })
            .collect();
        let document = Document::from_text(text).with_layouts(vec![PageLayout {
            width: 612.,
            height: 792.,
            boxes,
        }]);
        let normalized = NormalizedDocument::from_document(&document);
        let resolved = link_findings(
            &normalized,
            vec![Finding::new(0, "are low", "vague", "")],
            &MatchingConfig::default(),
        );

        let record = &aggregate(&document, &resolved)[0];
        assert_eq!(record.raw_start, Some(6));
        assert_eq!(
            record.bbox,
            Some(BoundingBox {
                x0: 108.,
                y0: 80.,
                x1: 150.,
                y1: 92.,
            })
        );
    }
}
