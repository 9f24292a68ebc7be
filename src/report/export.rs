//! Report export: pretty JSON, JSON Lines, CSV and a Markdown summary.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{AnalysisReport, FindingRecord};

/// Output format for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Full report as pretty-printed JSON
    #[default]
    Json,
    /// One finding record per line
    Jsonl,
    /// One finding per row, flat columns
    Csv,
    /// Human-readable report
    Markdown,
}

/// Render a report in the given format
pub fn render(report: &AnalysisReport, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(report).context("Failed to serialize report"),
        ExportFormat::Jsonl => render_jsonl(&report.findings),
        ExportFormat::Csv => render_csv(&report.findings),
        ExportFormat::Markdown => render_markdown(report).context("Failed to render markdown report"),
    }
}

/// Write a rendered report to a file, or stdout when no path is given
pub fn write_report(report: &AnalysisReport, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(report, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}

fn render_jsonl(records: &[FindingRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        let line = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize finding {}", record.ordinal))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Flat CSV projection of a record; missing values are empty cells
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    ordinal: usize,
    resolved: bool,
    page: Option<u32>,
    line: Option<usize>,
    column: Option<usize>,
    raw_start: Option<usize>,
    raw_end: Option<usize>,
    crosses_page: bool,
    match_method: Option<&'static str>,
    similarity: Option<f64>,
    unresolved_reason: Option<&'static str>,
    quoted_text: &'a str,
    explanation: &'a str,
    suggestion: &'a str,
    x0: Option<f64>,
    y0: Option<f64>,
    x1: Option<f64>,
    y1: Option<f64>,
}

impl<'a> From<&'a FindingRecord> for CsvRow<'a> {
    fn from(record: &'a FindingRecord) -> Self {
        Self {
            ordinal: record.ordinal,
            resolved: record.resolved,
            page: record.page,
            line: record.line,
            column: record.column,
            raw_start: record.raw_start,
            raw_end: record.raw_end,
            crosses_page: record.crosses_page,
            match_method: record.match_method.map(|m| m.as_str()),
            similarity: record.similarity,
            unresolved_reason: record.unresolved_reason.map(|r| r.as_str()),
            quoted_text: &record.quoted_text,
            explanation: &record.explanation,
            suggestion: &record.suggestion,
            x0: record.bbox.map(|b| b.x0),
            y0: record.bbox.map(|b| b.y0),
            x1: record.bbox.map(|b| b.x1),
            y1: record.bbox.map(|b| b.y1),
        }
    }
}

fn render_csv(records: &[FindingRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        // No row to derive the header from
        writer.write_record(CSV_HEADER)?;
    }
    for record in records {
        writer
            .serialize(CsvRow::from(record))
            .with_context(|| format!("Failed to serialize finding {}", record.ordinal))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

const CSV_HEADER: [&str; 18] = [
    "ordinal",
    "resolved",
    "page",
    "line",
    "column",
    "raw_start",
    "raw_end",
    "crosses_page",
    "match_method",
    "similarity",
    "unresolved_reason",
    "quoted_text",
    "explanation",
    "suggestion",
    "x0",
    "y0",
    "x1",
    "y1",
];

fn render_markdown(report: &AnalysisReport) -> Result<String, std::fmt::Error> {
    let mut md = String::new();
    let summary = &report.summary;

    let source = report
        .source
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(in-memory text)".to_string());

    writeln!(md, "# Vagueness Analysis Report")?;
    writeln!(md)?;
    writeln!(md, "- Source: {} ({} pages)", source, report.page_count)?;
    writeln!(md, "- Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(md, "- Session: {}", report.session_id)?;
    writeln!(md)?;
    writeln!(md, "## Summary")?;
    if let Some(units) = &summary.units {
        let label = units.mode.unit_label();
        writeln!(md, "- Total {} analyzed: {}", label, units.analyzed)?;
        writeln!(md, "- Vague {}: {} ({:.1}%)", label, units.vague, units.vague_percent())?;
        writeln!(md, "- Clear {}: {}", label, units.clear())?;
        writeln!(md, "- Clarity Score: {:.1}%", units.clarity_score())?;
    }
    writeln!(md, "- Vague sentences found: {}", summary.total)?;
    writeln!(
        md,
        "- Located in document: {} ({} exact, {} approximate)",
        summary.resolved, summary.exact, summary.approximate
    )?;
    writeln!(md, "- Not located: {}", summary.unresolved)?;
    writeln!(md)?;
    writeln!(md, "## Vague Sentences Found")?;
    writeln!(md)?;

    for record in &report.findings {
        let heading = match (record.page, record.line) {
            (Some(page), Some(line)) => format!("Page {}, line {}", page, line),
            (Some(page), None) => format!("Page {}", page),
            _ => "Location unknown".to_string(),
        };
        writeln!(md, "### {}. {}", record.ordinal + 1, heading)?;
        writeln!(md)?;
        writeln!(md, "**Text:** {}", record.quoted_text)?;
        writeln!(md)?;
        writeln!(md, "**Reason:** {}", record.explanation)?;
        writeln!(md)?;
        writeln!(md, "**Suggestion:** {}", record.suggestion)?;
        writeln!(md)?;

        match (record.match_method, record.similarity, record.unresolved_reason) {
            (Some(method), Some(similarity), _) => {
                writeln!(md, "**Match:** {} (similarity {:.2})", method.as_str(), similarity)?;
            }
            (_, _, Some(reason)) => {
                writeln!(md, "**Match:** not located ({})", reason.as_str())?;
            }
            _ => {}
        }
        if let Some(b) = record.bbox {
            writeln!(md)?;
            writeln!(md, "**Box:** ({:.1}, {:.1}) to ({:.1}, {:.1})", b.x0, b.y0, b.x1, b.y1)?;
        }
        writeln!(md)?;
        writeln!(md, "---")?;
    }

    Ok(md)
}
