//! Command-line interface for vaguelink.
//!
//! Provides commands for analyzing a document with the model, re-linking a
//! saved findings file, locating a single quote, and inspecting the
//! normalized text and resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::classifier::{AnalysisMode, Classifier, FileClassifier, GeminiClassifier};
use crate::config::{self, ResolvedConfig};
use crate::core::Analyzer;
use crate::linking::{locate, Finding, SpanMatcher};
use crate::normalize::{NormalizedDocument, SegmentKind};
use crate::report::{aggregate, write_report, AnalysisReport, ExportFormat};

/// vaguelink - Locate vague language flagged by an LLM in PDF and text documents
#[derive(Parser, Debug)]
#[command(name = "vaguelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a document with Gemini and link findings to their locations
    Analyze {
        /// PDF or text file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Gemini model (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Send paragraphs or single sentences to the model (overrides config)
        #[arg(long, value_enum)]
        mode: Option<AnalysisMode>,
    },

    /// Link findings from a JSON file to their locations in a document
    Link {
        /// PDF or text file
        file: PathBuf,

        /// Findings JSON ([{sentence|quoted_text, reason|explanation, suggestion}])
        #[arg(long)]
        findings: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show match candidates and the resolved location for one quote
    Locate {
        /// PDF or text file
        file: PathBuf,

        /// Text to search for
        quote: String,

        /// Maximum number of candidates to show
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Print the normalized text of a document
    Normalize {
        /// PDF or text file
        file: PathBuf,

        /// Print the offset map segments instead of the text
        #[arg(long)]
        segments: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                file,
                format,
                output,
                model,
                mode,
            } => analyze(&file, format, output, model, mode).await,
            Commands::Link {
                file,
                findings,
                format,
                output,
            } => link(&file, findings, format, output).await,
            Commands::Locate { file, quote, limit } => locate_quote(&file, &quote, limit).await,
            Commands::Normalize { file, segments } => normalize(&file, segments).await,
            Commands::Config => show_config(),
        }
    }
}

/// Run the full pipeline with the Gemini classifier
async fn analyze(
    file: &Path,
    format: ExportFormat,
    output: Option<PathBuf>,
    model: Option<String>,
    mode: Option<AnalysisMode>,
) -> Result<()> {
    let mut cfg = config::config()?.clone();
    if let Some(model) = model {
        cfg.classifier.model = model;
    }
    if let Some(mode) = mode {
        cfg.classifier.mode = mode;
    }

    let classifier =
        GeminiClassifier::from_config(cfg.classifier.clone()).context("Failed to set up the Gemini classifier")?;
    run_and_write(&cfg, file, &classifier, format, output).await
}

/// Run the pipeline with findings read from a file
async fn link(file: &Path, findings: PathBuf, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let classifier = FileClassifier::new(findings);
    run_and_write(cfg, file, &classifier, format, output).await
}

async fn run_and_write(
    cfg: &ResolvedConfig,
    file: &Path,
    classifier: &dyn Classifier,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let report = Analyzer::from_config(cfg).analyze(file, classifier).await?;
    write_report(&report, format, output.as_deref())?;
    print_summary(&report, output.as_deref());
    Ok(())
}

fn print_summary(report: &AnalysisReport, output: Option<&Path>) {
    let summary = &report.summary;
    eprintln!(
        "\n[Session {}: {} findings, {} located ({} exact, {} approximate), {} not located]",
        report.session_id,
        summary.total,
        summary.resolved,
        summary.exact,
        summary.approximate,
        summary.unresolved
    );
    if let (Some(units), Some(clarity)) = (&summary.units, summary.clarity_score) {
        eprintln!(
            "[{} {} analyzed, {} vague, {} clear; clarity score {:.1}%]",
            units.analyzed,
            units.mode.unit_label(),
            units.vague,
            units.clear(),
            clarity
        );
    }
    if let Some(path) = output {
        eprintln!("[Report written to {}]", path.display());
    }
}

/// Show candidates and the resolved location for a single quote
async fn locate_quote(file: &Path, quote: &str, limit: usize) -> Result<()> {
    let cfg = config::config()?;
    let analyzer = Analyzer::from_config(cfg);
    let document = analyzer.load(file).await?;
    let normalized = NormalizedDocument::from_document(&document);

    let finding = Finding::new(0, quote, "", "");
    let candidates = SpanMatcher::new(&normalized, analyzer.matching()).candidates(&finding);

    println!("Quote: \"{}\"", quote);
    println!("Candidates: {}", candidates.len());
    for (rank, candidate) in candidates.iter().take(limit).enumerate() {
        let place = locate(&normalized, &candidate.span)
            .map(|l| format!("page {} [{}..{}]", l.page, l.raw_start, l.raw_end))
            .unwrap_or_else(|| "(no location)".to_string());
        println!(
            "  {}. {:<11} {:.3}  {}  \"{}\"",
            rank + 1,
            candidate.method.as_str(),
            candidate.similarity,
            place,
            normalized.slice(candidate.span.clone())
        );
    }
    if candidates.len() > limit {
        println!("  ... {} more", candidates.len() - limit);
    }

    let resolved = analyzer.link(&normalized, vec![finding]);
    let records = aggregate(&document, &resolved);
    println!();
    match records.first() {
        Some(record) if record.resolved => {
            println!("Resolved:");
            if let (Some(page), Some(start), Some(end)) = (record.page, record.raw_start, record.raw_end) {
                println!("  Page:     {} (chars {}..{})", page, start, end);
            }
            if let (Some(line), Some(column)) = (record.line, record.column) {
                println!("  Position: line {}, col {}", line, column);
            }
            if record.crosses_page {
                println!("  (span continues on the next page; clipped)");
            }
            if let Some(b) = record.bbox {
                println!("  Box:      ({:.1}, {:.1}) to ({:.1}, {:.1})", b.x0, b.y0, b.x1, b.y1);
            }
            if let Some(anchor) = &record.anchor_text {
                println!("  Anchor:   {}", anchor);
            }
            if let Some(hash) = &record.slice_sha256 {
                println!("  SHA256:   {}", hash);
            }
        }
        Some(record) => {
            let reason = record.unresolved_reason.map(|r| r.as_str()).unwrap_or("unknown");
            println!("Unresolved: {}", reason);
        }
        None => println!("Unresolved"),
    }

    Ok(())
}

/// Print normalized text or its offset map
async fn normalize(file: &Path, segments: bool) -> Result<()> {
    let cfg = config::config()?;
    let document = Analyzer::from_config(cfg).load(file).await?;
    let normalized = NormalizedDocument::from_document(&document);

    if !segments {
        println!("{}", normalized.text());
        return Ok(());
    }

    println!("{:>8} {:>8}  {:>4} {:>8} {:>8}  kind", "norm", "end", "page", "raw", "end");
    for segment in normalized.offset_map().segments() {
        let kind = match segment.kind {
            SegmentKind::Verbatim => "verbatim",
            SegmentKind::Whitespace => "whitespace",
            SegmentKind::PageBreak => "page_break",
        };
        println!(
            "{:>8} {:>8}  {:>4} {:>8} {:>8}  {}",
            segment.norm.start, segment.norm.end, segment.page, segment.raw.start, segment.raw.end, kind
        );
    }
    println!(
        "\n[{} segments, {} normalized chars, {} pages]",
        normalized.offset_map().segments().len(),
        normalized.len(),
        document.page_count()
    );

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("vaguelink configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!(
        "API key:     {}",
        if cfg.classifier.api_key.is_some() {
            "set (GEMINI_API_KEY)"
        } else {
            "not set"
        }
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(cfg).context("Failed to render configuration")?
    );

    Ok(())
}
