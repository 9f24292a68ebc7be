//! Configuration for vaguelink.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VAGUELINK_THRESHOLD, VAGUELINK_WINDOW_TOLERANCE,
//!    VAGUELINK_MODEL, VAGUELINK_MODE, GEMINI_API_KEY)
//! 2. Config file (.vaguelink/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .vaguelink/config.yaml
//! - Falls back to ~/.vaguelink/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::classifier::{AnalysisMode, ClassifierConfig};
use crate::document::DocumentLimits;
use crate::linking::MatchingConfig;

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".vaguelink";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub limits: DocumentLimits,
}

/// Resolved configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedConfig {
    pub matching: MatchingConfig,
    pub classifier: ClassifierConfig,
    pub limits: DocumentLimits,
    /// Path to config file (if found)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Reject values the matcher cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.acceptance_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("matching.acceptance_threshold must be in (0, 1], got {}", threshold);
        }

        let tolerance = self.matching.window_tolerance;
        if !(0.0..1.0).contains(&tolerance) {
            anyhow::bail!("matching.window_tolerance must be in [0, 1), got {}", tolerance);
        }

        if self.classifier.chunk_chars == 0 {
            anyhow::bail!("classifier.chunk_chars must be positive");
        }

        Ok(())
    }
}

/// Find config file by searching `start` and its parents, then the home directory
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Apply environment overrides through a variable lookup
fn apply_env_overrides<F>(config: &mut ResolvedConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("VAGUELINK_THRESHOLD") {
        config.matching.acceptance_threshold = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid VAGUELINK_THRESHOLD: {}", value))?;
    }

    if let Some(value) = lookup("VAGUELINK_WINDOW_TOLERANCE") {
        config.matching.window_tolerance = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid VAGUELINK_WINDOW_TOLERANCE: {}", value))?;
    }

    if let Some(model) = lookup("VAGUELINK_MODEL").filter(|m| !m.trim().is_empty()) {
        config.classifier.model = model;
    }

    if let Some(value) = lookup("VAGUELINK_MODE") {
        config.classifier.mode = AnalysisMode::from_str(value.trim(), true)
            .map_err(|e| anyhow!("Invalid VAGUELINK_MODE: {}", e))?;
    }

    if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
        config.classifier.api_key = Some(key);
    }

    Ok(())
}

/// Load configuration starting the file search at `start`
fn load_config_with<F>(start: &Path, lookup: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_file = find_config_file(start);

    let mut config = match config_file {
        Some(ref path) => {
            let file = load_config_file(path)?;
            ResolvedConfig {
                matching: file.matching,
                classifier: file.classifier,
                limits: file.limits,
                config_file: Some(path.clone()),
            }
        }
        None => ResolvedConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_with(&cwd, |name| std::env::var(name).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
