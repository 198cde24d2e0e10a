//! Configuration parsing and validation.
//!
//! texproof is configured via a TOML file (default: `config/texproof.toml`).
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! dir = "./data/cache"
//! large_entry_bytes = 5242880
//! stale_after_days = 30
//!
//! [chunking]
//! chunk_size = 2000
//! chunk_overlap = 100
//! default_mode = "section"
//!
//! [analysis]
//! provider = "azure"          # "disabled", "azure", or "local"
//! endpoint = "https://example.cognitiveservices.azure.com"
//! model = "prebuilt-layout"
//! timeout_secs = 120
//! ```
//!
//! The analysis API key is read from `TEXPROOF_ANALYSIS_KEY`, never from
//! the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use texproof_core::SplitMode;

/// Environment variable holding the analysis service key.
pub const ANALYSIS_KEY_ENV: &str = "TEXPROOF_ANALYSIS_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Root directory: `cache_metadata.db`, `full_documents/`, `pages/`.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Entries above this size are reported as large.
    #[serde(default = "default_large_entry_bytes")]
    pub large_entry_bytes: u64,
    /// Entries not accessed for this many days are reported as stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            large_entry_bytes: default_large_entry_bytes(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

impl CacheConfig {
    /// Cache rooted at `dir` with default thresholds.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join("cache_metadata.db")
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}
fn default_large_entry_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_stale_after_days() -> u32 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_mode")]
    pub default_mode: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            default_mode: default_mode(),
        }
    }
}

impl ChunkingConfig {
    pub fn engine_config(&self) -> texproof_core::ChunkingConfig {
        texproof_core::ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            min_chars: self.min_chars,
            max_chars: self.max_chars,
        }
    }

    pub fn mode(&self) -> Result<SplitMode> {
        self.default_mode
            .parse()
            .with_context(|| "Invalid chunking.default_mode")
    }
}

fn default_chunk_size() -> usize {
    texproof_core::chunk::DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    texproof_core::chunk::DEFAULT_CHUNK_OVERLAP
}
fn default_min_chars() -> usize {
    texproof_core::chunk::MIN_CHARS
}
fn default_max_chars() -> usize {
    texproof_core::chunk::MAX_CHARS
}
fn default_mode() -> String {
    "section".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: default_model(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "prebuilt-layout".to_string()
}
fn default_api_version() -> String {
    "2023-07-31".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_poll_interval_ms() -> u64 {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if chunking.chunk_overlap >= chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }
    if chunking.min_chars > chunking.max_chars {
        anyhow::bail!("chunking.min_chars must be <= chunking.max_chars");
    }
    chunking.mode()?;

    // Validate analysis
    let analysis = &config.analysis;
    if analysis.timeout_secs == 0 {
        anyhow::bail!("analysis.timeout_secs must be > 0");
    }
    match analysis.provider.as_str() {
        "disabled" | "local" => {}
        "azure" => {
            if analysis.endpoint.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("analysis.endpoint must be specified when provider is 'azure'");
            }
        }
        other => anyhow::bail!(
            "Unknown analysis provider: '{}'. Must be disabled, azure, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.cache.large_entry_bytes, 5 * 1024 * 1024);
        assert_eq!(config.cache.stale_after_days, 30);
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.mode().unwrap(), SplitMode::Section);
        assert!(!config.analysis.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_below_size() {
        let err = parse("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(parse("[chunking]\ndefault_mode = \"paragraph\"\n").is_err());
    }

    #[test]
    fn test_azure_requires_endpoint() {
        assert!(parse("[analysis]\nprovider = \"azure\"\n").is_err());
        let config =
            parse("[analysis]\nprovider = \"azure\"\nendpoint = \"https://x.example\"\n").unwrap();
        assert!(config.analysis.is_enabled());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[analysis]\nprovider = \"gcp\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown analysis provider"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texproof.toml");
        std::fs::write(&path, "[cache]\ndir = \"/tmp/tp\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/tp"));
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
