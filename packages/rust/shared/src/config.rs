//! Application configuration for policygraph.
//!
//! User config lives at `~/.policygraph/policygraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyGraphError, Result};
use crate::types::Source;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "policygraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".policygraph";

/// Default User-Agent sent with every crawl request.
pub const DEFAULT_USER_AGENT: &str = concat!("PolicyGraphCrawler/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Export mode
// ---------------------------------------------------------------------------

/// How an export run treats previously persisted graph files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Delete prior files, write only this run's records.
    Fresh,
    /// Union with existing records by id (existing record wins).
    #[default]
    Merge,
    /// Append after existing records with no dedup against them.
    Append,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportMode::Fresh => "fresh",
            ExportMode::Merge => "merge",
            ExportMode::Append => "append",
        })
    }
}

impl FromStr for ExportMode {
    type Err = PolicyGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fresh" => Ok(ExportMode::Fresh),
            "merge" => Ok(ExportMode::Merge),
            "append" => Ok(ExportMode::Append),
            other => Err(PolicyGraphError::config(format!(
                "invalid export mode '{other}': expected fresh, merge or append"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching policygraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP politeness and retry settings.
    #[serde(default)]
    pub fetcher: FetcherSection,

    /// Graph export settings.
    #[serde(default)]
    pub export: ExportSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving `nodes.jsonl` and `edges.jsonl`.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// On-disk HTTP response cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Accepted pages per source.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Export mode.
    #[serde(default)]
    pub mode: ExportMode,

    /// Sources ingested when none are given on the command line.
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            cache_dir: default_cache_dir(),
            max_pages: default_max_pages(),
            mode: ExportMode::default(),
            sources: default_sources(),
        }
    }
}

fn default_out_dir() -> String {
    "data".into()
}
fn default_cache_dir() -> String {
    ".cache".into()
}
fn default_max_pages() -> usize {
    300
}
fn default_sources() -> Vec<Source> {
    Source::ALL.to_vec()
}

/// `[fetcher]` section. Durations are in (fractional) seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherSection {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Lower bound of the random pause before every request.
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,

    /// Upper bound of the random pause before every request.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Retries after the first attempt for retryable failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Retry `n` waits `backoff_factor_secs * 2^n` plus jitter.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor_secs: f64,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: f64,
}

impl Default for FetcherSection {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            retries: default_retries(),
            backoff_factor_secs: default_backoff_factor(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_min_delay() -> f64 {
    1.0
}
fn default_max_delay() -> f64 {
    3.0
}
fn default_retries() -> u32 {
    3
}
fn default_backoff_factor() -> f64 {
    1.0
}
fn default_timeout() -> f64 {
    20.0
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    /// Maximum characters per chunk before splitting.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Characters shared between consecutive split chunks.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    3500
}
fn default_overlap_chars() -> usize {
    300
}

impl AppConfig {
    /// Reject settings the crawler or exporter cannot honour.
    pub fn validate(&self) -> Result<()> {
        let f = &self.fetcher;
        let timings = [f.min_delay_secs, f.max_delay_secs, f.backoff_factor_secs, f.timeout_secs];
        if timings.iter().any(|v| !v.is_finite()) {
            return Err(PolicyGraphError::config("fetcher timings must be finite numbers"));
        }
        if f.min_delay_secs < 0.0 || f.max_delay_secs < f.min_delay_secs {
            return Err(PolicyGraphError::config(format!(
                "fetcher delay window [{}, {}] is invalid",
                f.min_delay_secs, f.max_delay_secs
            )));
        }
        if f.backoff_factor_secs < 0.0 || f.timeout_secs <= 0.0 {
            return Err(PolicyGraphError::config(
                "backoff_factor_secs must be >= 0 and timeout_secs > 0",
            ));
        }
        if self.defaults.max_pages == 0 {
            return Err(PolicyGraphError::config("max_pages must be at least 1"));
        }
        let e = &self.export;
        if e.max_chunk_chars == 0 || e.overlap_chars >= e.max_chunk_chars {
            return Err(PolicyGraphError::config(format!(
                "overlap_chars ({}) must be below max_chunk_chars ({})",
                e.overlap_chars, e.max_chunk_chars
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub cache_dir: PathBuf,
    pub user_agent: String,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retries: u32,
    pub backoff_factor: Duration,
    /// Upper bound of the random jitter added to each backoff.
    pub max_jitter: Duration,
    pub timeout: Duration,
}

impl FetchConfig {
    /// No delays or jitter; for tests against local mock servers.
    pub fn immediate(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retries: 3,
            backoff_factor: Duration::ZERO,
            max_jitter: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        let f = &config.fetcher;
        Self {
            cache_dir: PathBuf::from(&config.defaults.cache_dir),
            user_agent: f.user_agent.clone(),
            min_delay: secs(f.min_delay_secs),
            max_delay: secs(f.max_delay_secs),
            retries: f.retries,
            backoff_factor: secs(f.backoff_factor_secs),
            max_jitter: Duration::from_millis(500),
            timeout: secs(f.timeout_secs),
        }
    }
}

/// Runtime export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
    pub max_chunk_chars: usize,
    pub overlap_chars: usize,
    pub mode: ExportMode,
}

impl From<&AppConfig> for ExportConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            out_dir: PathBuf::from(&config.defaults.out_dir),
            max_chunk_chars: config.export.max_chunk_chars,
            overlap_chars: config.export.overlap_chars,
            mode: config.defaults.mode,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.policygraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PolicyGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.policygraph/policygraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PolicyGraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PolicyGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PolicyGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PolicyGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PolicyGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_chunk_chars"));
        assert!(toml_str.contains("tiktok_community_guidelines"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_pages, 300);
        assert_eq!(parsed.defaults.mode, ExportMode::Merge);
        assert_eq!(parsed.export.overlap_chars, 300);
        assert_eq!(parsed.fetcher.retries, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
out_dir = "/tmp/graph"
mode = "fresh"
sources = ["youtube_policies"]

[export]
max_chunk_chars = 2000
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.out_dir, "/tmp/graph");
        assert_eq!(config.defaults.mode, ExportMode::Fresh);
        assert_eq!(config.defaults.sources, vec![Source::YoutubePolicies]);
        assert_eq!(config.export.max_chunk_chars, 2000);
        assert_eq!(config.export.overlap_chars, 300);
        assert_eq!(config.fetcher.min_delay_secs, 1.0);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.min_delay, Duration::from_secs(1));
        assert_eq!(fetch.max_delay, Duration::from_secs(3));
        assert_eq!(fetch.timeout, Duration::from_secs(20));
        assert_eq!(fetch.cache_dir, PathBuf::from(".cache"));

        let export = ExportConfig::from(&app);
        assert_eq!(export.max_chunk_chars, 3500);
        assert_eq!(export.mode, ExportMode::Merge);
    }

    #[test]
    fn validation_rejects_bad_windows() {
        let mut config = AppConfig::default();
        config.fetcher.min_delay_secs = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.export.overlap_chars = config.export.max_chunk_chars;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_non_finite_timings() {
        let mut config = AppConfig::default();
        config.fetcher.max_delay_secs = f64::INFINITY;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("finite"));

        let mut config = AppConfig::default();
        config.fetcher.timeout_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fetcher.backoff_factor_secs = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policygraph.toml");
        std::fs::write(&path, "[export]\nmax_chunk_chars = 100\noverlap_chars = 200\n").unwrap();
        assert!(load_config_from(&path).is_err());

        std::fs::write(&path, "[fetcher]\ntimeout_secs = inf\n").unwrap();
        assert!(load_config_from(&path).is_err());

        std::fs::write(&path, "[defaults]\nmax_pages = 5\n").unwrap();
        let config = load_config_from(&path).expect("valid config");
        assert_eq!(config.defaults.max_pages, 5);
    }

    #[test]
    fn export_mode_parsing() {
        assert_eq!("MERGE".parse::<ExportMode>().unwrap(), ExportMode::Merge);
        assert_eq!("append".parse::<ExportMode>().unwrap(), ExportMode::Append);
        assert!("upsert".parse::<ExportMode>().is_err());
        assert_eq!(ExportMode::Fresh.to_string(), "fresh");
    }
}
