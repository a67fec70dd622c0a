//! Configuration management for bibquery using the prefer crate.

pub mod browser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::strategy::PathCandidatePolicy;

pub use browser::BrowserConfig;

/// Default Google Scholar base URL.
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Default cookie cache filename inside the per-user cache directory.
pub const COOKIE_CACHE_FILENAME: &str = "scholar_cookies.json";

/// Application directory name under the per-user data and cache directories.
const APP_DIR: &str = "bibquery";

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the adjuster rule list and `prefselectors/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_dir: Option<String>,
    /// Scholar cookie cache file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_cache: Option<String>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub query: QueryConfig,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Extraction and orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Deadline for each bounded wait, in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub timeout: u64,
    /// Interval between DOM polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Google Scholar base URL.
    #[serde(default = "default_scholar_url")]
    pub scholar_url: String,
    /// Fall back to a Scholar search when the extension fails.
    #[serde(default = "default_enabled")]
    pub scholar: bool,
    /// Open a visible browser for a human to solve Scholar challenges.
    #[serde(default = "default_enabled")]
    pub recovery: bool,
    /// Grace period for the human-assisted search, in seconds.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout: u64,
    /// Which candidate list path-list rules are checked against.
    #[serde(default)]
    pub path_candidates: PathCandidatePolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: default_extraction_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            scholar_url: default_scholar_url(),
            scholar: default_enabled(),
            recovery: default_enabled(),
            recovery_timeout: default_recovery_timeout(),
            path_candidates: PathCandidatePolicy::default(),
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout)
    }

    /// Scholar home page, the domain the cookie cache belongs to.
    pub fn scholar_home(&self) -> String {
        format!("{}/", self.scholar_url.trim_end_matches('/'))
    }

    /// Scholar search form URL.
    pub fn scholar_search_url(&self) -> String {
        format!("{}/?", self.scholar_url.trim_end_matches('/'))
    }

    /// Host of the Scholar URL (e.g., "scholar.google.com").
    pub fn scholar_host(&self) -> Result<String, QueryError> {
        url::Url::parse(&self.scholar_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .ok_or_else(|| {
                QueryError::Config(format!("Invalid Scholar URL '{}'", self.scholar_url))
            })
    }
}

fn default_extraction_timeout() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_scholar_url() -> String {
    DEFAULT_SCHOLAR_URL.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_recovery_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration via prefer's file discovery, falling back to defaults.
    pub async fn load() -> Self {
        match prefer::load("bibquery").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Default configuration with environment overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, QueryError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| QueryError::Config(format!("Failed to read config file: {}", e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Parse configuration text in the given format ("toml", "yaml"/"yml", else JSON).
    pub fn parse(contents: &str, format: &str) -> Result<Self, QueryError> {
        match format {
            "toml" => toml::from_str(contents)
                .map_err(|e| QueryError::Config(format!("Failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| QueryError::Config(format!("Failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| QueryError::Config(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// - `BIBQUERY_RESOURCES` - Extension resources directory
    /// - `BIBQUERY_COOKIE_CACHE` - Scholar cookie cache file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BIBQUERY_RESOURCES") {
            if !val.is_empty() {
                self.resources_dir = Some(val);
            }
        }
        if let Ok(val) = std::env::var("BIBQUERY_COOKIE_CACHE") {
            if !val.is_empty() {
                self.cookie_cache = Some(val);
            }
        }
        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a configured path.
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against the config file directory, or CWD
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."))
                .join(path)
        }
    }

    /// Directory holding `urlSpecificAdjusterList.json` and `prefselectors/`.
    pub fn resources_dir(&self) -> PathBuf {
        match self.resources_dir {
            Some(ref dir) => self.resolve_path(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(APP_DIR)
                .join("res"),
        }
    }

    /// Location of the Scholar cookie cache.
    pub fn cookie_cache_path(&self) -> PathBuf {
        match self.cookie_cache {
            Some(ref path) => self.resolve_path(path),
            None => dirs::cache_dir()
                .unwrap_or_else(|| {
                    dirs::home_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join(".cache")
                })
                .join(APP_DIR)
                .join(COOKIE_CACHE_FILENAME),
        }
    }
}
