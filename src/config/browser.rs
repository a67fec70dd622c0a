//! Browser configuration types.
//!
//! These live here (always compiled) rather than behind
//! `#[cfg(feature = "browser")]` so that config parsing works without the
//! browser feature.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserConfig {
    /// Run the primary session without a window (default: true).
    /// The challenge-recovery session is always visible.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium executable. Discovered automatically when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Unpacked citation extension to load into every session.
    #[serde(default)]
    pub extension_dir: Option<PathBuf>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Inject stealth evasion scripts into headless pages.
    #[serde(default = "default_stealth")]
    pub stealth: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            extension_dir: None,
            proxy: None,
            timeout: default_timeout(),
            stealth: default_stealth(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Apply environment variable overrides.
    ///
    /// - `CHROME_PATH` - Chrome/Chromium executable
    /// - `BIBQUERY_EXTENSION` - Unpacked extension directory
    /// - `SOCKS_PROXY` - Proxy for browser traffic, unless one is configured
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env_path("CHROME_PATH") {
            self.chrome_path = Some(path);
        }

        if let Some(path) = env_path("BIBQUERY_EXTENSION") {
            self.extension_dir = Some(path);
        }

        if self.proxy.is_none() {
            if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
                if !proxy.is_empty() {
                    self.proxy = Some(proxy);
                }
            }
        }

        self
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| PathBuf::from(shellexpand::tilde(&v).as_ref()))
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

pub fn default_stealth() -> bool {
    true
}
