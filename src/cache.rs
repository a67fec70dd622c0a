//! On-disk cache of Google Scholar session cookies.
//!
//! Written after a human solved a Scholar challenge, read when a session is
//! initialized so later searches reuse the unlocked session. Expiry is left to
//! the browser, which honours the cookies' own expiry attributes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::driver::SessionCookie;
use crate::error::{QueryError, Result};

/// Scholar cookie cache stored as a JSON array of cookie records.
#[derive(Debug, Clone)]
pub struct CookieCache {
    path: PathBuf,
    host: String,
}

impl CookieCache {
    /// Create a cache at `path` for cookies sent to `host`.
    pub fn new(path: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Keep only cookies a browser would send to the cache's host.
    pub fn scholar_cookies(&self, cookies: &[SessionCookie]) -> Vec<SessionCookie> {
        cookies
            .iter()
            .filter(|c| c.applies_to_host(&self.host))
            .cloned()
            .collect()
    }

    /// Read cached cookies. A missing file is an empty cache.
    pub fn load(&self) -> Result<Vec<SessionCookie>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cookie cache at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(QueryError::Cache(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let cookies: Vec<SessionCookie> = serde_json::from_str(&content).map_err(|e| {
            QueryError::Cache(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        debug!(
            "Loaded {} cookies from {}",
            cookies.len(),
            self.path.display()
        );
        Ok(cookies)
    }

    /// Replace the cache with the Scholar cookies among `cookies`.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers see either the old or the new cache. Returns the number saved.
    pub fn save(&self, cookies: &[SessionCookie]) -> Result<usize> {
        let cookies = self.scholar_cookies(cookies);
        let json = serde_json::to_string_pretty(&cookies)
            .map_err(|e| QueryError::Cache(format!("Failed to serialize cookies: {}", e)))?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| {
            QueryError::Cache(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| QueryError::Cache(format!("Failed to create temp file: {}", e)))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| QueryError::Cache(format!("Failed to write cookies: {}", e)))?;
        tmp.persist(&self.path).map_err(|e| {
            QueryError::Cache(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        info!("Saved {} cookies to {}", cookies.len(), self.path.display());
        Ok(cookies.len())
    }

    /// Delete the cache file. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(QueryError::Cache(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
