//! Loading of extraction routines ("prefselectors") from the extension bundle.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{QueryError, Result};

/// Subdirectory of the resources directory holding one script per strategy.
pub const PREFSELECTOR_DIR: &str = "prefselectors";

/// Global the routine script defines and the extension looks up.
pub const PREFSELECTOR_GLOBAL: &str = "BINPrefselector";

/// A site-specific extraction routine, run inside the page context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionStrategy {
    name: String,
    source: String,
}

impl ExtractionStrategy {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Script that evaluates the routine and publishes it on `window`.
    pub fn injection_script(&self) -> String {
        format!(
            "{}\nwindow.{global} = {global};",
            self.source,
            global = PREFSELECTOR_GLOBAL
        )
    }
}

/// Reads strategy scripts from disk on every lookup.
#[derive(Debug, Clone)]
pub struct StrategyLoader {
    dir: PathBuf,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl StrategyLoader {
    /// Create a loader for a resources directory (the parent of `prefselectors/`).
    pub fn new(resources_dir: &Path) -> Self {
        Self {
            dir: resources_dir.join(PREFSELECTOR_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the routine for a strategy name.
    pub fn load(&self, name: &str) -> Result<ExtractionStrategy> {
        if !is_valid_name(name) {
            return Err(QueryError::StrategyLoad {
                name: name.to_string(),
                reason: "invalid strategy name".to_string(),
            });
        }

        let path = self.dir.join(format!("{}.js", name));
        debug!("Loading strategy {} from {}", name, path.display());
        let source = std::fs::read_to_string(&path).map_err(|e| QueryError::StrategyLoad {
            name: name.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;

        Ok(ExtractionStrategy::new(name, source))
    }
}
