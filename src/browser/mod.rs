//! Chromium sessions over the DevTools protocol.
//!
//! Each launched session is its own Chrome process with a throwaway profile,
//! so the primary and recovery browsers never share state except through the
//! cookie cache.

pub mod chrome;
#[cfg(feature = "browser")]
mod cookies;
#[cfg(feature = "browser")]
mod session;
pub mod stealth;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::info;

use crate::config::BrowserConfig;
use crate::driver::{PageDriver, SessionLauncher, SessionMode};
use crate::error::DriverError;

/// Launches Chromium sessions with the citation extension installed.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, mode: SessionMode) -> Result<Box<dyn PageDriver>, DriverError> {
        use std::time::Duration;

        use chromiumoxide::{Browser, BrowserConfig as CdpConfig};
        use futures::StreamExt;

        if self.config.extension_dir.is_none() {
            tracing::warn!("No extension directory configured; extension extraction will fail");
        }

        let chrome_path = chrome::find_chrome(&self.config)?;
        let profile = tempfile::Builder::new()
            .prefix("bibquery-profile-")
            .tempdir()
            .map_err(|e| DriverError::Launch(format!("Failed to create profile dir: {}", e)))?;

        info!("Launching browser ({})", mode);

        // Headless mode is set through `chrome::launch_args`.
        let config = CdpConfig::builder()
            .chrome_executable(chrome_path)
            .with_head()
            .disable_default_args()
            .user_data_dir(profile.path())
            .args(chrome::launch_args(&self.config, mode))
            .build()
            .map_err(|e| DriverError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // Stealth scripts only run in headless sessions.
        let stealth = self.config.stealth && mode == SessionMode::Headless;
        let session = session::ChromiumSession::open(
            browser,
            handler,
            profile,
            Duration::from_secs(self.config.timeout),
            stealth,
        )
        .await?;

        Ok(Box::new(session))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, _mode: SessionMode) -> Result<Box<dyn PageDriver>, DriverError> {
        Err(DriverError::Launch(
            "Browser support not compiled in. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
