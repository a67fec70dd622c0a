//! Chrome executable discovery and command-line arguments.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::BrowserConfig;
use crate::driver::SessionMode;
use crate::error::DriverError;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find the Chrome executable, preferring the configured one.
pub fn find_chrome(config: &BrowserConfig) -> Result<PathBuf, DriverError> {
    if let Some(ref path) = config.chrome_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(DriverError::Launch(format!(
            "Configured Chrome executable not found: {}",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(DriverError::Launch(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or set CHROME_PATH to an existing executable"
            .to_string(),
    ))
}

/// Chrome arguments for a session.
///
/// Extensions only load in a headed browser or in the new headless mode, so
/// headless sessions use `--headless=new` instead of the legacy flag.
pub fn launch_args(config: &BrowserConfig, mode: SessionMode) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    if mode == SessionMode::Headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
        args.push("--disable-software-rasterizer".to_string());
    }

    if let Some(ref proxy) = config.proxy {
        args.push(format!("--proxy-server={}", proxy));
    }

    if let Some(ref ext) = config.extension_dir {
        args.push(format!("--disable-extensions-except={}", ext.display()));
        args.push(format!("--load-extension={}", ext.display()));
    }

    args.extend(
        [
            "--disable-blink-features=AutomationControlled",
            "--disable-infobars",
            "--disable-dev-shm-usage",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-background-networking",
            "--disable-sync",
            "--disable-translate",
            "--metrics-recording-only",
            "--safebrowsing-disable-auto-update",
            "--no-sandbox",
        ]
        .iter()
        .map(|a| a.to_string()),
    );

    args.extend(config.chrome_args.iter().cloned());
    args
}
