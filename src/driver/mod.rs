//! Page automation capability consumed by the query core.
//!
//! The core never talks to a browser directly. It drives a [`PageDriver`]
//! (one live page with a current frame context and a cookie jar) obtained from
//! a [`SessionLauncher`]. The Chromium implementation lives in
//! [`crate::browser`]; tests use an in-memory fake.

pub mod script;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::DriverError;

/// How an element is located in the current document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    XPath(String),
    Name(String),
    Css(String),
}

impl Locator {
    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::XPath(v) | Locator::Name(v) | Locator::Css(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
        }
    }
}

/// Whether a session runs without a window or is visible for a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Headless,
    Interactive,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Headless => write!(f, "headless"),
            SessionMode::Interactive => write!(f, "interactive"),
        }
    }
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// A browser cookie as stored in the cookie cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Expiry as seconds since the Unix epoch; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expiry: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Whether a browser would send this cookie to `host`.
    pub fn applies_to_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return false;
        }
        let host = host.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// One live automated page.
///
/// Scripts passed to [`execute_script`](PageDriver::execute_script) are
/// function bodies: they `return` their result and read their parameters from
/// `arguments`. Navigation resets the frame context to the top document.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page and wait for the document to load.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Run a script in the page and return its JSON-serializable result.
    async fn execute_script(
        &self,
        script: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, DriverError>;

    /// Make element lookups target the document of the named frame.
    async fn switch_to_frame(&self, frame: &str) -> Result<(), DriverError>;

    /// Make element lookups target the top document again.
    async fn switch_to_default(&self) -> Result<(), DriverError>;

    async fn is_present(&self, locator: &Locator) -> Result<bool, DriverError>;

    /// Read a property (falling back to the attribute) of an element.
    async fn attribute(&self, locator: &Locator, name: &str)
        -> Result<Option<String>, DriverError>;

    /// Rendered text of an element.
    async fn text(&self, locator: &Locator) -> Result<String, DriverError>;

    async fn click(&self, locator: &Locator) -> Result<(), DriverError>;

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    /// Cookies visible to the current page.
    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError>;

    async fn add_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError>;

    async fn delete_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError>;

    /// Wait until an element is present, checking every `poll`. Returns
    /// `false` on timeout.
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
        poll: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present(locator).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Release the page and its browser. Further calls fail with `Closed`.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens automation sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, mode: SessionMode) -> Result<Box<dyn PageDriver>, DriverError>;
}
