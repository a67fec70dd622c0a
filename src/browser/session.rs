//! [`PageDriver`] over one Chromium page.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::DescribeNodeParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CreateIsolatedWorldParams, NavigateParams};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::{Browser, Page};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::driver::{script, Locator, PageDriver, SessionCookie};
use crate::error::DriverError;

use super::cookies;
use super::stealth::STEALTH_SCRIPTS;

/// Default user agent for browser requests.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Element lookups target this frame until the next navigation.
#[derive(Debug, Clone)]
struct FrameContext {
    name: String,
    /// Isolated world inside the frame, when the frame could be entered via CDP.
    world: Option<ExecutionContextId>,
}

pub(crate) struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: JoinHandle<()>,
    frame: Mutex<Option<FrameContext>>,
    nav_timeout: Duration,
    stealth: bool,
    // Dropped last so Chrome is gone before its profile is removed.
    _profile: tempfile::TempDir,
}

impl ChromiumSession {
    pub(crate) async fn open(
        browser: Browser,
        handler: JoinHandle<()>,
        profile: tempfile::TempDir,
        nav_timeout: Duration,
        stealth: bool,
    ) -> Result<Self, DriverError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to open page: {}", e)))?;

        page.execute(SetUserAgentOverrideParams::new(BROWSER_USER_AGENT.to_string()))
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to set user agent: {}", e)))?;

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler,
            frame: Mutex::new(None),
            nav_timeout,
            stealth,
            _profile: profile,
        })
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    fn current_frame(&self) -> Option<FrameContext> {
        self.frame.lock().ok().and_then(|f| f.clone())
    }

    fn set_frame(&self, frame: Option<FrameContext>) {
        if let Ok(mut current) = self.frame.lock() {
            *current = frame;
        }
    }

    /// Evaluate an expression and return its value, `Null` for `undefined`.
    async fn eval(
        &self,
        expression: String,
        context: Option<ExecutionContextId>,
    ) -> Result<Value, DriverError> {
        let page = self.page()?;
        let mut builder = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true);
        if let Some(id) = context {
            builder = builder.context_id(id);
        }
        let params = builder.build().map_err(DriverError::Script)?;

        let result = page
            .evaluate_expression(params)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Run an element script in the current frame context.
    async fn element_op(
        &self,
        locator: &Locator,
        build: impl Fn(Option<&str>) -> String,
    ) -> Result<Value, DriverError> {
        match self.current_frame() {
            None => self.eval(build(None), None).await,
            Some(FrameContext {
                world: Some(id), ..
            }) => self.eval(build(None), Some(id)).await,
            Some(FrameContext { name, world: None }) => {
                let result = self.eval(build(Some(&name)), None).await?;
                debug!("Frame {} lookup for {}: {}", name, locator, result);
                Ok(result)
            }
        }
    }

    async fn require_element(
        &self,
        locator: &Locator,
        build: impl Fn(Option<&str>) -> String,
    ) -> Result<Value, DriverError> {
        let result = self.element_op(locator, build).await?;
        if script::found(&result) {
            Ok(result)
        } else {
            Err(DriverError::ElementNotFound(locator.to_string()))
        }
    }

    /// Create an isolated world inside the frame element named `frame`.
    async fn enter_frame(&self, frame: &str) -> Result<ExecutionContextId, DriverError> {
        let page = self.page()?;
        let lookup = EvaluateParams::builder()
            .expression(format!(
                "document.getElementById({f}) || document.getElementsByName({f})[0]",
                f = Value::String(frame.to_string())
            ))
            .return_by_value(false)
            .build()
            .map_err(DriverError::Script)?;
        let element = page
            .evaluate_expression(lookup)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        let object_id = element
            .object()
            .object_id
            .clone()
            .ok_or_else(|| DriverError::FrameNotFound(frame.to_string()))?;

        let node = page
            .execute(DescribeNodeParams::builder().object_id(object_id).build())
            .await
            .map_err(|e| DriverError::FrameNotFound(format!("{}: {}", frame, e)))?;
        let frame_id = node
            .result
            .node
            .frame_id
            .clone()
            .ok_or_else(|| DriverError::FrameNotFound(format!("{} has no content frame", frame)))?;

        let world = CreateIsolatedWorldParams::builder()
            .frame_id(frame_id)
            .world_name("bibquery")
            .build()
            .map_err(DriverError::Script)?;
        let created = page
            .execute(world)
            .await
            .map_err(|e| DriverError::FrameNotFound(format!("{}: {}", frame, e)))?;
        Ok(created.result.execution_context_id)
    }

    async fn apply_stealth(&self, page: &Page) {
        debug!("Applying stealth scripts");
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        self.set_frame(None);

        debug!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e,
            })?;

        match tokio::time::timeout(self.nav_timeout, page.execute(nav_params)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}s", self.nav_timeout.as_secs()),
                })
            }
        }

        match tokio::time::timeout(
            self.nav_timeout,
            page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }

        if self.stealth {
            self.apply_stealth(page).await;
        }
        Ok(())
    }

    async fn execute_script(&self, body: &str, args: &[Value]) -> Result<Value, DriverError> {
        self.eval(script::call_script(body, args), None).await
    }

    async fn switch_to_frame(&self, frame: &str) -> Result<(), DriverError> {
        let exists = self.eval(script::frame_exists(frame), None).await?;
        if exists.as_bool() != Some(true) {
            return Err(DriverError::FrameNotFound(frame.to_string()));
        }

        let world = match self.enter_frame(frame).await {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Using contentDocument for frame {}: {}", frame, e);
                None
            }
        };
        self.set_frame(Some(FrameContext {
            name: frame.to_string(),
            world,
        }));
        Ok(())
    }

    async fn switch_to_default(&self) -> Result<(), DriverError> {
        self.page()?;
        self.set_frame(None);
        Ok(())
    }

    async fn is_present(&self, locator: &Locator) -> Result<bool, DriverError> {
        let result = self
            .element_op(locator, |frame| script::presence(frame, locator))
            .await?;
        Ok(script::found(&result))
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let result = self
            .require_element(locator, |frame| script::attribute(frame, locator, name))
            .await?;
        Ok(script::value(&result))
    }

    async fn text(&self, locator: &Locator) -> Result<String, DriverError> {
        let result = self
            .require_element(locator, |frame| script::text(frame, locator))
            .await?;
        Ok(script::value(&result).unwrap_or_default())
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.require_element(locator, |frame| script::click(frame, locator))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.require_element(locator, |frame| script::send_keys(frame, locator, text))
            .await
            .map(|_| ())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        let cookies = self
            .page()?
            .get_cookies()
            .await
            .map_err(|e| DriverError::Cookie(e.to_string()))?;
        debug!("Got {} cookies from browser", cookies.len());
        Ok(cookies.iter().map(cookies::from_cdp).collect())
    }

    async fn add_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError> {
        let param = cookies::to_param(cookie)?;
        self.page()?
            .set_cookie(param)
            .await
            .map_err(|e| DriverError::Cookie(format!("Failed to set cookie {}: {}", cookie.name, e)))?;
        Ok(())
    }

    async fn delete_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError> {
        self.page()?
            .execute(cookies::delete_param(cookie))
            .await
            .map_err(|e| {
                DriverError::Cookie(format!("Failed to delete cookie {}: {}", cookie.name, e))
            })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let page = self.page.take();
        let browser = self.browser.take();
        if page.is_none() && browser.is_none() {
            return Err(DriverError::Closed);
        }

        if let Some(page) = page {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }
        self.handler.abort();
        Ok(())
    }
}
