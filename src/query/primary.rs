//! Extraction through the citation extension's popup.

use serde_json::json;
use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::driver::PageDriver;
use crate::error::{QueryError, Result};
use crate::strategy::ExtractionStrategy;

use super::selectors::{self, LOADING_SENTINEL, POPUP_FRAME};
use super::wait::{self, Deadline};

/// Whether the injected routine offers a fallback URL provider.
pub(crate) const HAS_FALLBACK_SCRIPT: &str = "return typeof window.BINPrefselector === 'object' \
     && window.BINPrefselector !== null \
     && 'getFallbackURL' in window.BINPrefselector;";

/// Ask the routine for a fallback URL for `arguments[0]`.
pub(crate) const FALLBACK_URL_SCRIPT: &str =
    "return window.BINPrefselector['getFallbackURL'](arguments[0]);";

/// Run the extension-based extraction for `url` with an already loaded strategy.
pub(crate) async fn extract(
    driver: &dyn PageDriver,
    strategy: &ExtractionStrategy,
    url: &str,
    settings: &QueryConfig,
) -> Result<String> {
    info!("Extracting {} with strategy {}", url, strategy.name());
    driver.navigate(url).await?;
    driver
        .execute_script(&strategy.injection_script(), &[])
        .await?;

    let has_fallback = driver.execute_script(HAS_FALLBACK_SCRIPT, &[]).await?;
    if has_fallback.as_bool() == Some(true) {
        let fallback = driver
            .execute_script(FALLBACK_URL_SCRIPT, &[json!(url)])
            .await?;
        if let Some(fallback_url) = fallback.as_str().filter(|u| !u.is_empty()) {
            info!("Strategy {} redirects to {}", strategy.name(), fallback_url);
            driver.navigate(fallback_url).await?;
        }
    }

    let deadline = Deadline::after(settings.timeout(), settings.poll_interval());
    wait::require(driver, &selectors::popup_frame(), &deadline, "extension popup").await?;
    driver.switch_to_frame(POPUP_FRAME).await?;
    wait::require(driver, &selectors::result_textarea(), &deadline, "result text area").await?;

    let result = poll_result(driver, &deadline).await?;
    if !result.starts_with('@') {
        return Err(QueryError::UnexpectedResult(result));
    }

    Ok(result)
}

/// Poll the result text area until it holds something other than the placeholder.
async fn poll_result(driver: &dyn PageDriver, deadline: &Deadline) -> Result<String> {
    let textarea = selectors::result_textarea();
    loop {
        let value = driver.attribute(&textarea, "value").await?;
        match value {
            Some(v) if !v.is_empty() && v != LOADING_SENTINEL => return Ok(v),
            _ => debug!("Extension result not ready yet"),
        }
        if deadline.expired() {
            return Err(deadline.timeout("BibTeX entry to load"));
        }
        tokio::time::sleep(deadline.poll()).await;
    }
}
