//! Google Scholar search and citation popup scraping.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::driver::PageDriver;
use crate::error::{QueryError, Result};

use super::selectors;
use super::wait::{self, Deadline};

/// What to do when Scholar answers with a reCAPTCHA instead of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChallengePolicy {
    /// Stop and report `ChallengeEncountered`.
    Detect,
    /// Keep waiting for results; a human is expected to solve it.
    Wait,
}

enum SearchOutcome {
    Citation,
    Challenge,
}

/// Search Scholar for `url` and return the BibTeX of the first result.
pub(crate) async fn search(
    driver: &dyn PageDriver,
    settings: &QueryConfig,
    url: &str,
    policy: ChallengePolicy,
    timeout: Duration,
) -> Result<String> {
    info!("Searching Google Scholar for {}", url);
    driver.navigate(&settings.scholar_search_url()).await?;
    driver.send_keys(&selectors::search_input(), url).await?;
    driver.click(&selectors::search_button()).await?;

    let deadline = Deadline::after(timeout, settings.poll_interval());
    match wait_for_results(driver, policy, &deadline).await? {
        SearchOutcome::Challenge => return Err(QueryError::ChallengeEncountered),
        SearchOutcome::Citation => {}
    }

    let cite = selectors::citation_link();
    driver.click(&cite).await?;

    let link = selectors::bibtex_link();
    wait::require(driver, &link, &deadline, "BibTeX link").await?;
    let href = driver
        .attribute(&link, "href")
        .await?
        .filter(|h| !h.is_empty())
        .ok_or_else(|| QueryError::ExtractionFailed("BibTeX link has no target".to_string()))?;

    driver.navigate(&href).await?;
    let body = selectors::bibtex_body();
    wait::require(driver, &body, &deadline, "BibTeX text").await?;
    let text = driver.text(&body).await?;

    Ok(text.trim().to_string())
}

/// First of citation link or challenge to appear wins.
///
/// Lookup errors while the results page is still loading count as "not yet".
async fn wait_for_results(
    driver: &dyn PageDriver,
    policy: ChallengePolicy,
    deadline: &Deadline,
) -> Result<SearchOutcome> {
    let cite = selectors::citation_link();
    let challenge = selectors::challenge_frame();
    loop {
        match driver.is_present(&cite).await {
            Ok(true) => return Ok(SearchOutcome::Citation),
            Ok(false) => {}
            Err(e) => debug!("Citation lookup failed, retrying: {}", e),
        }
        if policy == ChallengePolicy::Detect {
            match driver.is_present(&challenge).await {
                Ok(true) => {
                    info!("Google Scholar presented a challenge");
                    return Ok(SearchOutcome::Challenge);
                }
                Ok(false) => {}
                Err(e) => debug!("Challenge lookup failed, retrying: {}", e),
            }
        }
        if deadline.expired() {
            return Err(deadline.timeout("Scholar citation link"));
        }
        tokio::time::sleep(deadline.poll()).await;
    }
}
