//! Human-assisted Scholar search after a challenge.
//!
//! A visible session is opened so a person can solve the reCAPTCHA. Once the
//! search goes through, Scholar's session cookies are cached on disk and moved
//! into the primary session so later searches skip the challenge.

use tracing::{info, warn};

use crate::cache::CookieCache;
use crate::config::QueryConfig;
use crate::driver::{PageDriver, SessionCookie, SessionLauncher, SessionMode};
use crate::error::Result;

use super::scholar::{self, ChallengePolicy};

/// Run the Scholar search for `url` in a fresh interactive session.
///
/// The recovery session is closed whether or not the search succeeds.
pub(crate) async fn recover_and_retry(
    launcher: &dyn SessionLauncher,
    primary: &dyn PageDriver,
    cache: &CookieCache,
    settings: &QueryConfig,
    url: &str,
) -> Result<String> {
    warn!(
        "Google Scholar challenge for {}; opening a browser window, solve it to continue",
        url
    );
    let mut session = launcher.launch(SessionMode::Interactive).await?;

    let result = recover_inner(session.as_ref(), primary, cache, settings, url).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close recovery session: {}", e);
    }

    result
}

async fn recover_inner(
    session: &dyn PageDriver,
    primary: &dyn PageDriver,
    cache: &CookieCache,
    settings: &QueryConfig,
    url: &str,
) -> Result<String> {
    let bibtex = scholar::search(
        session,
        settings,
        url,
        ChallengePolicy::Wait,
        settings.recovery_timeout(),
    )
    .await?;
    info!("Recovered Scholar session for {}", url);

    session.navigate(&settings.scholar_home()).await?;
    let cookies = cache.scholar_cookies(&session.cookies().await?);

    if let Err(e) = cache.save(&cookies) {
        warn!("Failed to persist Scholar cookies: {}", e);
    }
    if let Err(e) = reseed(primary, cache, settings, &cookies).await {
        warn!("Failed to move Scholar cookies into the primary session: {}", e);
    }

    Ok(bibtex)
}

/// Replace the session's Scholar cookies with the Scholar cookies among `cookies`.
///
/// Either the whole new set is installed or the previous set is put back.
pub(crate) async fn reseed(
    driver: &dyn PageDriver,
    cache: &CookieCache,
    settings: &QueryConfig,
    cookies: &[SessionCookie],
) -> Result<()> {
    driver.navigate(&settings.scholar_home()).await?;
    let previous = cache.scholar_cookies(&driver.cookies().await?);
    let fresh = cache.scholar_cookies(cookies);

    if let Err(e) = install(driver, cache, &fresh).await {
        warn!(
            "Restoring {} previous Scholar cookies after failed install: {}",
            previous.len(),
            e
        );
        if let Err(restore) = install(driver, cache, &previous).await {
            warn!("Failed to restore previous Scholar cookies: {}", restore);
        }
        return Err(e);
    }

    info!("Installed {} Scholar cookies", fresh.len());
    Ok(())
}

/// Drop every Scholar cookie in the jar, then add `cookies`.
async fn install(
    driver: &dyn PageDriver,
    cache: &CookieCache,
    cookies: &[SessionCookie],
) -> Result<()> {
    for stale in cache.scholar_cookies(&driver.cookies().await?) {
        driver.delete_cookie(&stale).await?;
    }
    for cookie in cookies {
        driver.add_cookie(cookie).await?;
    }
    Ok(())
}
