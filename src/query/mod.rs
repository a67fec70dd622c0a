//! Query orchestration.
//!
//! A [`BibQuery`] owns one primary automation session for its lifetime and
//! runs each URL through a fixed sequence of tiers:
//!
//! ```text
//! Resolving -> PrimaryAttempt -> FallbackAttempt -> ChallengeRecovery -> Done
//!     |              |                 |                   |
//!     +--------------+-> (failure) ----+--> Failed <-------+
//! ```
//!
//! - `Resolving` picks and loads a strategy. Any failure moves to `FallbackAttempt`.
//! - `PrimaryAttempt` runs the extension. Any failure moves to `FallbackAttempt`.
//! - `FallbackAttempt` searches Scholar. A challenge moves to `ChallengeRecovery`
//!   when recovery is enabled; any other failure is terminal.
//! - `ChallengeRecovery` repeats the search in a visible session.
//!
//! Terminal failures carry both the primary and the fallback error.

mod primary;
mod recovery;
mod scholar;
pub mod selectors;
mod wait;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::browser::ChromiumLauncher;
use crate::cache::CookieCache;
use crate::config::{Config, QueryConfig};
use crate::driver::{PageDriver, SessionLauncher, SessionMode};
use crate::error::{QueryError, Result};
use crate::strategy::{ExtractionStrategy, StrategyLoader, StrategyResolver, ADJUSTER_LIST_FILE};

use scholar::ChallengePolicy;

/// Step of a single query.
#[derive(Debug)]
enum QueryState {
    Resolving,
    PrimaryAttempt(ExtractionStrategy),
    FallbackAttempt { primary: QueryError },
    ChallengeRecovery { primary: QueryError },
    Done(String),
    Failed(QueryError),
}

impl QueryState {
    fn label(&self) -> &'static str {
        match self {
            QueryState::Resolving => "resolving",
            QueryState::PrimaryAttempt(_) => "primary",
            QueryState::FallbackAttempt { .. } => "fallback",
            QueryState::ChallengeRecovery { .. } => "recovery",
            QueryState::Done(_) => "done",
            QueryState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Open,
    Closed,
}

/// BibTeX lookup over one primary automation session.
///
/// Call [`initialize`](Self::initialize) before querying and
/// [`close`](Self::close) when done. A closed instance cannot be reopened.
pub struct BibQuery {
    settings: QueryConfig,
    launcher: Arc<dyn SessionLauncher>,
    resolver: StrategyResolver,
    loader: StrategyLoader,
    cache: CookieCache,
    primary_mode: SessionMode,
    session: Option<Box<dyn PageDriver>>,
    lifecycle: Lifecycle,
}

impl BibQuery {
    /// Load the rule list and cookie cache location from `config`.
    pub fn new(config: &Config, launcher: Arc<dyn SessionLauncher>) -> Result<Self> {
        let resources = config.resources_dir();
        let resolver = StrategyResolver::load(
            &resources.join(ADJUSTER_LIST_FILE),
            config.query.path_candidates,
        )?;
        let loader = StrategyLoader::new(&resources);
        let cache = CookieCache::new(config.cookie_cache_path(), config.query.scholar_host()?);

        let mode = if config.browser.headless {
            SessionMode::Headless
        } else {
            SessionMode::Interactive
        };

        Ok(
            Self::from_parts(config.query.clone(), launcher, resolver, loader, cache)
                .with_primary_mode(mode),
        )
    }

    pub fn from_parts(
        settings: QueryConfig,
        launcher: Arc<dyn SessionLauncher>,
        resolver: StrategyResolver,
        loader: StrategyLoader,
        cache: CookieCache,
    ) -> Self {
        Self {
            settings,
            launcher,
            resolver,
            loader,
            cache,
            primary_mode: SessionMode::Headless,
            session: None,
            lifecycle: Lifecycle::Created,
        }
    }

    /// Session mode of the primary browser.
    pub fn with_primary_mode(mut self, mode: SessionMode) -> Self {
        self.primary_mode = mode;
        self
    }

    pub fn settings(&self) -> &QueryConfig {
        &self.settings
    }

    pub fn resolver(&self) -> &StrategyResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &CookieCache {
        &self.cache
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle == Lifecycle::Open
    }

    /// Launch the primary session and seed it with cached Scholar cookies.
    ///
    /// Calling this on an open instance does nothing.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Open => return Ok(()),
            Lifecycle::Closed => return Err(QueryError::SessionUnavailable),
            Lifecycle::Created => {}
        }

        info!("Starting {} browser session", self.primary_mode);
        let session = self.launcher.launch(self.primary_mode).await?;

        match self.cache.load() {
            Ok(cookies) if !cookies.is_empty() => {
                if let Err(e) =
                    recovery::reseed(session.as_ref(), &self.cache, &self.settings, &cookies).await
                {
                    warn!("Failed to apply cached Scholar cookies: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Ignoring cookie cache: {}", e),
        }

        self.session = Some(session);
        self.lifecycle = Lifecycle::Open;
        Ok(())
    }

    /// Release the primary session.
    pub async fn close(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Open {
            return Err(QueryError::SessionUnavailable);
        }
        self.lifecycle = Lifecycle::Closed;
        match self.session.take() {
            Some(mut session) => {
                session.close().await?;
                debug!("Browser session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Obtain the BibTeX entry for `url`.
    pub async fn query(&mut self, url: &str) -> Result<String> {
        let driver = match (self.lifecycle, self.session.as_deref()) {
            (Lifecycle::Open, Some(driver)) => driver,
            _ => return Err(QueryError::SessionUnavailable),
        };

        let mut state = QueryState::Resolving;
        loop {
            debug!(url = %url, state = state.label(), "Query step");
            state = match state {
                QueryState::Resolving => match self.strategy_for(url) {
                    Ok(strategy) => QueryState::PrimaryAttempt(strategy),
                    Err(e) => {
                        info!("No extension strategy for {}: {}", url, e);
                        QueryState::FallbackAttempt { primary: e }
                    }
                },
                QueryState::PrimaryAttempt(strategy) => {
                    match primary::extract(driver, &strategy, url, &self.settings).await {
                        Ok(bibtex) => QueryState::Done(bibtex),
                        Err(e) => {
                            info!("Extension extraction failed for {}: {}", url, e);
                            QueryState::FallbackAttempt { primary: e }
                        }
                    }
                }
                QueryState::FallbackAttempt { primary } => {
                    if !self.settings.scholar {
                        let fallback =
                            QueryError::ExtractionFailed("Scholar fallback disabled".to_string());
                        QueryState::Failed(query_failed(url, primary, fallback))
                    } else {
                        match scholar::search(
                            driver,
                            &self.settings,
                            url,
                            ChallengePolicy::Detect,
                            self.settings.timeout(),
                        )
                        .await
                        {
                            Ok(bibtex) => QueryState::Done(bibtex),
                            Err(e) if e.is_challenge() && self.settings.recovery => {
                                QueryState::ChallengeRecovery { primary }
                            }
                            Err(e) => QueryState::Failed(query_failed(url, primary, e)),
                        }
                    }
                }
                QueryState::ChallengeRecovery { primary } => {
                    match recovery::recover_and_retry(
                        self.launcher.as_ref(),
                        driver,
                        &self.cache,
                        &self.settings,
                        url,
                    )
                    .await
                    {
                        Ok(bibtex) => QueryState::Done(bibtex),
                        Err(e) => QueryState::Failed(query_failed(url, primary, e)),
                    }
                }
                QueryState::Done(bibtex) => return Ok(bibtex),
                QueryState::Failed(e) => return Err(e),
            };
        }
    }

    /// Query each URL in turn, keeping only the successes.
    ///
    /// Failures are logged and skipped.
    pub async fn query_batch<I, S>(&mut self, urls: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.query_batch_with(urls, |_, _| {}).await
    }

    /// Like [`query_batch`](Self::query_batch), reporting each outcome to
    /// `on_result` as it completes.
    pub async fn query_batch_with<I, S, F>(
        &mut self,
        urls: I,
        mut on_result: F,
    ) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str, &Result<String>),
    {
        if !self.is_open() {
            return Err(QueryError::SessionUnavailable);
        }

        let mut results = HashMap::new();
        for url in urls {
            let url = url.as_ref();
            let outcome = self.query(url).await;
            on_result(url, &outcome);
            match outcome {
                Ok(bibtex) => {
                    results.insert(url.to_string(), bibtex);
                }
                Err(e) => error!(
                    url = %url,
                    "Encountered error when trying to obtain BibTeX entry of {}: {}",
                    url,
                    e.detail()
                ),
            }
        }
        Ok(results)
    }

    fn strategy_for(&self, url: &str) -> Result<ExtractionStrategy> {
        let name = self.resolver.resolve(url)?;
        debug!("Resolved {} to strategy {}", url, name);
        self.loader.load(&name)
    }
}

fn query_failed(url: &str, primary: QueryError, fallback: QueryError) -> QueryError {
    QueryError::QueryFailed {
        url: url.to_string(),
        primary: Box::new(primary),
        fallback: Box::new(fallback),
    }
}

async fn open_browser(config: &Config) -> Result<BibQuery> {
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let mut bibquery = BibQuery::new(config, launcher)?;
    bibquery.initialize().await?;
    Ok(bibquery)
}

async fn shutdown(mut bibquery: BibQuery) {
    if let Err(e) = bibquery.close().await {
        warn!("Failed to close browser session: {}", e);
    }
}

/// One-shot lookup of a single URL in a temporary browser session.
pub async fn query(config: &Config, url: &str) -> Result<String> {
    let mut bibquery = open_browser(config).await?;
    let result = bibquery.query(url).await;
    shutdown(bibquery).await;
    result
}

/// One-shot batch lookup in a temporary browser session.
pub async fn query_batch<S: AsRef<str>>(
    config: &Config,
    urls: &[S],
) -> Result<HashMap<String, String>> {
    let mut bibquery = open_browser(config).await?;
    let result = bibquery.query_batch(urls).await;
    shutdown(bibquery).await;
    result
}
