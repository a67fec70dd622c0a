//! In-memory page driver for exercising `BibQuery` without a browser.
//!
//! The fake models three kinds of pages: publisher pages (with the extension
//! popup), the Scholar search page and the Scholar BibTeX export. Every
//! driver call is appended to a per-session log.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use bibquery::query::selectors;
use bibquery::{
    BibQuery, CookieCache, DriverError, Locator, PageDriver, QueryConfig, SessionCookie,
    SessionLauncher, SessionMode, StrategyLoader, StrategyResolver,
};

pub const SCHOLAR_HOST: &str = "scholar.google.com";
pub const BIBTEX_EXPORT: &str = "https://scholar.googleusercontent.com/scholar.bib?q=";
/// Cookie a solved challenge leaves behind.
pub const UNLOCK_COOKIE: &str = "GSP";

pub const RULES: &str = r#"[
    {"scheme": "(www\\.)?example", "top": "org", "prefselector": "example"},
    {"scheme": "arxiv", "top": [{"scheme": "org"}], "prefselector": "arxiv"},
    {"scheme": "broken", "top": "org", "prefselector": "missing"}
]"#;

/// What the extension shows for a publisher page.
#[derive(Debug, Clone, Default)]
pub struct PublisherPage {
    /// Successive values of the result text area; the last one repeats.
    pub values: Vec<String>,
    /// Returned by the routine's fallback URL provider.
    pub fallback_url: Option<String>,
    /// Presence checks the popup frame needs before it shows up.
    pub popup_after: usize,
}

/// How Scholar answers a search.
#[derive(Debug, Clone)]
pub enum ScholarAnswer {
    Citation(String),
    /// Challenge for headless sessions without the unlock cookie; the entry
    /// is shown once a human solved it.
    Challenge(String),
    /// Challenge nobody gets past.
    Unsolvable,
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
enum Location {
    Blank,
    Publisher(String),
    ScholarHome,
    ScholarSearch,
    Export(String),
}

#[derive(Debug)]
pub struct SessionState {
    pub mode: SessionMode,
    pub calls: Vec<String>,
    pub cookies: Vec<SessionCookie>,
    pub closed: bool,
    location: Location,
    frame: Option<String>,
    injected: bool,
    value_index: usize,
    popup_checks: usize,
    typed: String,
    submitted: bool,
    cite_open: bool,
}

impl SessionState {
    fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            calls: Vec::new(),
            cookies: Vec::new(),
            closed: false,
            location: Location::Blank,
            frame: None,
            injected: false,
            value_index: 0,
            popup_checks: 0,
            typed: String::new(),
            submitted: false,
            cite_open: false,
        }
    }

    /// Calls that touched Google Scholar.
    pub fn scholar_calls(&self) -> Vec<&String> {
        self.calls
            .iter()
            .filter(|c| c.contains("scholar") || c.contains("name=q") || c.contains("btnG"))
            .collect()
    }

    fn unlocked(&self) -> bool {
        self.cookies
            .iter()
            .any(|c| c.name == UNLOCK_COOKIE && c.applies_to_host(SCHOLAR_HOST))
    }
}

#[derive(Debug, Default)]
pub struct World {
    pub publishers: HashMap<String, PublisherPage>,
    pub scholar: HashMap<String, ScholarAnswer>,
    pub sessions: Vec<SessionState>,
    pub fail_launch: bool,
    /// `add_cookie` fails for cookies carrying this value.
    pub reject_cookie_value: Option<String>,
}

impl World {
    fn answer(&self, query: &str) -> ScholarAnswer {
        self.scholar
            .get(query)
            .cloned()
            .unwrap_or(ScholarAnswer::Nothing)
    }

    pub fn launches(&self, mode: SessionMode) -> usize {
        self.sessions.iter().filter(|s| s.mode == mode).count()
    }
}

/// Shared handle to the fake browser world.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    world: Arc<Mutex<World>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    pub fn publisher(&self, url: &str, page: PublisherPage) {
        self.world().publishers.insert(url.to_string(), page);
    }

    pub fn scholar(&self, query: &str, answer: ScholarAnswer) {
        self.world().scholar.insert(query.to_string(), answer);
    }
}

#[async_trait]
impl SessionLauncher for FakeBrowser {
    async fn launch(&self, mode: SessionMode) -> Result<Box<dyn PageDriver>, DriverError> {
        let mut world = self.world();
        if world.fail_launch {
            return Err(DriverError::Launch("no browser".to_string()));
        }
        world.sessions.push(SessionState::new(mode));
        Ok(Box::new(FakeDriver {
            world: self.world.clone(),
            id: world.sessions.len() - 1,
        }))
    }
}

pub struct FakeDriver {
    world: Arc<Mutex<World>>,
    id: usize,
}

impl FakeDriver {
    /// Run `f` on this session's state after logging `call`.
    fn with<T>(
        &self,
        call: String,
        f: impl FnOnce(&World, &mut SessionState) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let mut world = self.world.lock().unwrap();
        let mut session = std::mem::replace(
            &mut world.sessions[self.id],
            SessionState::new(SessionMode::Headless),
        );
        let result = if session.closed {
            Err(DriverError::Closed)
        } else {
            session.calls.push(call);
            f(&*world, &mut session)
        };
        world.sessions[self.id] = session;
        result
    }
}

fn present(world: &World, s: &SessionState, locator: &Locator) -> bool {
    if *locator == selectors::popup_frame() {
        return match s.location {
            Location::Publisher(ref url) => world
                .publishers
                .get(url)
                .is_some_and(|p| s.popup_checks >= p.popup_after),
            _ => false,
        };
    }
    if *locator == selectors::result_textarea() {
        return s.frame.as_deref() == Some(selectors::POPUP_FRAME);
    }
    if *locator == selectors::search_input() || *locator == selectors::search_button() {
        return s.location == Location::ScholarSearch;
    }
    if s.location == Location::ScholarSearch && s.submitted {
        let answer = world.answer(&s.typed);
        let challenged = match answer {
            ScholarAnswer::Challenge(_) => s.mode == SessionMode::Headless && !s.unlocked(),
            ScholarAnswer::Unsolvable => true,
            _ => false,
        };
        if *locator == selectors::challenge_frame() {
            return challenged;
        }
        if *locator == selectors::citation_link() {
            return !challenged
                && matches!(answer, ScholarAnswer::Citation(_) | ScholarAnswer::Challenge(_));
        }
        if *locator == selectors::bibtex_link() {
            return s.cite_open;
        }
    }
    if *locator == selectors::bibtex_body() {
        return matches!(s.location, Location::Export(_));
    }
    false
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.with(format!("navigate {}", url), |world, s| {
            s.frame = None;
            s.injected = false;
            s.value_index = 0;
            s.popup_checks = 0;
            s.submitted = false;
            s.cite_open = false;
            s.location = if let Some(q) = url.strip_prefix(BIBTEX_EXPORT) {
                Location::Export(q.to_string())
            } else if url.starts_with("https://scholar.google.com/?") {
                s.typed.clear();
                Location::ScholarSearch
            } else if url == "https://scholar.google.com/" {
                Location::ScholarHome
            } else if world.publishers.contains_key(url) {
                Location::Publisher(url.to_string())
            } else {
                Location::Blank
            };
            Ok(())
        })
    }

    async fn execute_script(&self, script: &str, args: &[Value]) -> Result<Value, DriverError> {
        self.with("script".to_string(), |world, s| {
            let page = match s.location {
                Location::Publisher(ref url) => world.publishers.get(url).cloned(),
                _ => None,
            };
            if script.contains("window.BINPrefselector = BINPrefselector") {
                s.injected = true;
                return Ok(Value::Null);
            }
            if script.contains("'getFallbackURL' in") {
                let has = s.injected && page.map(|p| p.fallback_url.is_some()).unwrap_or(false);
                return Ok(Value::Bool(has));
            }
            if script.contains("getFallbackURL'](arguments[0])") {
                assert!(!args.is_empty(), "fallback URL provider needs the original URL");
                return Ok(page
                    .and_then(|p| p.fallback_url)
                    .map(Value::String)
                    .unwrap_or(Value::Null));
            }
            Err(DriverError::Script(format!("unexpected script: {}", script)))
        })
    }

    async fn switch_to_frame(&self, frame: &str) -> Result<(), DriverError> {
        self.with(format!("frame {}", frame), |world, s| {
            if frame == selectors::POPUP_FRAME && present(world, s, &selectors::popup_frame()) {
                s.frame = Some(frame.to_string());
                Ok(())
            } else {
                Err(DriverError::FrameNotFound(frame.to_string()))
            }
        })
    }

    async fn switch_to_default(&self) -> Result<(), DriverError> {
        self.with("default frame".to_string(), |_, s| {
            s.frame = None;
            Ok(())
        })
    }

    async fn is_present(&self, locator: &Locator) -> Result<bool, DriverError> {
        self.with(format!("present {}", locator), |world, s| {
            if *locator == selectors::popup_frame() {
                s.popup_checks += 1;
            }
            Ok(present(world, s, locator))
        })
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.with(format!("attribute {} {}", locator, name), |world, s| {
            if !present(world, s, locator) {
                return Err(DriverError::ElementNotFound(locator.to_string()));
            }
            if *locator == selectors::result_textarea() && name == "value" {
                let page = match s.location {
                    Location::Publisher(ref url) => world.publishers.get(url),
                    _ => None,
                };
                let values = page.map(|p| p.values.clone()).unwrap_or_default();
                let value = values
                    .get(s.value_index)
                    .or_else(|| values.last())
                    .cloned();
                s.value_index += 1;
                return Ok(value);
            }
            if *locator == selectors::bibtex_link() && name == "href" {
                return Ok(Some(format!("{}{}", BIBTEX_EXPORT, s.typed)));
            }
            Ok(None)
        })
    }

    async fn text(&self, locator: &Locator) -> Result<String, DriverError> {
        self.with(format!("text {}", locator), |world, s| {
            match (&s.location, *locator == selectors::bibtex_body()) {
                (Location::Export(query), true) => match world.answer(query) {
                    ScholarAnswer::Citation(b) | ScholarAnswer::Challenge(b) => {
                        Ok(format!("\n{}\n", b))
                    }
                    _ => Ok(String::new()),
                },
                _ => Err(DriverError::ElementNotFound(locator.to_string())),
            }
        })
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.with(format!("click {}", locator), |world, s| {
            if !present(world, s, locator) {
                return Err(DriverError::ElementNotFound(locator.to_string()));
            }
            if *locator == selectors::search_button() {
                s.submitted = true;
                // A human solves the challenge in a visible window.
                if s.mode == SessionMode::Interactive
                    && matches!(world.answer(&s.typed), ScholarAnswer::Challenge(_))
                {
                    let mut unlock = SessionCookie::new(UNLOCK_COOKIE, "solved", SCHOLAR_HOST);
                    unlock.expiry = Some(1_900_000_000);
                    s.cookies.push(unlock);
                    s.cookies
                        .push(SessionCookie::new("NID", "recovered", ".google.com"));
                }
            } else if *locator == selectors::citation_link() {
                s.cite_open = true;
            }
            Ok(())
        })
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.with(format!("keys {} {}", locator, text), |world, s| {
            if !present(world, s, locator) {
                return Err(DriverError::ElementNotFound(locator.to_string()));
            }
            s.typed.push_str(text);
            Ok(())
        })
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        self.with("cookies".to_string(), |_, s| Ok(s.cookies.clone()))
    }

    async fn add_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError> {
        self.with(format!("add cookie {}", cookie.name), |world, s| {
            if world.reject_cookie_value.as_deref() == Some(cookie.value.as_str()) {
                return Err(DriverError::Cookie(format!("rejected {}", cookie.name)));
            }
            s.cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
            s.cookies.push(cookie.clone());
            Ok(())
        })
    }

    async fn delete_cookie(&self, cookie: &SessionCookie) -> Result<(), DriverError> {
        self.with(format!("delete cookie {}", cookie.name), |_, s| {
            s.cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
            Ok(())
        })
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.with("close".to_string(), |_, s| {
            s.closed = true;
            Ok(())
        })
    }
}

/// Extension resources and a cookie cache in a temporary directory.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub browser: FakeBrowser,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let res = dir.path().join("res");
        std::fs::create_dir_all(res.join("prefselectors")).unwrap();
        std::fs::write(res.join("urlSpecificAdjusterList.json"), RULES).unwrap();
        for name in ["example", "arxiv"] {
            std::fs::write(
                res.join("prefselectors").join(format!("{}.js", name)),
                format!("var BINPrefselector = {{ name: '{}' }};", name),
            )
            .unwrap();
        }
        Self {
            dir,
            browser: FakeBrowser::new(),
        }
    }

    pub fn resources(&self) -> std::path::PathBuf {
        self.dir.path().join("res")
    }

    pub fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("cache").join("scholar_cookies.json")
    }

    pub fn cache(&self) -> CookieCache {
        CookieCache::new(self.cache_path(), SCHOLAR_HOST)
    }

    pub fn settings() -> QueryConfig {
        QueryConfig {
            timeout: 1,
            poll_interval_ms: 10,
            recovery_timeout: 1,
            ..Default::default()
        }
    }

    pub fn bibquery_with(&self, settings: QueryConfig) -> BibQuery {
        let resolver = StrategyResolver::load(
            &self.resources().join("urlSpecificAdjusterList.json"),
            settings.path_candidates,
        )
        .unwrap();
        let loader = StrategyLoader::new(&self.resources());
        BibQuery::from_parts(
            settings,
            Arc::new(self.browser.clone()),
            resolver,
            loader,
            self.cache(),
        )
    }

    pub fn bibquery(&self) -> BibQuery {
        self.bibquery_with(Self::settings())
    }
}

pub fn write_cache(path: &Path, cookies: &[SessionCookie]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string(cookies).unwrap()).unwrap();
}
