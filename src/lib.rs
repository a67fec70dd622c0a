//! bibquery - BibTeX entries for paper URLs.
//!
//! Drives a Chromium session with a citation extension installed to extract
//! a BibTeX entry from the publisher page, and falls back to a Google Scholar
//! search when the extension cannot handle the page. Scholar challenges are
//! solved by a human in a visible browser, whose cookies are then cached and
//! reused.
//!
//! ```no_run
//! # async fn demo() -> bibquery::Result<()> {
//! let config = bibquery::Config::load().await;
//! let bibtex = bibquery::query(&config, "https://arxiv.org/abs/1706.03762").await?;
//! println!("{}", bibtex);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod cache;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod query;
pub mod strategy;

pub use browser::ChromiumLauncher;
pub use cache::CookieCache;
pub use config::{BrowserConfig, Config, QueryConfig};
pub use driver::{Locator, PageDriver, SessionCookie, SessionLauncher, SessionMode};
pub use error::{DriverError, QueryError, Result};
pub use query::{query, query_batch, BibQuery};
pub use strategy::{
    ExtractionStrategy, PathCandidatePolicy, StrategyLoader, StrategyResolver,
};
