//! Error types for strategy resolution, extraction and the query lifecycle.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`PageDriver`](crate::driver::PageDriver).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Script execution failed: {0}")]
    Script(String),
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Frame not found: {0}")]
    FrameNotFound(String),
    #[error("Cookie operation failed: {0}")]
    Cookie(String),
    #[error("Browser session is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Errors raised while resolving, extracting or orchestrating a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("BibQuery has not been initialized or was already closed")]
    SessionUnavailable,

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No matching strategy: {0}")]
    NoMatchingStrategy(String),

    #[error("Failed to load strategy '{name}': {reason}")]
    StrategyLoad { name: String, reason: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("Unexpected result \"{0}\"")]
    UnexpectedResult(String),

    #[error("Challenge encountered during Scholar search")]
    ChallengeEncountered,

    #[error("Failed to load BibTeX for URL \"{url}\"")]
    QueryFailed {
        url: String,
        primary: Box<QueryError>,
        fallback: Box<QueryError>,
    },

    #[error("Cookie cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DriverError> for QueryError {
    fn from(err: DriverError) -> Self {
        QueryError::ExtractionFailed(err.to_string())
    }
}

impl QueryError {
    /// Whether this error only signals that a challenge must be solved.
    pub fn is_challenge(&self) -> bool {
        matches!(self, QueryError::ChallengeEncountered)
    }

    /// Full diagnostic text, including the failures of each tier.
    pub fn detail(&self) -> String {
        match self {
            QueryError::QueryFailed {
                url,
                primary,
                fallback,
            } => format!(
                "Failed to load BibTeX for URL \"{}\"\n  primary: {}\n  fallback: {}",
                url,
                primary.detail(),
                fallback.detail()
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_becomes_extraction_failure() {
        let err: QueryError = DriverError::ElementNotFound("//pre".into()).into();
        assert!(matches!(err, QueryError::ExtractionFailed(ref m) if m.contains("//pre")));
    }

    #[test]
    fn query_failed_detail_names_both_tiers() {
        let err = QueryError::QueryFailed {
            url: "https://example.org/paper".into(),
            primary: Box::new(QueryError::NoMatchingStrategy("example.org".into())),
            fallback: Box::new(QueryError::Timeout {
                what: "citation link".into(),
                after: Duration::from_secs(60),
            }),
        };

        assert_eq!(
            err.to_string(),
            "Failed to load BibTeX for URL \"https://example.org/paper\""
        );
        let detail = err.detail();
        assert!(detail.contains("No matching strategy: example.org"));
        assert!(detail.contains("Timed out after 60s waiting for citation link"));
    }
}
