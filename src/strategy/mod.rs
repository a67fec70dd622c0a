//! Extraction strategies: which routine applies to a URL, and loading it.

mod loader;
mod resolver;

pub use loader::{ExtractionStrategy, StrategyLoader, PREFSELECTOR_DIR, PREFSELECTOR_GLOBAL};
pub use resolver::{AdjusterRule, Candidate, MatchSpec, PathCandidatePolicy, StrategyResolver};

/// Rule list file name inside the resources directory.
pub const ADJUSTER_LIST_FILE: &str = "urlSpecificAdjusterList.json";
