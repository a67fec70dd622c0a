//! URL to extraction-strategy resolution.
//!
//! Rules come from the extension's `urlSpecificAdjusterList.json`. They are
//! evaluated in list order and the first rule whose domain pattern matches is
//! binding: if its top-level or path constraints reject the URL, resolution
//! fails without looking at later rules. This is deliberate and must not be
//! turned into a best-match search.

use std::path::Path;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{QueryError, Result};

/// One entry of the adjuster rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjusterRule {
    /// Pattern matched against the host without its last label.
    #[serde(rename = "scheme")]
    pub domain_pattern: String,

    /// Required top-level label, or ordered candidates with optional overrides.
    #[serde(rename = "top", default, skip_serializing_if = "Option::is_none")]
    pub top_level: Option<MatchSpec>,

    /// Path pattern, or ordered candidates with optional overrides.
    #[serde(rename = "path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<MatchSpec>,

    /// Strategy ("prefselector") applied when the rule resolves.
    #[serde(rename = "prefselector", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// A single required value or an ordered list of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchSpec {
    Single(String),
    Candidates(Vec<Candidate>),
}

/// A candidate value with an optional strategy override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub scheme: String,
    #[serde(rename = "prefselector", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Which candidate list is consulted when a rule's `path` is a list.
///
/// The rule engine this resolver descends from walked the rule's `top`
/// candidates when checking path candidates. `TopLevelCandidates` keeps that
/// behaviour available until the rule authors confirm which one is intended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathCandidatePolicy {
    /// Match the URL path against the rule's own `path` candidates.
    #[default]
    PathCandidates,
    /// Match the URL path against the rule's `top` candidates (legacy).
    TopLevelCandidates,
}

#[derive(Debug)]
struct CandidatePattern {
    pattern: Regex,
    strategy: Option<String>,
}

#[derive(Debug)]
enum PathMatcher {
    Single(Regex),
    Candidates(Vec<CandidatePattern>),
}

#[derive(Debug)]
struct CompiledRule {
    rule: AdjusterRule,
    /// `None` when the domain pattern does not compile; such a rule never matches.
    domain: Option<Regex>,
    path: Option<PathMatcher>,
    /// `top` candidates compiled as path patterns, for the legacy policy.
    top_as_path: Option<Vec<CandidatePattern>>,
    /// Why the rule's top-level or path constraints cannot be evaluated.
    unusable: Option<String>,
}

/// Resolves URLs to strategy names using an ordered rule list.
#[derive(Debug)]
pub struct StrategyResolver {
    rules: Vec<CompiledRule>,
    policy: PathCandidatePolicy,
}

/// Compile a pattern so it only matches at the start of the input.
///
/// Rule lists are written for JavaScript regular expressions, so look-around
/// and backreferences are accepted.
fn anchored(pattern: &str) -> std::result::Result<Regex, String> {
    Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
}

/// Backtracking limits count as "no match".
fn matches(pattern: &Regex, text: &str) -> bool {
    pattern.is_match(text).unwrap_or_else(|e| {
        debug!("Pattern {} gave up on '{}': {}", pattern.as_str(), text, e);
        false
    })
}

fn compile_candidates(
    candidates: &[Candidate],
) -> std::result::Result<Vec<CandidatePattern>, String> {
    candidates
        .iter()
        .map(|c| {
            Ok(CandidatePattern {
                pattern: anchored(&c.scheme)?,
                strategy: c.strategy.clone(),
            })
        })
        .collect()
}

impl CompiledRule {
    fn compile(rule: AdjusterRule, index: usize) -> Self {
        let domain = match anchored(&rule.domain_pattern) {
            Ok(domain) => Some(domain),
            Err(e) => {
                warn!("Adjuster rule {} can never match: {}", index, e);
                None
            }
        };

        let mut unusable = None;
        let path = match &rule.path {
            None => None,
            Some(MatchSpec::Single(p)) => match anchored(p) {
                Ok(pattern) => Some(PathMatcher::Single(pattern)),
                Err(e) => {
                    unusable = Some(e);
                    None
                }
            },
            Some(MatchSpec::Candidates(c)) => match compile_candidates(c) {
                Ok(candidates) => Some(PathMatcher::Candidates(candidates)),
                Err(e) => {
                    unusable = Some(e);
                    None
                }
            },
        };
        let top_as_path = match &rule.top_level {
            Some(MatchSpec::Candidates(c)) => compile_candidates(c).ok(),
            _ => None,
        };
        if let Some(ref reason) = unusable {
            warn!("Adjuster rule {} is unusable: {}", index, reason);
        }

        Self {
            rule,
            domain,
            path,
            top_as_path,
            unusable,
        }
    }
}

/// Split a host into everything before the last label and the last label.
fn split_host(host: &str) -> (&str, &str) {
    match host.rsplit_once('.') {
        Some((rest, top)) => (rest, top),
        None => ("", host),
    }
}

impl StrategyResolver {
    /// Build a resolver from parsed rules.
    ///
    /// A pattern that does not compile disables its rule instead of the list.
    pub fn new(rules: Vec<AdjusterRule>, policy: PathCandidatePolicy) -> Result<Self> {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(i, rule)| CompiledRule::compile(rule, i))
            .collect();

        Ok(Self { rules, policy })
    }

    /// Parse the rule list from JSON.
    pub fn from_json(json: &str, policy: PathCandidatePolicy) -> Result<Self> {
        let rules: Vec<AdjusterRule> = serde_json::from_str(json)
            .map_err(|e| QueryError::Config(format!("Invalid adjuster rule list: {}", e)))?;
        Self::new(rules, policy)
    }

    /// Load the rule list from a JSON file.
    pub fn load(path: &Path, policy: PathCandidatePolicy) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!(
                "Failed to read adjuster rules {}: {}",
                path.display(),
                e
            ))
        })?;
        let resolver = Self::from_json(&content, policy)?;
        debug!(
            "Loaded {} adjuster rules from {}",
            resolver.len(),
            path.display()
        );
        Ok(resolver)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn policy(&self) -> PathCandidatePolicy {
        self.policy
    }

    /// Resolve the strategy name for a URL.
    pub fn resolve(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| QueryError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| QueryError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no host".to_string(),
            })?
            .to_lowercase();
        let (rest, top) = split_host(&host);
        let path = parsed.path().strip_prefix('/').unwrap_or(parsed.path());

        let Some(compiled) = self
            .rules
            .iter()
            .find(|r| r.domain.as_ref().is_some_and(|d| matches(d, rest)))
        else {
            return Err(QueryError::NoMatchingStrategy(format!(
                "No valid adjuster found for url {}",
                url
            )));
        };
        if let Some(ref reason) = compiled.unusable {
            return Err(QueryError::NoMatchingStrategy(format!(
                "Adjuster for domain {} is unusable: {}",
                host, reason
            )));
        }

        let mut strategy = compiled.rule.strategy.clone();

        match &compiled.rule.top_level {
            None => {}
            Some(MatchSpec::Single(required)) => {
                if required != top {
                    return Err(no_toplevel(top, &host));
                }
            }
            Some(MatchSpec::Candidates(candidates)) => {
                let candidate = candidates
                    .iter()
                    .find(|c| c.scheme == top)
                    .ok_or_else(|| no_toplevel(top, &host))?;
                if let Some(ref name) = candidate.strategy {
                    strategy = Some(name.clone());
                }
            }
        }

        match &compiled.path {
            None => {}
            Some(PathMatcher::Single(pattern)) => {
                if !matches(pattern, path) {
                    return Err(no_path(path, url));
                }
            }
            Some(PathMatcher::Candidates(own)) => {
                let candidates = match self.policy {
                    PathCandidatePolicy::PathCandidates => own.as_slice(),
                    PathCandidatePolicy::TopLevelCandidates => compiled
                        .top_as_path
                        .as_deref()
                        .ok_or_else(|| no_path(path, url))?,
                };
                let candidate = candidates
                    .iter()
                    .find(|c| matches(&c.pattern, path))
                    .ok_or_else(|| no_path(path, url))?;
                if let Some(ref name) = candidate.strategy {
                    strategy = Some(name.clone());
                }
            }
        }

        strategy.ok_or_else(|| {
            QueryError::NoMatchingStrategy(format!(
                "Adjuster for domain {} names no strategy",
                host
            ))
        })
    }
}

fn no_toplevel(top: &str, host: &str) -> QueryError {
    QueryError::NoMatchingStrategy(format!(
        "No valid adjuster found for toplevel {} of domain {}",
        top, host
    ))
}

fn no_path(path: &str, url: &str) -> QueryError {
    QueryError::NoMatchingStrategy(format!(
        "No valid adjuster found for path {} of url {}",
        path, url
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(json: &str) -> StrategyResolver {
        StrategyResolver::from_json(json, PathCandidatePolicy::default()).unwrap()
    }

    #[test]
    fn single_toplevel_rule_resolves() {
        let r = resolver(
            r#"[{"scheme": "(?:www\\.)?sciencedirect", "top": "com", "prefselector": "sciencedirect"}]"#,
        );
        assert_eq!(
            r.resolve("https://www.sciencedirect.com/science/article/pii/S0").unwrap(),
            "sciencedirect"
        );
    }

    #[test]
    fn host_is_lowercased_and_port_ignored() {
        let r = resolver(r#"[{"scheme": "arxiv", "top": "org", "prefselector": "arxiv"}]"#);
        assert_eq!(r.resolve("https://ARXIV.org:8443/abs/1234").unwrap(), "arxiv");
    }

    #[test]
    fn domain_pattern_is_anchored_at_start() {
        let r = resolver(r#"[{"scheme": "springer", "top": "com", "prefselector": "springer"}]"#);
        assert!(r.resolve("https://link.springer.com/article/1").is_err());

        let r = resolver(r#"[{"scheme": ".*springer", "top": "com", "prefselector": "springer"}]"#);
        assert_eq!(r.resolve("https://link.springer.com/article/1").unwrap(), "springer");
    }

    #[test]
    fn first_domain_match_wins_over_later_rules() {
        let r = resolver(
            r#"[
                {"scheme": "example", "top": "org", "prefselector": "first"},
                {"scheme": "example", "top": "org", "prefselector": "second"}
            ]"#,
        );
        assert_eq!(r.resolve("https://example.org/x").unwrap(), "first");
    }

    #[test]
    fn failing_first_match_does_not_fall_through() {
        // The second rule would match perfectly; the first one locks resolution.
        let r = resolver(
            r#"[
                {"scheme": "example", "top": "com", "prefselector": "first"},
                {"scheme": "example", "top": "org", "prefselector": "second"}
            ]"#,
        );
        let err = r.resolve("https://example.org/x").unwrap_err();
        assert!(matches!(err, QueryError::NoMatchingStrategy(ref m) if m.contains("toplevel org")));
    }

    #[test]
    fn unmatched_domain_fails() {
        let r = resolver(r#"[{"scheme": "arxiv", "top": "org", "prefselector": "arxiv"}]"#);
        assert!(matches!(
            r.resolve("https://unknown.net/paper"),
            Err(QueryError::NoMatchingStrategy(_))
        ));
    }

    #[test]
    fn toplevel_candidates_apply_override() {
        let r = resolver(
            r#"[{
                "scheme": "(?:www\\.)?nature",
                "top": [{"scheme": "de"}, {"scheme": "com", "prefselector": "nature_com"}],
                "prefselector": "nature"
            }]"#,
        );
        assert_eq!(r.resolve("https://www.nature.com/articles/x").unwrap(), "nature_com");
        assert_eq!(r.resolve("https://www.nature.de/articles/x").unwrap(), "nature");
        assert!(r.resolve("https://www.nature.fr/articles/x").is_err());
    }

    #[test]
    fn single_path_pattern_must_match() {
        let r = resolver(
            r#"[{"scheme": "dl\\.acm", "top": "org", "path": "doi/", "prefselector": "acm"}]"#,
        );
        assert_eq!(r.resolve("https://dl.acm.org/doi/10.1145/1").unwrap(), "acm");
        let err = r.resolve("https://dl.acm.org/profile/1").unwrap_err();
        assert!(matches!(err, QueryError::NoMatchingStrategy(ref m) if m.contains("path profile/1")));
    }

    const PATH_LIST_RULE: &str = r#"[{
        "scheme": "ieeexplore\\.ieee",
        "top": [{"scheme": "org"}],
        "path": [
            {"scheme": "document/", "prefselector": "ieee_document"},
            {"scheme": "abstract/"}
        ],
        "prefselector": "ieee"
    }]"#;

    #[test]
    fn path_candidates_first_match_with_override() {
        let r = resolver(PATH_LIST_RULE);
        assert_eq!(
            r.resolve("https://ieeexplore.ieee.org/document/123").unwrap(),
            "ieee_document"
        );
        assert_eq!(r.resolve("https://ieeexplore.ieee.org/abstract/123").unwrap(), "ieee");
        assert!(r.resolve("https://ieeexplore.ieee.org/author/1").is_err());
    }

    #[test]
    fn legacy_policy_checks_toplevel_candidates_against_path() {
        let r = StrategyResolver::from_json(PATH_LIST_RULE, PathCandidatePolicy::TopLevelCandidates)
            .unwrap();
        assert!(r.resolve("https://ieeexplore.ieee.org/document/123").is_err());
        assert_eq!(r.resolve("https://ieeexplore.ieee.org/org-page").unwrap(), "ieee");
    }

    #[test]
    fn legacy_policy_with_single_toplevel_fails_path_lists() {
        let r = StrategyResolver::from_json(
            r#"[{"scheme": "x", "top": "org", "path": [{"scheme": ""}], "prefselector": "x"}]"#,
            PathCandidatePolicy::TopLevelCandidates,
        )
        .unwrap();
        assert!(r.resolve("https://x.org/anything").is_err());
    }

    #[test]
    fn rule_without_strategy_is_no_match() {
        let r = resolver(r#"[{"scheme": "example", "top": "org"}]"#);
        assert!(matches!(
            r.resolve("https://example.org/"),
            Err(QueryError::NoMatchingStrategy(_))
        ));
    }

    #[test]
    fn invalid_url_is_reported() {
        let r = resolver("[]");
        assert!(matches!(r.resolve("not a url"), Err(QueryError::InvalidUrl { .. })));
    }

    #[test]
    fn lookaround_patterns_compile() {
        let r = resolver(
            r#"[
                {"scheme": "(?!www\\.)arxiv", "top": "org", "prefselector": "arxiv"},
                {"scheme": "example", "top": "org", "prefselector": "example"}
            ]"#,
        );
        assert_eq!(r.resolve("https://arxiv.org/abs/1").unwrap(), "arxiv");
        assert!(r.resolve("https://www.arxiv.org/abs/1").is_err());
        assert_eq!(r.resolve("https://example.org/x").unwrap(), "example");
    }

    #[test]
    fn uncompilable_domain_pattern_disables_only_its_rule() {
        let r = resolver(
            r#"[
                {"scheme": "(unclosed", "top": "org", "prefselector": "x"},
                {"scheme": "example", "top": "org", "prefselector": "example"}
            ]"#,
        );
        assert_eq!(r.len(), 2);
        assert_eq!(r.resolve("https://example.org/x").unwrap(), "example");
    }

    #[test]
    fn uncompilable_path_pattern_locks_its_domain() {
        let r = resolver(
            r#"[
                {"scheme": "example", "top": "org", "path": "(unclosed", "prefselector": "first"},
                {"scheme": "example", "top": "org", "prefselector": "second"},
                {"scheme": "arxiv", "top": "org", "prefselector": "arxiv"}
            ]"#,
        );
        let err = r.resolve("https://example.org/x").unwrap_err();
        assert!(matches!(err, QueryError::NoMatchingStrategy(ref m) if m.contains("unusable")));
        assert_eq!(r.resolve("https://arxiv.org/abs/1").unwrap(), "arxiv");
    }

    #[test]
    fn host_without_dots_uses_empty_domain() {
        let r = resolver(r#"[{"scheme": "$", "top": "localhost", "prefselector": "local"}]"#);
        assert_eq!(r.resolve("http://localhost/paper").unwrap(), "local");
    }
}
