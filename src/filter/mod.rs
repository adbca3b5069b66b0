//! Request exclusion rules.
//!
//! # Responsibilities
//! - Decide whether a method+URL pair is excluded from tracking
//! - Match by exact host, exact URL, or `"{METHOD} {URL}"` pattern
//! - Absorb collector addresses at runtime so delivery traffic is never
//!   captured by its own instrumentation
//!
//! # Design Decisions
//! - Any positive match short-circuits to "ignore"
//! - An unconfigured category never matches
//! - Host extraction is scheme-agnostic
//! - Without the self-exclusion rules, every delivery attempt would be
//!   instrumented and re-delivered, growing without bound

use dashmap::DashSet;
use regex::Regex;
use url::Url;

use crate::config::FilterConfig;
use crate::error::RelayError;

/// Decides which requests stay out of the pipeline.
#[derive(Debug)]
pub struct FilterEngine {
    ignored_hosts: DashSet<String>,
    ignored_urls: DashSet<String>,
    ignored_patterns: Vec<Regex>,
}

impl FilterEngine {
    /// Build the engine from configuration, compiling patterns up front.
    pub fn from_config(config: &FilterConfig) -> Result<Self, RelayError> {
        let ignored_patterns = config
            .ignored_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    RelayError::Config(format!("ignored pattern {p:?} does not compile: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ignored_hosts: config.ignored_hosts.iter().cloned().collect(),
            ignored_urls: config.ignored_urls.iter().cloned().collect(),
            ignored_patterns,
        })
    }

    /// Returns true when the request must be excluded from tracking.
    pub fn should_ignore(&self, method: &str, url: &str) -> bool {
        if let Some(host) = extract_host(url) {
            if self.ignored_hosts.contains(&host) {
                return true;
            }
        }

        if self.ignored_urls.contains(url) {
            return true;
        }

        if !self.ignored_patterns.is_empty() {
            let target = format!("{method} {url}");
            if self.ignored_patterns.iter().any(|p| p.is_match(&target)) {
                return true;
            }
        }

        false
    }

    /// Add exact URLs to the exclusion set at runtime.
    pub fn extend_ignored_urls<I>(&self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            self.ignored_urls.insert(url);
        }
    }

}

/// Extract the host component of a URL, tolerating a missing scheme.
fn extract_host(raw: &str) -> Option<String> {
    let candidate = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{raw}"))
    };
    candidate.ok().and_then(|u| u.host_str().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;

    fn engine(config: FilterConfig) -> FilterEngine {
        FilterEngine::from_config(&config).unwrap()
    }

    #[test]
    fn matches_exact_host() {
        let filter = engine(FilterConfig {
            ignored_hosts: ["collector.local".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(filter.should_ignore("POST", "http://collector.local/log"));
        assert!(filter.should_ignore("GET", "https://collector.local:8080/x"));
        assert!(!filter.should_ignore("GET", "http://app.example.com/x"));
    }

    #[test]
    fn matches_exact_url_only() {
        let filter = engine(FilterConfig {
            ignored_urls: ["http://a.test/health".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(filter.should_ignore("GET", "http://a.test/health"));
        assert!(!filter.should_ignore("GET", "http://a.test/health2"));
    }

    #[test]
    fn matches_method_url_pattern() {
        let filter = engine(FilterConfig {
            ignored_patterns: vec!["^GET https://test\\.com/pages/.*$".to_string()],
            ..Default::default()
        });
        assert!(filter.should_ignore("GET", "https://test.com/pages/123"));
        assert!(!filter.should_ignore("POST", "https://test.com/pages/123"));
        assert!(!filter.should_ignore("GET", "https://test.com/other"));
    }

    #[test]
    fn unconfigured_categories_never_match() {
        let filter = engine(FilterConfig::default());
        assert!(!filter.should_ignore("GET", "http://anything.example/x"));
    }

    #[test]
    fn runtime_extension_takes_effect() {
        let filter = engine(FilterConfig::default());
        assert!(!filter.should_ignore("POST", "http://127.0.0.1:27751/log"));
        filter.extend_ignored_urls(["http://127.0.0.1:27751/log".to_string()]);
        assert!(filter.should_ignore("POST", "http://127.0.0.1:27751/log"));
    }

    #[test]
    fn extracts_host_without_scheme() {
        assert_eq!(
            extract_host("collector.local:27751/x"),
            Some("collector.local".to_string())
        );
        assert_eq!(extract_host("http://a.test/x"), Some("a.test".to_string()));
        assert_eq!(extract_host(""), None);
    }
}
