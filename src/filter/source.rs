//! Block-list source descriptors and line extraction.

use regex::Regex;

use super::normalize_domain;
use crate::error::PatternError;

/// One remote block list: where it lives and how to pull a domain from
/// each of its lines.
#[derive(Debug, Clone)]
pub struct Source {
    pattern: Regex,
    capture: Capture,
    url: String,
}

#[derive(Debug, Clone)]
enum Capture {
    Named(&'static str),
    First,
}

impl Source {
    /// Compile a descriptor.
    ///
    /// The domain token is taken from the named group `domain`, then `url`,
    /// then the first capture group.
    pub fn new(pattern: &str, url: impl Into<String>) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;

        let names: Vec<&str> = regex.capture_names().flatten().collect();
        let capture = if names.contains(&"domain") {
            Capture::Named("domain")
        } else if names.contains(&"url") {
            Capture::Named("url")
        } else if regex.captures_len() > 1 {
            Capture::First
        } else {
            return Err(PatternError::NoCapture(pattern.to_string()));
        };

        Ok(Self {
            pattern: regex,
            capture,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extract the canonical domain from one line, if the pattern matches.
    pub fn extract(&self, line: &str) -> Option<String> {
        let captures = self.pattern.captures(line)?;
        let token = match self.capture {
            Capture::Named(name) => captures.name(name)?,
            Capture::First => captures.get(1)?,
        };
        let domain = normalize_domain(token.as_str());
        (!domain.is_empty()).then_some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_url_group_from_hosts_line() {
        let source = Source::new(r"0.0.0.0\s+(?P<url>\S+)", "https://example.test/hosts").unwrap();

        assert_eq!(
            source.extract("0.0.0.0 ads.example.com"),
            Some("ads.example.com".to_string())
        );
        assert_eq!(source.extract("127.0.0.1 localhost"), None);
    }

    #[test]
    fn extracts_bare_domain_lines() {
        let source = Source::new(r"(?P<url>\S+)", "https://example.test/list").unwrap();

        assert_eq!(
            source.extract("  Tracker.Example.NET.  "),
            Some("tracker.example.net".to_string())
        );
        assert_eq!(source.extract("   "), None);
    }

    #[test]
    fn prefers_domain_group_over_url_group() {
        let source = Source::new(
            r"(?P<url>\S+)\s+(?P<domain>\S+)",
            "https://example.test/list",
        )
        .unwrap();

        assert_eq!(
            source.extract("127.0.0.1 pixel.example.org"),
            Some("pixel.example.org".to_string())
        );
    }

    #[test]
    fn falls_back_to_first_group() {
        let source = Source::new(r"^127\.0\.0\.1\s+(\S+)", "https://example.test/hosts").unwrap();

        assert_eq!(
            source.extract("127.0.0.1 beacon.example.com"),
            Some("beacon.example.com".to_string())
        );
    }

    #[test]
    fn rejects_pattern_without_capture() {
        let err = Source::new(r"0\.0\.0\.0\s+\S+", "https://example.test/hosts").unwrap_err();

        assert!(matches!(err, PatternError::NoCapture(_)));
    }

    #[test]
    fn rejects_invalid_pattern() {
        let err = Source::new(r"(?P<url>\S+", "https://example.test/hosts").unwrap_err();

        assert!(matches!(err, PatternError::Invalid { .. }));
    }
}
