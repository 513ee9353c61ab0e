//! Static per-source admission rules: allowed path prefixes plus
//! disallowed glob patterns.

use regex::Regex;
use url::Url;

/// Admission policy for URLs on a single origin.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    allow_prefixes: Vec<String>,
    disallow_patterns: Vec<String>,
    disallow_regexes: Vec<Regex>,
}

impl RuleSet {
    /// Build a rule set. Patterns use `fnmatch` syntax (`*`, `?`).
    pub fn new<P, D>(allow_prefixes: P, disallow_patterns: D) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let disallow_patterns: Vec<String> =
            disallow_patterns.into_iter().map(Into::into).collect();
        let disallow_regexes = disallow_patterns
            .iter()
            .filter_map(|p| glob_to_regex(p))
            .collect();

        Self {
            allow_prefixes: allow_prefixes.into_iter().map(Into::into).collect(),
            disallow_patterns,
            disallow_regexes,
        }
    }

    pub fn allow_prefixes(&self) -> &[String] {
        &self.allow_prefixes
    }

    pub fn disallow_patterns(&self) -> &[String] {
        &self.disallow_patterns
    }

    /// Whether `url` may be crawled for a crawl rooted at `origin`.
    ///
    /// The URL must share scheme, host and port with `origin`, start with an
    /// allowed path prefix, and match no disallow pattern on either its path
    /// or its `path?query`.
    pub fn is_allowed(&self, url: &Url, origin: &Url) -> bool {
        if url.scheme() != origin.scheme()
            || url.host_str() != origin.host_str()
            || url.port_or_known_default() != origin.port_or_known_default()
        {
            return false;
        }

        let path = url.path();
        if !self.allow_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }

        let full = match url.query() {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        };

        !self
            .disallow_regexes
            .iter()
            .any(|re| re.is_match(&full) || re.is_match(path))
    }
}

/// Convert an `fnmatch`-style pattern to an anchored regex.
///
/// `*` spans any characters including `/`; `?` is exactly one character.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}
