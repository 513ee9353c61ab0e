//! Per-source page acceptance, injected into the crawl controller.

use url::Url;

/// Decides whether a fetched page belongs in the output set.
///
/// Rejection never affects link discovery.
pub trait PageClassifier: Send + Sync {
    /// `heading` is the page's first section heading, or `""`.
    fn accepts(&self, title: &str, heading: &str, url: &Url) -> bool;
}

/// Accepts pages whose title, leading heading or URL path mentions any keyword.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    /// Keywords are matched case-insensitively as substrings.
    pub fn new<I>(keywords: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl PageClassifier for KeywordClassifier {
    fn accepts(&self, title: &str, heading: &str, url: &Url) -> bool {
        let haystacks = [
            title.to_lowercase(),
            heading.to_lowercase(),
            url.path().to_lowercase(),
        ];
        self.keywords
            .iter()
            .any(|k| haystacks.iter().any(|h| h.contains(k.as_str())))
    }
}
