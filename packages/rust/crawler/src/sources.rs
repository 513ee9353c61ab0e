//! Static per-source crawl tables.
//!
//! Each supported provider declares where crawling starts, which paths are
//! in scope, what its robots.txt forbids, and how aggressive traversal may be.
//! Adding a provider means adding a table here; the controller stays generic.

use std::collections::BTreeSet;

use url::Url;

use policygraph_shared::{Platform, PolicyGraphError, Result, Source};

use crate::classifier::{KeywordClassifier, PageClassifier};
use crate::engine::CrawlRequest;
use crate::rules::RuleSet;

/// Crawl settings for one documentation provider.
#[derive(Debug, Clone, Copy)]
pub struct SourceProfile {
    pub source: Source,
    pub start_url: &'static str,
    /// Path prefixes the crawl is confined to.
    pub allowed_prefixes: &'static [&'static str],
    /// Rule-set allow prefixes (site sections we may touch at all).
    pub rule_allow: &'static [&'static str],
    /// Rule-set disallow globs.
    pub rule_disallow: &'static [&'static str],
    pub depth_limit: Option<u32>,
    pub keep_query_params: &'static [&'static str],
    /// Empty means every page is accepted.
    pub classifier_keywords: &'static [&'static str],
    /// Fetch and honour the live robots.txt.
    pub use_robots: bool,
    pub platforms: &'static [Platform],
}

const TIKTOK: SourceProfile = SourceProfile {
    source: Source::TiktokCommunityGuidelines,
    start_url: "https://www.tiktok.com/community-guidelines/en",
    allowed_prefixes: &["/community-guidelines/en"],
    rule_allow: &[
        "/community-guidelines",
        "/amp",
        "/legal",
        "/safety",
        "/transparency",
        "/about",
        "/forgood",
    ],
    rule_disallow: &[
        "/inapp*",
        "/auth*",
        "/embed/@*",
        "/embed/v2*",
        "/embed/curated*",
        "/link*",
        "*/directory/*",
        "/search/video?*",
        "/search/user?q=*",
        "/search?*",
        "/search/live?*",
        "/shop/view/product/*",
        "/sgtm/g/collect*",
        "/api/share/settings*",
        "/api/recommend/embed_videos*",
        "/discover/trending/detail/*",
        "/discover*",
    ],
    depth_limit: None,
    keep_query_params: &[],
    classifier_keywords: &[],
    use_robots: false,
    platforms: &[Platform::Tiktok],
};

const YOUTUBE: SourceProfile = SourceProfile {
    source: Source::YoutubePolicies,
    start_url: "https://support.google.com/youtube/answer/9288567?hl=en-GB",
    allowed_prefixes: &["/youtube/answer/"],
    rule_allow: &["/youtube/answer/", "/youtube/topic/"],
    rule_disallow: &["*/contact/*", "*/community*", "*/thread/*", "*/profile/*"],
    depth_limit: Some(2),
    keep_query_params: &["hl"],
    classifier_keywords: &[
        "policy",
        "policies",
        "guideline",
        "community",
        "harmful",
        "harassment",
        "hate",
        "violent",
        "violence",
        "misinformation",
        "spam",
        "scam",
        "nudity",
        "sexual",
        "child safety",
        "suicide",
        "self-harm",
        "impersonation",
        "firearms",
        "dangerous",
        "copyright",
        "age-restrict",
        "strike",
    ],
    use_robots: true,
    platforms: &[Platform::Youtube],
};

const META: SourceProfile = SourceProfile {
    source: Source::MetaTransparency,
    start_url: "https://transparency.meta.com/policies/community-standards/",
    allowed_prefixes: &["/policies/community-standards"],
    rule_allow: &["/policies", "/enforcement"],
    rule_disallow: &["*/download*", "*.pdf", "/reports/*"],
    depth_limit: Some(3),
    keep_query_params: &[],
    classifier_keywords: &[],
    use_robots: true,
    platforms: &[Platform::Instagram, Platform::Facebook],
};

impl SourceProfile {
    /// The built-in table for `source`.
    pub fn builtin(source: Source) -> &'static SourceProfile {
        match source {
            Source::TiktokCommunityGuidelines => &TIKTOK,
            Source::YoutubePolicies => &YOUTUBE,
            Source::MetaTransparency => &META,
        }
    }

    pub fn start_url(&self) -> Result<Url> {
        Url::parse(self.start_url).map_err(|e| {
            PolicyGraphError::parse(format!("bad start URL for {}: {e}", self.source))
        })
    }

    pub fn rules(&self) -> RuleSet {
        RuleSet::new(self.rule_allow.iter().copied(), self.rule_disallow.iter().copied())
    }

    pub fn classifier(&self) -> Option<Box<dyn PageClassifier>> {
        if self.classifier_keywords.is_empty() {
            None
        } else {
            Some(Box::new(KeywordClassifier::new(self.classifier_keywords)))
        }
    }

    /// Crawl request for this source, optionally seeded elsewhere (e.g. a
    /// mirror or mock server) while keeping the same path policy.
    pub fn crawl_request(&self, max_pages: usize, start_override: Option<Url>) -> Result<CrawlRequest> {
        let start_url = match start_override {
            Some(u) => u,
            None => self.start_url()?,
        };
        Ok(CrawlRequest {
            start_url,
            max_pages,
            allowed_prefixes: self.allowed_prefixes.iter().map(|s| s.to_string()).collect(),
            rules: self.rules(),
            depth_limit: self.depth_limit,
            keep_query_params: self.keep_query_params.iter().map(|s| s.to_string()).collect(),
            source: self.source,
            platforms: self.platforms.iter().copied().collect::<BTreeSet<_>>(),
        })
    }
}
