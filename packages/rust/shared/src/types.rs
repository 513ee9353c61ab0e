//! Core domain types shared by the crawler and the graph exporter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PolicyGraphError;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Documentation provider a page was crawled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// TikTok Community Guidelines.
    TiktokCommunityGuidelines,
    /// YouTube policy pages on the Google help center.
    YoutubePolicies,
    /// Meta Transparency Center community standards.
    MetaTransparency,
}

impl Source {
    /// All known sources, in ingest order.
    pub const ALL: [Source; 3] = [
        Source::TiktokCommunityGuidelines,
        Source::YoutubePolicies,
        Source::MetaTransparency,
    ];

    /// Stable tag written into graph records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::TiktokCommunityGuidelines => "tiktok_community_guidelines",
            Source::YoutubePolicies => "youtube_policies",
            Source::MetaTransparency => "meta_transparency",
        }
    }

    /// Infer the content locale of a page from its URL.
    ///
    /// Returns `"unknown"` when the URL carries no recognisable locale.
    pub fn infer_locale(&self, url: &Url) -> String {
        let found = match self {
            Source::TiktokCommunityGuidelines => url
                .path()
                .strip_prefix("/community-guidelines/")
                .and_then(|rest| rest.trim_start_matches('/').split('/').next())
                .filter(|seg| !seg.is_empty())
                .map(str::to_string),
            Source::YoutubePolicies => url
                .query_pairs()
                .find(|(k, _)| k == "hl")
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty()),
            Source::MetaTransparency => url
                .path_segments()
                .and_then(|mut segs| segs.next())
                .filter(|seg| looks_like_locale(seg))
                .map(str::to_string),
        };
        found.unwrap_or_else(|| "unknown".into())
    }
}

/// `en`, `en-gb`, `pt_BR` style tags.
fn looks_like_locale(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    match bytes.len() {
        2 => bytes.iter().all(u8::is_ascii_alphabetic),
        5 => {
            bytes[..2].iter().all(u8::is_ascii_alphabetic)
                && (bytes[2] == b'-' || bytes[2] == b'_')
                && bytes[3..].iter().all(u8::is_ascii_alphabetic)
        }
        _ => false,
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = PolicyGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiktok" | "tiktok_community_guidelines" => Ok(Source::TiktokCommunityGuidelines),
            "youtube" | "youtube_policies" => Ok(Source::YoutubePolicies),
            "meta" | "meta_transparency" => Ok(Source::MetaTransparency),
            other => Err(PolicyGraphError::config(format!("unknown source '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Product a policy page applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Youtube,
    Instagram,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PageData
// ---------------------------------------------------------------------------

/// One headed span of page text, as produced by the page parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChunk {
    /// Section heading (`"Overview"` for un-headed leading content).
    pub heading: String,
    /// Position of this span within the page.
    pub order: usize,
    /// Paragraph texts joined with `\n`.
    pub text: String,
}

/// An accepted, parsed page. Built once by the crawler, read by the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    /// Normalized frontier key (before redirects).
    pub url: String,
    /// Normalized URL after redirects.
    pub final_url: String,
    pub title: String,
    pub source: Source,
    pub platforms: BTreeSet<Platform>,
    pub chunks: Vec<PageChunk>,
    /// Normalized outbound links, de-duplicated in first-seen order.
    pub out_links: Vec<String>,
}

// ---------------------------------------------------------------------------
// FetchResult
// ---------------------------------------------------------------------------

/// Outcome of fetching one URL.
///
/// Exactly one of [`content`](Self::content) and [`error`](Self::error) is
/// present; the two constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub url: String,
    pub final_url: String,
    pub status_code: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub from_cache: bool,
    content: Option<String>,
    error: Option<String>,
}

impl FetchResult {
    /// A fetch that produced a body.
    pub fn success(
        url: impl Into<String>,
        final_url: impl Into<String>,
        status_code: u16,
        headers: BTreeMap<String, String>,
        content: String,
        from_cache: bool,
    ) -> Self {
        Self {
            url: url.into(),
            final_url: final_url.into(),
            status_code: Some(status_code),
            headers,
            from_cache,
            content: Some(content),
            error: None,
        }
    }

    /// A fetch that gave up. `final_url` falls back to `url`.
    pub fn failure(url: impl Into<String>, status_code: Option<u16>, error: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status_code,
            headers: BTreeMap::new(),
            from_cache: false,
            content: None,
            error: Some(error.into()),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.content.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_roundtrip() {
        for source in Source::ALL {
            let parsed: Source = source.as_str().parse().expect("parse tag");
            assert_eq!(parsed, source);
            let json = serde_json::to_string(&source).expect("serialize");
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
        assert_eq!("YouTube".parse::<Source>().unwrap(), Source::YoutubePolicies);
        assert!("myspace".parse::<Source>().is_err());
    }

    #[test]
    fn tiktok_locale_from_path() {
        let url = Url::parse("https://www.tiktok.com/community-guidelines/en/safety").unwrap();
        assert_eq!(Source::TiktokCommunityGuidelines.infer_locale(&url), "en");

        let root = Url::parse("https://www.tiktok.com/community-guidelines").unwrap();
        assert_eq!(Source::TiktokCommunityGuidelines.infer_locale(&root), "unknown");
    }

    #[test]
    fn youtube_locale_from_query() {
        let url = Url::parse("https://support.google.com/youtube/answer/9288567?hl=en-GB").unwrap();
        assert_eq!(Source::YoutubePolicies.infer_locale(&url), "en-GB");

        let bare = Url::parse("https://support.google.com/youtube/answer/9288567").unwrap();
        assert_eq!(Source::YoutubePolicies.infer_locale(&bare), "unknown");
    }

    #[test]
    fn meta_locale_from_leading_segment() {
        let url = Url::parse("https://transparency.meta.com/en-gb/policies/community-standards/").unwrap();
        assert_eq!(Source::MetaTransparency.infer_locale(&url), "en-gb");

        let plain = Url::parse("https://transparency.meta.com/policies/community-standards/").unwrap();
        assert_eq!(Source::MetaTransparency.infer_locale(&plain), "unknown");
    }

    #[test]
    fn fetch_result_holds_exactly_one_outcome() {
        let ok = FetchResult::success(
            "https://a.example/x",
            "https://a.example/y",
            200,
            BTreeMap::new(),
            "<html></html>".into(),
            false,
        );
        assert!(ok.is_success());
        assert!(ok.error().is_none());
        assert_eq!(ok.final_url, "https://a.example/y");

        let failed = FetchResult::failure("https://a.example/x", Some(404), "HTTP 404");
        assert!(!failed.is_success());
        assert!(failed.content().is_none());
        assert_eq!(failed.error(), Some("HTTP 404"));
        assert_eq!(failed.final_url, failed.url);
    }

    #[test]
    fn platforms_serialize_lowercase() {
        let set: BTreeSet<Platform> = [Platform::Instagram, Platform::Facebook].into();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["instagram","facebook"]"#);
    }
}
