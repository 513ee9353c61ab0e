//! On-disk HTTP response cache keyed by a hash of the request URL.
//!
//! Each entry is two files: `<key>.html` (body) and `<key>.json` (metadata
//! with the validators used for conditional requests).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use policygraph_shared::{PolicyGraphError, Result};

/// Metadata stored next to a cached body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// A cache hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub meta: CacheMeta,
    pub content: String,
}

/// Directory-backed response cache.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| PolicyGraphError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// SHA-256 of the URL, hex encoded.
    pub fn key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = Self::key(url);
        (
            self.dir.join(format!("{key}.html")),
            self.dir.join(format!("{key}.json")),
        )
    }

    /// Look up `url`. Missing, unreadable or corrupt entries are a miss.
    pub fn load(&self, url: &str) -> Option<CachedResponse> {
        let (body_path, meta_path) = self.paths(url);
        let content = std::fs::read_to_string(&body_path).ok()?;
        let raw_meta = std::fs::read_to_string(&meta_path).ok()?;
        match serde_json::from_str::<CacheMeta>(&raw_meta) {
            Ok(meta) => Some(CachedResponse { meta, content }),
            Err(e) => {
                debug!(url, error = %e, "corrupt cache metadata, treating as miss");
                None
            }
        }
    }

    /// Overwrite the entry for `meta.url`.
    pub fn store(&self, meta: &CacheMeta, content: &str) -> Result<()> {
        let (body_path, meta_path) = self.paths(&meta.url);
        std::fs::write(&body_path, content).map_err(|e| PolicyGraphError::io(&body_path, e))?;
        let json = serde_json::to_string(meta)?;
        std::fs::write(&meta_path, json).map_err(|e| PolicyGraphError::io(&meta_path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(url: &str) -> CacheMeta {
        CacheMeta {
            url: url.into(),
            final_url: url.into(),
            status_code: 200,
            etag: Some("\"v1\"".into()),
            last_modified: None,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn key_is_url_hash() {
        let key = ResponseCache::key("https://www.tiktok.com/community-guidelines/en");
        assert_eq!(key.len(), 64);
        assert_eq!(key, ResponseCache::key("https://www.tiktok.com/community-guidelines/en"));
        assert_ne!(key, ResponseCache::key("https://www.tiktok.com/community-guidelines/fr"));
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).unwrap();
        let url = "https://example.com/a";

        assert!(cache.load(url).is_none());
        cache.store(&meta(url), "<p>v1</p>").unwrap();

        let hit = cache.load(url).expect("cache hit");
        assert_eq!(hit.content, "<p>v1</p>");
        assert_eq!(hit.meta.etag.as_deref(), Some("\"v1\""));
    }

    #[test]
    fn store_overwrites_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).unwrap();
        let url = "https://example.com/a";

        cache.store(&meta(url), "old").unwrap();
        let mut newer = meta(url);
        newer.etag = Some("\"v2\"".into());
        cache.store(&newer, "new").unwrap();

        let hit = cache.load(url).unwrap();
        assert_eq!(hit.content, "new");
        assert_eq!(hit.meta.etag.as_deref(), Some("\"v2\""));
    }

    #[test]
    fn corrupt_metadata_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).unwrap();
        let url = "https://example.com/a";
        cache.store(&meta(url), "body").unwrap();

        let key = ResponseCache::key(url);
        std::fs::write(dir.path().join(format!("{key}.json")), "{not json").unwrap();
        assert!(cache.load(url).is_none());
    }
}
