//! Frontier key normalization.

use url::Url;

/// Canonicalizes URLs so that trivially different spellings share one
/// frontier key.
#[derive(Debug, Clone, Default)]
pub struct UrlNormalizer {
    /// Whitelisted query parameters with the seed's value, sorted by name.
    keep: Vec<(String, Option<String>)>,
}

impl UrlNormalizer {
    /// Keep only `keep_params`, defaulting missing ones to the seed's value.
    pub fn from_seed(seed: &Url, keep_params: &[String]) -> Self {
        let mut keep: Vec<(String, Option<String>)> = keep_params
            .iter()
            .map(|name| {
                let default = seed
                    .query_pairs()
                    .find(|(k, _)| k == name.as_str())
                    .map(|(_, v)| v.into_owned());
                (name.clone(), default)
            })
            .collect();
        keep.sort_by(|a, b| a.0.cmp(&b.0));
        keep.dedup_by(|a, b| a.0 == b.0);
        Self { keep }
    }

    /// Lower-case host, no fragment, no duplicate or trailing slashes, and
    /// only whitelisted query parameters.
    pub fn normalize(&self, url: &Url) -> Url {
        let mut out = url.clone();
        out.set_fragment(None);

        if let Some(host) = url.host_str() {
            let lower = host.to_ascii_lowercase();
            if lower != host {
                // Cannot fail: only the case changes.
                let _ = out.set_host(Some(&lower));
            }
        }

        let mut path = collapse_slashes(url.path());
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        if path.is_empty() {
            path.push('/');
        }
        out.set_path(&path);

        let pairs: Vec<(String, String)> = self
            .keep
            .iter()
            .filter_map(|(name, default)| {
                url.query_pairs()
                    .find(|(k, _)| k == name.as_str())
                    .map(|(_, v)| v.into_owned())
                    .or_else(|| default.clone())
                    .map(|v| (name.clone(), v))
            })
            .collect();

        if pairs.is_empty() {
            out.set_query(None);
        } else {
            out.query_pairs_mut().clear().extend_pairs(pairs);
        }
        out
    }

    /// Parse and normalize; `None` for unparseable input.
    pub fn normalize_str(&self, url: &str) -> Option<Url> {
        Url::parse(url).ok().map(|u| self.normalize(&u))
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}
