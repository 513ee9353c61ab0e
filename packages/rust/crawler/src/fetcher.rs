//! Polite HTTP fetcher: randomized delay before every request, conditional
//! revalidation against the on-disk cache, and bounded retry with
//! exponential backoff.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{
    ACCEPT, ETAG, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use policygraph_shared::{FetchConfig, FetchResult, PolicyGraphError, Result};

use crate::cache::{CacheMeta, CachedResponse, ResponseCache};

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// What a single network attempt produced.
enum Attempt {
    /// Final answer, no further attempts.
    Done(FetchResult),
    /// Retryable failure.
    Retry { status: Option<u16>, error: String },
}

/// Sequential, cache-aware fetcher. One instance should serve a whole ingest
/// run so the politeness delay is global.
pub struct PoliteFetcher {
    client: Client,
    cache: ResponseCache,
    config: FetchConfig,
}

impl PoliteFetcher {
    /// Create a fetcher; opens (and creates) the cache directory.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PolicyGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        let cache = ResponseCache::open(&config.cache_dir)?;

        Ok(Self {
            client,
            cache,
            config,
        })
    }

    /// The underlying HTTP client (shared with robots.txt loading).
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Fetch `url`. Never fails outright: problems are reported through
    /// [`FetchResult::error`].
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let cached = self.cache.load(url);
        if cached.is_some() {
            debug!("cache entry present, revalidating");
        }

        let mut last_status = None;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.retries {
            tokio::time::sleep(self.politeness_delay()).await;

            match self.attempt(url, cached.as_ref()).await {
                Attempt::Done(result) => return result,
                Attempt::Retry { status, error } => {
                    last_status = status;
                    last_error = error;
                }
            }

            if attempt < self.config.retries {
                let wait = self.backoff(attempt);
                debug!(
                    attempt,
                    error = %last_error,
                    wait_ms = wait.as_millis() as u64,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(wait).await;
            }
        }

        warn!(error = %last_error, retries = self.config.retries, "giving up");
        FetchResult::failure(url, last_status, format!("retries exhausted: {last_error}"))
    }

    async fn attempt(&self, url: &str, cached: Option<&CachedResponse>) -> Attempt {
        let mut request = self.client.get(url);
        if let Some(hit) = cached {
            if let Some(etag) = &hit.meta.etag {
                request = request.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(modified) = &hit.meta.last_modified {
                request = request.header(IF_MODIFIED_SINCE, modified.as_str());
            }
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return Attempt::Retry {
                    status: None,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status();
        let code = status.as_u16();

        if status == StatusCode::NOT_MODIFIED {
            return Attempt::Done(match cached {
                Some(hit) => {
                    debug!("304 not modified, serving cached body");
                    FetchResult::success(
                        url,
                        hit.meta.final_url.clone(),
                        code,
                        hit.meta.headers.clone(),
                        hit.content.clone(),
                        true,
                    )
                }
                None => FetchResult::failure(url, Some(code), "HTTP 304 without a cached copy"),
            });
        }

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry {
                status: Some(code),
                error: format!("retryable status {code}"),
            };
        }

        if !status.is_success() {
            debug!(status = code, "non-retryable status");
            return Attempt::Done(FetchResult::failure(url, Some(code), format!("HTTP {status}")));
        }

        let final_url = response.url().to_string();
        let headers = header_map(response.headers());

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return Attempt::Retry {
                    status: Some(code),
                    error: format!("body read failed: {e}"),
                };
            }
        };

        if status == StatusCode::OK {
            let meta = CacheMeta {
                url: url.to_string(),
                final_url: final_url.clone(),
                status_code: code,
                etag: headers.get(ETAG.as_str()).cloned(),
                last_modified: headers.get(LAST_MODIFIED.as_str()).cloned(),
                headers: headers.clone(),
            };
            if let Err(e) = self.cache.store(&meta, &body) {
                warn!(error = %e, "failed to write cache entry");
            }
        }

        Attempt::Done(FetchResult::success(url, final_url, code, headers, body, false))
    }

    /// Uniform random pause in `[min_delay, max_delay]`.
    fn politeness_delay(&self) -> Duration {
        let min = self.config.min_delay.as_secs_f64();
        let max = self.config.max_delay.as_secs_f64();
        if max <= min {
            return self.config.min_delay;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..=max))
    }

    /// `backoff_factor * 2^attempt` plus uniform jitter in `[0, max_jitter]`.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_factor.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_max = self.config.max_jitter.as_secs_f64();
        let jitter = if jitter_max > 0.0 {
            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=jitter_max))
        } else {
            Duration::ZERO
        };
        base + jitter
    }
}

/// Flatten response headers into a sorted map; repeated names are joined.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}
