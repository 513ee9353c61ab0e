//! Sequential, admission-checked breadth-first crawl controller.
//!
//! The controller starts from a seed URL, walks a FIFO frontier within the
//! source's path prefixes and rule set, consults robots.txt, and turns every
//! accepted page into a [`PageData`] for the exporter.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use policygraph_shared::{PageData, Platform, Source};

use crate::classifier::PageClassifier;
use crate::fetcher::PoliteFetcher;
use crate::normalize::UrlNormalizer;
use crate::parser::parse_html;
use crate::robots::{AllowAll, RobotsPolicy};
use crate::rules::RuleSet;

/// Callback invoked with each accepted page URL and the running count.
pub type ProgressFn<'a> = &'a (dyn Fn(&str, usize) + Sync);

// ---------------------------------------------------------------------------
// CrawlRequest / CrawlResult
// ---------------------------------------------------------------------------

/// Everything one crawl needs to know about its source.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub start_url: Url,
    /// Stop after this many accepted pages.
    pub max_pages: usize,
    /// Path prefixes a URL must start with; empty admits every path.
    pub allowed_prefixes: Vec<String>,
    pub rules: RuleSet,
    /// Links deeper than this are never enqueued. `None` means unbounded.
    pub depth_limit: Option<u32>,
    /// Query parameters that survive normalization.
    pub keep_query_params: Vec<String>,
    pub source: Source,
    pub platforms: BTreeSet<Platform>,
}

/// Summary of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Accepted pages in visitation order.
    pub pages: Vec<PageData>,
    /// URLs excluded by robots.txt.
    pub robots_skipped: Vec<String>,
    /// Fetch failures (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Number of URLs handed to the fetcher.
    pub fetched: usize,
    /// Pages fetched but turned down by the classifier.
    pub rejected: usize,
    /// Redirects that landed on a page already visited.
    pub duplicates: usize,
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// One crawl of one source. Frontier state lives on the instance, so
/// independent crawls never share `seen`/`queued` sets.
pub struct Crawler<'a> {
    fetcher: &'a PoliteFetcher,
    request: CrawlRequest,
    robots: Box<dyn RobotsPolicy>,
    classifier: Option<Box<dyn PageClassifier>>,
    progress: Option<ProgressFn<'a>>,
    normalizer: UrlNormalizer,
    origin: Url,
    frontier: VecDeque<(Url, u32)>,
    seen: HashSet<String>,
    queued: HashSet<String>,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a PoliteFetcher, request: CrawlRequest) -> Self {
        let normalizer = UrlNormalizer::from_seed(&request.start_url, &request.keep_query_params);
        let origin = normalizer.normalize(&request.start_url);
        Self {
            fetcher,
            request,
            robots: Box::new(AllowAll),
            classifier: None,
            progress: None,
            normalizer,
            origin,
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            queued: HashSet::new(),
        }
    }

    pub fn with_robots(mut self, robots: Box<dyn RobotsPolicy>) -> Self {
        self.robots = robots;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn PageClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the crawl to completion.
    #[instrument(skip_all, fields(source = %self.request.source, start_url = %self.origin))]
    pub async fn run(mut self) -> CrawlResult {
        let start_time = Instant::now();

        let mut pages: Vec<PageData> = Vec::new();
        let mut robots_skipped: Vec<String> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut fetched: usize = 0;
        let mut rejected: usize = 0;
        let mut duplicates: usize = 0;

        info!(
            max_pages = self.request.max_pages,
            depth_limit = ?self.request.depth_limit,
            "starting crawl"
        );

        let seed = self.origin.clone();
        self.queued.insert(seed.to_string());
        self.frontier.push_back((seed, 0));

        while pages.len() < self.request.max_pages {
            let Some((url, depth)) = self.frontier.pop_front() else {
                break;
            };
            let key = url.to_string();

            if !self.seen.insert(key.clone()) {
                continue;
            }
            if !self.admits(&url) {
                debug!(%url, "outside crawl scope, skipping");
                continue;
            }
            if !self.robots.can_fetch(&url) {
                debug!(%url, "disallowed by robots.txt");
                robots_skipped.push(key);
                continue;
            }

            let result = self.fetcher.fetch(&key).await;
            fetched += 1;

            let content = match result.content() {
                Some(body) if !body.trim().is_empty() => body,
                _ => {
                    let message = result.error().unwrap_or("empty response body").to_string();
                    warn!(%url, error = %message, "fetch failed");
                    errors.push((key, message));
                    continue;
                }
            };

            // Links resolve against the raw final URL; only keys are normalized.
            let base = Url::parse(&result.final_url).unwrap_or_else(|_| url.clone());
            let final_url = self.normalizer.normalize(&base);
            let final_key = final_url.to_string();
            if final_key != key && !self.seen.insert(final_key) {
                debug!(%url, %final_url, "redirect target already visited");
                duplicates += 1;
                continue;
            }

            let parsed = parse_html(content, &base);

            let mut out_links: Vec<String> = Vec::new();
            let mut link_set: HashSet<String> = HashSet::new();
            for link in &parsed.links {
                let Some(normalized) = self.normalizer.normalize_str(link) else {
                    continue;
                };
                let link_key = normalized.to_string();
                if !link_set.insert(link_key.clone()) {
                    continue;
                }
                out_links.push(link_key);
                self.enqueue(normalized, depth + 1);
            }

            if let Some(classifier) = &self.classifier {
                let heading = parsed.chunks.first().map(|c| c.heading.as_str()).unwrap_or("");
                if !classifier.accepts(&parsed.title, heading, &url) {
                    debug!(%url, title = %parsed.title, "rejected by classifier");
                    rejected += 1;
                    continue;
                }
            }

            debug!(%url, depth, sections = parsed.chunks.len(), links = out_links.len(), "page accepted");
            pages.push(PageData {
                url: key,
                final_url: final_url.to_string(),
                title: parsed.title,
                source: self.request.source,
                platforms: self.request.platforms.clone(),
                chunks: parsed.chunks,
                out_links,
            });

            if let (Some(progress), Some(page)) = (self.progress, pages.last()) {
                progress(&page.url, pages.len());
            }
        }

        let result = CrawlResult {
            pages,
            robots_skipped,
            errors,
            fetched,
            rejected,
            duplicates,
            duration: start_time.elapsed(),
        };

        info!(
            pages = result.pages.len(),
            fetched = result.fetched,
            rejected = result.rejected,
            duplicates = result.duplicates,
            robots_skipped = result.robots_skipped.len(),
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        result
    }

    /// Path-prefix and rule-set admission.
    fn admits(&self, url: &Url) -> bool {
        let path = url.path();
        let prefix_ok = self.request.allowed_prefixes.is_empty()
            || self
                .request
                .allowed_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()));
        prefix_ok && self.request.rules.is_allowed(url, &self.origin)
    }

    fn enqueue(&mut self, url: Url, depth: u32) {
        if self.request.depth_limit.is_some_and(|limit| depth > limit) {
            return;
        }
        let key = url.to_string();
        if self.seen.contains(&key) || self.queued.contains(&key) {
            return;
        }
        if !self.admits(&url) {
            return;
        }
        self.queued.insert(key);
        self.frontier.push_back((url, depth));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use policygraph_shared::FetchConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::classifier::KeywordClassifier;
    use crate::robots::RobotsTxt;

    fn html(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{l}">link</a>"#))
            .collect();
        format!(
            "<html><head><title>{title}</title></head><body>\
             <h2>{title} section</h2><p>Policy text for the {title} page goes here.</p>\
             {anchors}</body></html>"
        )
    }

    async fn serve(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    /// /docs → a, b, /other/x, /docs/private; a → c, /docs; b → a.
    async fn site() -> MockServer {
        let server = MockServer::start().await;
        serve(&server, "/docs", html("Index", &["/docs/a", "/docs/b/", "/other/x", "/docs/private"])).await;
        serve(&server, "/docs/a", html("Alpha", &["c", "/docs#top"])).await;
        serve(&server, "/docs/b", html("Beta", &["/docs/a"])).await;
        serve(&server, "/docs/c", html("Gamma", &[])).await;
        serve(&server, "/docs/private", html("Private", &[])).await;
        serve(&server, "/other/x", html("Other", &[])).await;
        server
    }

    fn request(server: &MockServer, max_pages: usize, depth_limit: Option<u32>) -> CrawlRequest {
        CrawlRequest {
            start_url: Url::parse(&format!("{}/docs/", server.uri())).unwrap(),
            max_pages,
            allowed_prefixes: vec!["/docs".into()],
            rules: RuleSet::new(["/docs"], ["/docs/private*"]),
            depth_limit,
            keep_query_params: Vec::new(),
            source: Source::TiktokCommunityGuidelines,
            platforms: BTreeSet::from([Platform::Tiktok]),
        }
    }

    fn fetcher(dir: &std::path::Path) -> PoliteFetcher {
        PoliteFetcher::new(FetchConfig::immediate(dir)).expect("build fetcher")
    }

    fn paths(result: &CrawlResult) -> Vec<String> {
        result
            .pages
            .iter()
            .map(|p| Url::parse(&p.url).unwrap().path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn visits_breadth_first_within_scope() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let result = Crawler::new(&fetcher, request(&server, 10, None)).run().await;

        assert_eq!(paths(&result), ["/docs", "/docs/a", "/docs/b", "/docs/c"]);
        assert_eq!(result.fetched, 4);
        assert!(result.errors.is_empty());

        let index = &result.pages[0];
        assert_eq!(index.title, "Index");
        assert_eq!(index.source, Source::TiktokCommunityGuidelines);
        assert!(index.platforms.contains(&Platform::Tiktok));
        assert_eq!(index.chunks.len(), 1);
        // Out-links are recorded even when they are out of scope.
        assert_eq!(index.out_links.len(), 4);
        assert!(index.out_links.iter().any(|l| l.ends_with("/docs/b")));
    }

    #[tokio::test]
    async fn stops_at_max_pages() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let result = Crawler::new(&fetcher, request(&server, 2, None)).run().await;
        assert_eq!(paths(&result), ["/docs", "/docs/a"]);

        let none = Crawler::new(&fetcher, request(&server, 0, None)).run().await;
        assert!(none.pages.is_empty());
        assert_eq!(none.fetched, 0);
    }

    #[tokio::test]
    async fn depth_limit_stops_enqueueing() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let result = Crawler::new(&fetcher, request(&server, 10, Some(1))).run().await;
        assert_eq!(paths(&result), ["/docs", "/docs/a", "/docs/b"]);
    }

    #[tokio::test]
    async fn robots_rejections_are_recorded_not_errors() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let robots = RobotsTxt::new("User-agent: *\nDisallow: /docs/b\n", "PolicyGraphCrawler");
        let result = Crawler::new(&fetcher, request(&server, 10, None))
            .with_robots(Box::new(robots))
            .run()
            .await;

        assert_eq!(paths(&result), ["/docs", "/docs/a", "/docs/c"]);
        assert_eq!(result.robots_skipped, vec![format!("{}/docs/b", server.uri())]);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn rejected_pages_still_contribute_links() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let result = Crawler::new(&fetcher, request(&server, 10, None))
            .with_classifier(Box::new(KeywordClassifier::new(["gamma", "beta"])))
            .run()
            .await;

        assert_eq!(paths(&result), ["/docs/b", "/docs/c"]);
        assert_eq!(result.rejected, 2);
        assert_eq!(result.fetched, 4);
    }

    #[tokio::test]
    async fn failed_fetch_is_recorded_and_crawl_continues() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html("Index", &["/docs/missing", "/docs/empty", "/docs/ok"])).await;
        serve(&server, "/docs/empty", "   ".to_string()).await;
        serve(&server, "/docs/ok", html("Ok", &[])).await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        let result = Crawler::new(&fetcher, request(&server, 10, None)).run().await;

        assert_eq!(paths(&result), ["/docs", "/docs/ok"]);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].0.ends_with("/docs/missing"));
        assert!(result.errors[0].1.contains("404"));
        assert_eq!(result.errors[1].1, "empty response body");
    }

    #[tokio::test]
    async fn redirect_target_is_not_fetched_twice() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html("Index", &["/docs/old", "/docs/a"])).await;
        Mock::given(method("GET"))
            .and(path("/docs/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs/a"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html("Alpha", &[])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        let result = Crawler::new(&fetcher, request(&server, 10, None)).run().await;

        assert_eq!(paths(&result), ["/docs", "/docs/old"]);
        assert_eq!(result.pages[1].final_url, format!("{}/docs/a", server.uri()));
        assert_eq!(result.fetched, 2);
        assert_eq!(result.duplicates, 0);
    }

    #[tokio::test]
    async fn redirect_to_visited_page_is_dropped() {
        let server = MockServer::start().await;
        serve(&server, "/docs", html("Index", &["/docs/a", "/docs/old"])).await;
        serve(&server, "/docs/a", html("Alpha", &[])).await;
        Mock::given(method("GET"))
            .and(path("/docs/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs/a"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());
        let result = Crawler::new(&fetcher, request(&server, 10, None)).run().await;

        assert_eq!(paths(&result), ["/docs", "/docs/a"]);
        let finals: HashSet<&str> = result.pages.iter().map(|p| p.final_url.as_str()).collect();
        assert_eq!(finals.len(), result.pages.len());
        assert_eq!(result.fetched, 3);
        assert_eq!(result.duplicates, 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn progress_reports_each_accepted_page() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let seen = Mutex::new(Vec::new());
        let progress = |url: &str, count: usize| {
            seen.lock().unwrap().push((url.to_string(), count));
        };
        let result = Crawler::new(&fetcher, request(&server, 2, None))
            .with_progress(&progress)
            .run()
            .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), result.pages.len());
        assert_eq!(seen[1], (result.pages[1].url.clone(), 2));
    }

    #[tokio::test]
    async fn every_page_passes_admission() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let req = request(&server, 3, None);
        let origin = Url::parse(&format!("{}/docs", server.uri())).unwrap();
        let rules = req.rules.clone();
        let result = Crawler::new(&fetcher, req).run().await;

        assert!(result.pages.len() <= 3);
        for page in &result.pages {
            let url = Url::parse(&page.url).unwrap();
            assert!(url.path().starts_with("/docs"));
            assert!(rules.is_allowed(&url, &origin));
        }
    }
}
