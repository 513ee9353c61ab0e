//! End-to-end ingest pipeline: every selected source → crawl → one export.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};
use url::Url;

use policygraph_crawler::{AllowAll, Crawler, PoliteFetcher, RobotsPolicy, SourceProfile, load_robots};
use policygraph_graph::split::validate_split_options;
use policygraph_graph::{ExportCounts, ExportOptions, export};
use policygraph_shared::{ExportConfig, FetchConfig, PageData, PolicyGraphError, Result, Source};

/// Configuration for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Sources to crawl, in order.
    pub sources: Vec<Source>,
    /// Accepted-page cap per source.
    pub max_pages: usize,
    pub fetch: FetchConfig,
    pub export: ExportConfig,
    /// Alternative seed URLs, e.g. a local mirror of a source.
    pub start_overrides: BTreeMap<Source, Url>,
}

/// Crawl outcome for one source.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source: Source,
    pub pages: usize,
    pub fetched: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub robots_skipped: usize,
    /// Fetch failures (URL, error message).
    pub errors: Vec<(String, String)>,
    pub duration: Duration,
}

/// Result of the ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub sources: Vec<SourceSummary>,
    pub export: ExportCounts,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn total_pages(&self) -> usize {
        self.sources.iter().map(|s| s.pages).sum()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for every accepted page.
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _max_pages: usize) {}
    fn done(&self, _report: &IngestReport) {}
}

/// Run the full ingest pipeline.
///
/// 1. Crawl each source with one shared fetcher (one global politeness delay)
/// 2. Export every accepted page in a single graph write
#[instrument(skip_all, fields(sources = config.sources.len(), max_pages = config.max_pages))]
pub async fn ingest(config: &IngestConfig, progress: &dyn ProgressReporter) -> Result<IngestReport> {
    let start = Instant::now();

    if config.sources.is_empty() {
        return Err(PolicyGraphError::validation("no sources selected"));
    }
    // Fail before a long crawl rather than at export time.
    validate_split_options(config.export.max_chunk_chars, config.export.overlap_chars)?;

    let fetcher = PoliteFetcher::new(config.fetch.clone())?;
    let mut pages: Vec<PageData> = Vec::new();
    let mut summaries = Vec::with_capacity(config.sources.len());

    for &source in &config.sources {
        progress.phase(&format!("Crawling {source}"));
        let profile = SourceProfile::builtin(source);
        let request = profile.crawl_request(config.max_pages, config.start_overrides.get(&source).cloned())?;

        let robots: Box<dyn RobotsPolicy> = if profile.use_robots {
            load_robots(fetcher.client(), &request.start_url, fetcher.user_agent()).await
        } else {
            Box::new(AllowAll)
        };

        let on_page = |url: &str, current: usize| progress.page_fetched(url, current, config.max_pages);
        let mut crawler = Crawler::new(&fetcher, request)
            .with_robots(robots)
            .with_progress(&on_page);
        if let Some(classifier) = profile.classifier() {
            crawler = crawler.with_classifier(classifier);
        }
        let result = crawler.run().await;

        if result.pages.is_empty() {
            warn!(%source, errors = result.errors.len(), "source produced no pages");
        }

        summaries.push(SourceSummary {
            source,
            pages: result.pages.len(),
            fetched: result.fetched,
            rejected: result.rejected,
            duplicates: result.duplicates,
            robots_skipped: result.robots_skipped.len(),
            errors: result.errors,
            duration: result.duration,
        });
        pages.extend(result.pages);
    }

    progress.phase("Exporting graph");
    let mut options = ExportOptions::from(&config.export);
    options.retrieved_at = Some(Utc::now());
    let counts = export(&pages, &options)?;

    let report = IngestReport {
        sources: summaries,
        export: counts,
        elapsed: start.elapsed(),
    };

    info!(
        pages = report.total_pages(),
        nodes = report.export.nodes,
        edges = report.export.edges,
        elapsed_ms = report.elapsed.as_millis(),
        "ingest complete"
    );

    progress.done(&report);
    Ok(report)
}
