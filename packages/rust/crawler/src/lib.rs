//! Compliant, stateful web crawling for policy documentation.
//!
//! This crate provides:
//! - [`rules`] and [`robots`]: URL admission (static allow/disallow tables, robots.txt)
//! - [`fetcher`]: polite HTTP fetching with an on-disk conditional cache
//! - [`parser`]: HTML → title, headed sections, outbound links
//! - [`engine`]: the breadth-first crawl controller
//! - [`sources`]: built-in crawl profiles per documentation provider

pub mod cache;
pub mod classifier;
pub mod engine;
pub mod fetcher;
pub mod normalize;
pub mod parser;
pub mod robots;
pub mod rules;
pub mod sources;

pub use cache::{CacheMeta, CachedResponse, ResponseCache};
pub use classifier::{KeywordClassifier, PageClassifier};
pub use engine::{CrawlRequest, CrawlResult, Crawler, ProgressFn};
pub use fetcher::PoliteFetcher;
pub use normalize::UrlNormalizer;
pub use parser::{ParsedPage, parse_html};
pub use robots::{AllowAll, DenyAll, RobotsPolicy, RobotsTxt, load_robots};
pub use rules::RuleSet;
pub use sources::SourceProfile;
