//! Core pipeline orchestration for policygraph.
//!
//! This crate ties together crawling and graph export into the end-to-end
//! `ingest` workflow.

pub mod pipeline;

pub use pipeline::{IngestConfig, IngestReport, ProgressReporter, SilentProgress, SourceSummary, ingest};
