//! Shared types, error model, and configuration for policygraph.
//!
//! This crate is the foundation depended on by all other policygraph crates.
//! It provides:
//! - [`PolicyGraphError`] — the unified error type
//! - Domain types ([`Source`], [`Platform`], [`PageData`], [`FetchResult`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`ExportConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_USER_AGENT, DefaultsConfig, ExportConfig, ExportMode, ExportSection,
    FetchConfig, FetcherSection, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{PolicyGraphError, Result};
pub use types::{FetchResult, PageChunk, PageData, Platform, Source};
