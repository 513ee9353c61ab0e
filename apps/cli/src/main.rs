//! policygraph CLI: polite policy-documentation crawler and graph exporter.
//!
//! Crawls the built-in sources and writes `nodes.jsonl` / `edges.jsonl`
//! for downstream retrieval.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}