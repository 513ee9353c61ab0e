//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use policygraph_core::pipeline::{IngestConfig, IngestReport, ProgressReporter, ingest};
use policygraph_crawler::SourceProfile;
use policygraph_shared::{
    AppConfig, ExportConfig, ExportMode, FetchConfig, Source, init_config, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// policygraph: crawl platform policy documentation into a knowledge graph.
#[derive(Parser)]
#[command(
    name = "policygraph",
    version,
    about = "Crawl public platform-policy documentation into a content-addressed knowledge graph.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.policygraph/policygraph.toml).
    #[arg(long, global = true, env = "POLICYGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl sources and export the graph.
    Ingest(IngestArgs),

    /// List the built-in sources and their crawl settings.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `ingest`; each overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct IngestArgs {
    /// Source to crawl (repeatable): tiktok, youtube, meta, or a full source tag.
    #[arg(short, long = "source")]
    pub sources: Vec<Source>,

    /// Output directory for nodes.jsonl / edges.jsonl.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// HTTP response cache directory.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Accepted pages per source.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Export mode: fresh, merge or append.
    #[arg(short, long)]
    pub mode: Option<ExportMode>,

    /// Maximum characters per chunk.
    #[arg(long)]
    pub max_chunk_chars: Option<usize>,

    /// Characters shared between consecutive chunks.
    #[arg(long)]
    pub overlap_chars: Option<usize>,

    /// Seed URL replacing the built-in one (requires exactly one --source).
    #[arg(long)]
    pub start_url: Option<Url>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "policygraph=info",
        1 => "policygraph=debug",
        _ => "policygraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest(args) => cmd_ingest(cli.config, args).await,
        Command::Sources => cmd_sources(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config),
        },
    }
}

fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(&p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Fold command-line overrides into the file config.
fn build_ingest_config(mut app: AppConfig, args: IngestArgs) -> Result<IngestConfig> {
    if let Some(out) = args.out {
        app.defaults.out_dir = out.to_string_lossy().into_owned();
    }
    if let Some(cache_dir) = args.cache_dir {
        app.defaults.cache_dir = cache_dir.to_string_lossy().into_owned();
    }
    if let Some(max_pages) = args.max_pages {
        app.defaults.max_pages = max_pages;
    }
    if let Some(mode) = args.mode {
        app.defaults.mode = mode;
    }
    if let Some(max) = args.max_chunk_chars {
        app.export.max_chunk_chars = max;
    }
    if let Some(overlap) = args.overlap_chars {
        app.export.overlap_chars = overlap;
    }
    if !args.sources.is_empty() {
        app.defaults.sources = args.sources;
    }
    app.validate()?;

    let mut start_overrides = BTreeMap::new();
    if let Some(start_url) = args.start_url {
        let [source] = app.defaults.sources.as_slice() else {
            return Err(eyre!("--start-url needs exactly one --source"));
        };
        start_overrides.insert(*source, start_url);
    }

    Ok(IngestConfig {
        sources: app.defaults.sources.clone(),
        max_pages: app.defaults.max_pages,
        fetch: FetchConfig::from(&app),
        export: ExportConfig::from(&app),
        start_overrides,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(config_path: Option<PathBuf>, args: IngestArgs) -> Result<()> {
    let app = resolve_config(config_path)?;
    let config = build_ingest_config(app, args)?;

    info!(
        sources = ?config.sources,
        max_pages = config.max_pages,
        out_dir = %config.export.out_dir.display(),
        mode = %config.export.mode,
        "starting ingest"
    );

    let reporter = CliProgress::new();
    let report = ingest(&config, &reporter).await?;

    print_report(&report, &config);
    Ok(())
}

fn print_report(report: &IngestReport, config: &IngestConfig) {
    println!();
    println!("  Ingest complete in {:.1}s", report.elapsed.as_secs_f64());
    for s in &report.sources {
        println!(
            "  {:<30} pages {:>4}  fetched {:>4}  rejected {:>3}  dupes {:>3}  robots {:>3}  errors {:>3}",
            s.source.as_str(),
            s.pages,
            s.fetched,
            s.rejected,
            s.duplicates,
            s.robots_skipped,
            s.errors.len()
        );
    }
    println!();
    println!(
        "  Graph: {} nodes (+{}), {} edges (+{}) in {}",
        report.export.nodes,
        report.export.new_nodes,
        report.export.edges,
        report.export.new_edges,
        config.export.out_dir.display()
    );
    for (kind, count) in report.export.node_types.iter().chain(&report.export.edge_types) {
        println!("    {kind:<24} {count}");
    }
    println!();
}

fn cmd_sources() -> Result<()> {
    for source in Source::ALL {
        print!("{}", describe_source(SourceProfile::builtin(source)));
    }
    Ok(())
}

fn describe_source(profile: &SourceProfile) -> String {
    let rules = profile.rules();
    let platforms: Vec<&str> = profile.platforms.iter().map(|p| p.as_str()).collect();
    let depth = profile
        .depth_limit
        .map_or_else(|| "unlimited".to_string(), |d| d.to_string());
    let lines = [
        profile.source.to_string(),
        format!("  start:      {}", profile.start_url),
        format!("  prefixes:   {}", profile.allowed_prefixes.join(", ")),
        format!("  allow:      {}", rules.allow_prefixes().join(", ")),
        format!("  disallow:   {}", rules.disallow_patterns().join(", ")),
        format!("  depth:      {depth}"),
        format!("  robots.txt: {}", if profile.use_robots { "yes" } else { "no" }),
        format!(
            "  classifier: {}",
            if profile.classifier_keywords.is_empty() { "none" } else { "keywords" }
        ),
        format!("  platforms:  {}", platforms.join(", ")),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, max_pages: usize) {
        self.spinner
            .set_message(format!("Fetched [{current}/{max_pages}] {url}"));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}
