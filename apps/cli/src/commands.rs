//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use lexibase_core::pipeline::{self, ProgressReporter};
use lexibase_providers::OpenAiClient;
use lexibase_shared::{AppConfig, SeedDocument, db_path, init_config, load_config, validate_api_key};
use lexibase_storage::Store;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Lexibase — ask grounded questions over government web pages and legislation.
#[derive(Parser)]
#[command(
    name = "lexibase",
    version,
    about = "Crawl government sources into a searchable knowledge base and ask cited questions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Crawl the configured seed URLs and ingest changed pages.
    Ingest {
        /// Cap the number of pages fetched this run.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Override the inter-request delay in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Load a curated seed corpus from a JSON file (no crawling).
    Seed {
        /// Path to a JSON array of seed documents.
        #[arg(long)]
        file: PathBuf,
    },

    /// Raw similarity search: print the ranked passages for a query.
    Search {
        /// Query text.
        query: String,

        /// Number of results (defaults to the search profile's k).
        #[arg(short)]
        k: Option<u32>,
    },

    /// Ask a question and get a cited answer.
    Ask {
        /// The question.
        question: String,
    },

    /// Show document and chunk counts for the knowledge base.
    Stats,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "lexibase=info",
        1 => "lexibase=debug",
        _ => "lexibase=trace",
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
        Command::Ingest {
            max_pages,
            delay_ms,
        } => cmd_ingest(max_pages, delay_ms).await,
        Command::Seed { file } => cmd_seed(&file).await,
        Command::Search { query, k } => cmd_search(&query, k).await,
        Command::Ask { question } => cmd_ask(&question).await,
        Command::Stats => cmd_stats().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Shared construction
// ---------------------------------------------------------------------------

async fn open_store(config: &AppConfig) -> Result<Store> {
    let path = db_path(config)?;
    Ok(Store::open(&path).await?)
}

fn openai_client(config: &AppConfig) -> Result<OpenAiClient> {
    validate_api_key(config)?;
    let key = std::env::var(&config.openai.api_key_env)
        .map_err(|_| eyre!("{} is not set", config.openai.api_key_env))?;
    Ok(OpenAiClient::new(key, config.openai.embed_model.clone())?)
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(max_pages: Option<usize>, delay_ms: Option<u64>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(n) = max_pages {
        config.crawl.max_pages = n;
    }
    if let Some(d) = delay_ms {
        config.crawl.delay_ms = d;
    }

    let store = open_store(&config).await?;
    let client = openai_client(&config)?;

    info!(
        seeds = config.crawl.seeds.len(),
        max_pages = config.crawl.max_pages,
        "starting ingest run"
    );

    let reporter = CliProgress::new();
    let report = pipeline::run_ingest(&config, &store, &client, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Ingest run complete");
    println!("  Fetched:   {}", report.crawl.pages_fetched);
    println!("  Written:   {}", report.ingest.documents_written);
    println!("  Unchanged: {}", report.ingest.documents_unchanged);
    println!("  Skipped:   {}", report.ingest.pages_skipped);
    println!("  Chunks:    {}", report.ingest.chunks_written);
    println!("  Failures:  {}", report.ingest.failures.len());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    for (url, error) in &report.ingest.failures {
        println!("  failed: {url}: {error}");
    }

    Ok(())
}

async fn cmd_seed(file: &Path) -> Result<()> {
    let config = load_config()?;

    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read seed file '{}': {e}", file.display()))?;
    let seeds: Vec<SeedDocument> = serde_json::from_str(&content)
        .map_err(|e| eyre!("invalid seed file '{}': {e}", file.display()))?;

    let store = open_store(&config).await?;
    let client = openai_client(&config)?;

    let reporter = CliProgress::new();
    let report = pipeline::run_seed(&config, &store, &client, &seeds, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Seed corpus loaded");
    println!("  Written:   {}", report.documents_written);
    println!("  Unchanged: {}", report.documents_unchanged);
    println!("  Chunks:    {}", report.chunks_written);
    println!("  Failures:  {}", report.failures.len());
    println!();

    Ok(())
}

async fn cmd_search(query: &str, k: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let client = openai_client(&config)?;

    let mut profile = config.retrieval.search;
    if let Some(k) = k {
        profile.k = k;
    }

    let hits = pipeline::search(&store, &client, query, profile).await?;

    if hits.is_empty() {
        println!("No passages matched.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.text.chars().take(160).collect();
        println!("{:2}. [{:.3}] {}", i + 1, hit.score, hit.title);
        println!("      {}", hit.url);
        println!("      {snippet}");
    }

    Ok(())
}

async fn cmd_ask(question: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let client = openai_client(&config)?;

    let answer = pipeline::ask(&config, &store, &client, &client, question).await?;

    println!();
    println!("  Intent: {}", answer.intent);
    println!();
    println!("{}", answer.answer);
    println!();
    if !answer.sources.is_empty() {
        println!("  Sources:");
        for source in &answer.sources {
            println!("  [{}] {} — {}", source.n, source.title, source.url);
        }
    }
    println!();

    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let documents = store.count_documents().await?;
    let chunks = store.count_chunks().await?;

    println!("  Database:  {}", db_path(&config)?.display());
    println!("  Documents: {documents}");
    println!("  Chunks:    {chunks}");

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered =
        toml::to_string_pretty(&config).map_err(|e| eyre!("config serialization failed: {e}"))?;
    print!("{rendered}");
    Ok(())
}
