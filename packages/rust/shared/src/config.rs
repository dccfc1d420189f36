//! Application configuration for Lexibase.
//!
//! User config lives at `~/.lexibase/lexibase.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LexibaseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lexibase.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lexibase";

// ---------------------------------------------------------------------------
// Config structs (matching lexibase.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Crawl seeds, scope, and politeness.
    #[serde(default)]
    pub crawl: CrawlSettings,

    /// Chunking parameters.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding batching.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval profiles.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// OpenAI settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the knowledge-base database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.lexibase".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Fixed entry URLs every crawl run starts from.
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,

    /// Hostnames the crawler may fetch from.
    #[serde(default = "default_allow_hosts")]
    pub allow_hosts: Vec<String>,

    /// URL prefixes considered in-scope when enqueuing discovered links.
    #[serde(default = "default_path_prefixes")]
    pub path_prefixes: Vec<String>,

    /// Maximum concurrent HTTP requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum pages captured per run.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Delay in ms awaited before each fetch.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
            allow_hosts: default_allow_hosts(),
            path_prefixes: default_path_prefixes(),
            concurrency: default_concurrency(),
            max_pages: default_max_pages(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_seeds() -> Vec<String> {
    [
        "https://immi.homeaffairs.gov.au/visas/getting-a-visa/visa-listing",
        "https://immi.homeaffairs.gov.au/visas/already-have-a-visa/check-visa-details-and-conditions/overview",
        "https://immi.homeaffairs.gov.au/what-we-do/migration-program-planning-levels",
        "https://immi.homeaffairs.gov.au/what-we-do/migration-strategy",
        "https://immi.homeaffairs.gov.au/news-media",
        // Migration Act 1958 and Migration Regulations 1994
        "https://www.legislation.gov.au/C1958A00062/latest",
        "https://www.legislation.gov.au/F1996B03551/latest",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_allow_hosts() -> Vec<String> {
    [
        "immi.homeaffairs.gov.au",
        "www.homeaffairs.gov.au",
        "www.legislation.gov.au",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_path_prefixes() -> Vec<String> {
    [
        "https://immi.homeaffairs.gov.au/visas",
        "https://immi.homeaffairs.gov.au/what-we-do",
        "https://www.legislation.gov.au/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_concurrency() -> u32 {
    4
}
fn default_max_pages() -> usize {
    200
}
fn default_delay_ms() -> u64 {
    300
}

/// `[chunking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target estimated tokens per passage.
    #[serde(default = "default_token_budget")]
    pub token_budget: u32,

    /// Pages with less extracted text than this are skipped as non-substantive.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Prefix length used when paragraph splitting yields no passages.
    #[serde(default = "default_fallback_prefix_chars")]
    pub fallback_prefix_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            min_content_chars: default_min_content_chars(),
            fallback_prefix_chars: default_fallback_prefix_chars(),
        }
    }
}

fn default_token_budget() -> u32 {
    500
}
fn default_min_content_chars() -> usize {
    500
}
fn default_fallback_prefix_chars() -> usize {
    1000
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    16
}

/// One retrieval tuning: how many rows and the minimum similarity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalProfile {
    /// Maximum rows returned.
    pub k: u32,
    /// Minimum similarity score a row must meet.
    pub min_score: f64,
}

/// `[retrieval]` section. Two profiles over one algorithm: a higher-recall
/// one for raw search and a tighter one for answer grounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_profile")]
    pub search: RetrievalProfile,

    #[serde(default = "default_ask_profile")]
    pub ask: RetrievalProfile,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search: default_search_profile(),
            ask: default_ask_profile(),
        }
    }
}

fn default_search_profile() -> RetrievalProfile {
    RetrievalProfile {
        k: 6,
        min_score: 0.2,
    }
}

fn default_ask_profile() -> RetrievalProfile {
    RetrievalProfile {
        k: 8,
        min_score: 0.25,
    }
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Embedding model id.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Model used for intent classification.
    #[serde(default = "default_intent_model")]
    pub intent_model: String,

    /// Model used for answer synthesis.
    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    /// Sampling temperature for answer synthesis.
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            embed_model: default_embed_model(),
            intent_model: default_intent_model(),
            answer_model: default_answer_model(),
            answer_temperature: default_answer_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_embed_model() -> String {
    "text-embedding-3-small".into()
}
fn default_intent_model() -> String {
    "gpt-4o-mini".into()
}
fn default_answer_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_answer_temperature() -> f32 {
    0.2
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Fixed entry URLs.
    pub seeds: Vec<String>,
    /// Hostnames in scope.
    pub allow_hosts: Vec<String>,
    /// URL prefixes eligible for enqueueing.
    pub path_prefixes: Vec<String>,
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Maximum pages captured per run.
    pub max_pages: usize,
    /// Delay in ms before each fetch.
    pub delay_ms: u64,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            seeds: config.crawl.seeds.clone(),
            allow_hosts: config.crawl.allow_hosts.clone(),
            path_prefixes: config.crawl.path_prefixes.clone(),
            concurrency: config.crawl.concurrency,
            max_pages: config.crawl.max_pages,
            delay_ms: config.crawl.delay_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lexibase/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LexibaseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lexibase/lexibase.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LexibaseError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LexibaseError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LexibaseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LexibaseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LexibaseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path under the configured data directory,
/// expanding a leading `~`.
pub fn db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.data_dir;
    let dir = if let Some(rest) = raw.strip_prefix("~") {
        let home = dirs::home_dir()
            .ok_or_else(|| LexibaseError::config("could not determine home directory"))?;
        home.join(rest.trim_start_matches('/'))
    } else {
        PathBuf::from(raw)
    };
    Ok(dir.join("lexibase.db"))
}

/// Check that the OpenAI API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(LexibaseError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}
