//! Shared types, error model, and configuration for Lexibase.
//!
//! This crate is the foundation depended on by all other Lexibase crates.
//! It provides:
//! - [`LexibaseError`] — the unified error type
//! - Domain types ([`DocumentRecord`], [`ChunkRecord`], [`Intent`], [`Answer`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkingConfig, CrawlConfig, CrawlSettings, DefaultsConfig, EmbeddingConfig,
    OpenAiConfig, RetrievalConfig, RetrievalProfile, config_dir, config_file_path, db_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{LexibaseError, Result};
pub use types::{
    Answer, CapturedPage, ChunkRecord, DocumentRecord, Intent, RetrievedChunk, SeedDocument,
    SourceCategory, SourceRef,
};
