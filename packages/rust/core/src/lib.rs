//! Core pipeline orchestration for Lexibase.
//!
//! This crate ties together crawling, extraction, change detection,
//! embedding, and storage into end-to-end workflows (`run_ingest`, `search`,
//! `ask`).

pub mod compose;
pub mod fingerprint;
pub mod ingest;
pub mod pipeline;
pub mod retrieve;

pub use compose::{Composer, ComposerModels};
pub use fingerprint::{fingerprint, should_update};
pub use ingest::{IngestReport, IngestSettings, Ingestor};
pub use pipeline::{IngestRunReport, ProgressReporter, SilentProgress, ask, run_ingest, run_seed, search};
pub use retrieve::Retriever;
