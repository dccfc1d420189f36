//! Polite, scope-limited web crawler.
//!
//! This crate provides:
//! - [`Crawler`] — breadth-first frontier traversal over a fixed seed list,
//!   constrained by a host allow-list, disallow patterns, and path prefixes
//! - [`CrawlReport`] — per-run summary of fetches, skips, and failures

pub mod engine;

pub use engine::{CrawlReport, Crawler};
