//! Content normalization: boilerplate-free text extraction and
//! token-budgeted chunking.
//!
//! This crate provides:
//! - [`extract`] — strip non-content markup and yield title, main text, and a
//!   best-effort publication timestamp
//! - [`chunk`] — greedy paragraph packing into token-budgeted passages

mod chunk;
mod html;

pub use chunk::{chunk, est_tokens};
pub use html::{Extracted, extract};
