//! Content fingerprinting for change detection.
//!
//! A document's fingerprint is the SHA-256 digest of its exact normalized
//! text. Re-ingestion compares fingerprints to decide whether any write is
//! needed at all, which is what makes re-crawling previously seen URLs safe.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hex digest of `text`.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Should a document be (re)written? True iff no prior digest exists or the
/// digests differ. Pure: the ingestor owns the write decision.
pub fn should_update(existing: Option<&str>, new_digest: &str) -> bool {
    match existing {
        Some(digest) => digest != new_digest,
        None => true,
    }
}
