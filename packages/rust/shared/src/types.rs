//! Core domain types for the Lexibase knowledge base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LexibaseError;

// ---------------------------------------------------------------------------
// SourceCategory
// ---------------------------------------------------------------------------

/// Origin-site classification for an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    /// immi.homeaffairs.gov.au — visa and program pages.
    Immi,
    /// www.homeaffairs.gov.au — departmental pages.
    HomeAffairs,
    /// www.legislation.gov.au — acts and regulations.
    Legislation,
}

impl SourceCategory {
    /// Classify a hostname into its source category.
    pub fn from_host(host: &str) -> Self {
        if host.contains("legislation") {
            Self::Legislation
        } else if host.contains("immi") {
            Self::Immi
        } else {
            Self::HomeAffairs
        }
    }

    /// Stable label used in the `documents.source` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immi => "immi",
            Self::HomeAffairs => "homeaffairs",
            Self::Legislation => "legislation",
        }
    }
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceCategory {
    type Err = LexibaseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "immi" => Ok(Self::Immi),
            "homeaffairs" => Ok(Self::HomeAffairs),
            "legislation" => Ok(Self::Legislation),
            other => Err(LexibaseError::validation(format!(
                "unknown source category: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Crawl & ingest records
// ---------------------------------------------------------------------------

/// A raw page capture produced by the crawler, before extraction.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    /// Absolute URL the page was fetched from.
    pub url: String,
    /// Raw response body.
    pub html: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

/// Upsert payload for one document. The store assigns (or reuses) the row id,
/// keyed by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Origin-site classification.
    pub source: SourceCategory,
    /// Canonical source URL — unique per document.
    pub url: String,
    /// Page title (may be empty when the source page has none).
    pub title: String,
    /// Best-effort publication/modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// SHA-256 digest of `content`.
    pub sha256: String,
    /// Normalized text content.
    pub content: String,
    /// When this version was crawled.
    pub crawled_at: DateTime<Utc>,
}

/// One token-budgeted passage of a document, with its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Owning document id.
    pub doc_id: String,
    /// Zero-based position within the document's current chunk set.
    pub idx: u32,
    /// Passage text.
    pub text: String,
    /// Estimated token count (ceil of char count / 4).
    pub token_count: u32,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// A curated corpus entry loaded without crawling (`lexibase seed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    /// Origin-site classification.
    pub source: SourceCategory,
    /// Canonical URL the content describes.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Pre-normalized text content.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Retrieval & answer types
// ---------------------------------------------------------------------------

/// One ranked similarity-search row, annotated with its parent document.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Owning document id.
    pub doc_id: String,
    /// Chunk index within the document.
    pub idx: u32,
    /// Passage text.
    pub text: String,
    /// Parent document title.
    pub title: String,
    /// Parent document URL.
    pub url: String,
    /// Cosine similarity against the query vector, in [-1, 1].
    pub score: f64,
}

/// Closed set of question intents the classifier may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GeneralInfo,
    Eligibility,
    ProcessSteps,
    Definitions,
    Updates,
}

impl Intent {
    /// The label set, as sent to the classifier prompt.
    pub const LABELS: [&'static str; 5] = [
        "general_info",
        "eligibility",
        "process_steps",
        "definitions",
        "updates",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralInfo => "general_info",
            Self::Eligibility => "eligibility",
            Self::ProcessSteps => "process_steps",
            Self::Definitions => "definitions",
            Self::Updates => "updates",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = LexibaseError;

    /// Strict parse: anything outside the closed set is an error, never a
    /// silent default.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "general_info" => Ok(Self::GeneralInfo),
            "eligibility" => Ok(Self::Eligibility),
            "process_steps" => Ok(Self::ProcessSteps),
            "definitions" => Ok(Self::Definitions),
            "updates" => Ok(Self::Updates),
            other => Err(LexibaseError::IntentParse { raw: other.into() }),
        }
    }
}

/// A numbered source backing a composed answer. `n` matches the `[n]`
/// citation markers in the answer text.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub n: usize,
    pub title: String,
    pub url: String,
}

/// The full response to a question: intent, answer text, and the ordered
/// source list the citation markers map into.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub intent: Intent,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}
