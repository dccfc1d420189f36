//! Document ingestion: extraction, change detection, chunking, embedding,
//! and storage.
//!
//! Failures are isolated per document. A failed embedding or store write for
//! one URL is logged and counted, and the run moves on to the next page;
//! nothing written for other documents is affected.

use tracing::{debug, info, instrument, warn};
use url::Url;

use lexibase_extract::{chunk, est_tokens, extract};
use lexibase_providers::EmbeddingClient;
use lexibase_shared::{
    AppConfig, CapturedPage, ChunkRecord, DocumentRecord, Result, SeedDocument, SourceCategory,
};
use lexibase_storage::Store;

use crate::fingerprint::{fingerprint, should_update};

// ---------------------------------------------------------------------------
// Settings & report
// ---------------------------------------------------------------------------

/// Tunables for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Target estimated tokens per passage.
    pub token_budget: u32,
    /// Pages with less extracted text than this are skipped.
    pub min_content_chars: usize,
    /// Prefix length used when paragraph splitting yields no passages.
    pub fallback_prefix_chars: usize,
    /// Texts per embedding request.
    pub embed_batch_size: usize,
}

impl From<&AppConfig> for IngestSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            token_budget: config.chunking.token_budget,
            min_content_chars: config.chunking.min_content_chars,
            fallback_prefix_chars: config.chunking.fallback_prefix_chars,
            embed_batch_size: config.embedding.batch_size.max(1),
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    /// Documents written (new or changed content).
    pub documents_written: usize,
    /// Documents skipped because their fingerprint matched the stored one.
    pub documents_unchanged: usize,
    /// Pages skipped as non-substantive (too little extracted text).
    pub pages_skipped: usize,
    /// Chunks written across all documents.
    pub chunks_written: usize,
    /// Per-document failures (URL, error message).
    pub failures: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Drives crawler output through change detection, chunking, embedding, and
/// the document store.
pub struct Ingestor<'a> {
    store: &'a Store,
    embedder: &'a dyn EmbeddingClient,
    settings: IngestSettings,
}

/// Outcome of ingesting one document.
enum IngestOutcome {
    /// Content changed (or was new); this many chunks were written.
    Written(usize),
    /// Fingerprint matched the stored digest; zero writes.
    Unchanged,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a Store,
        embedder: &'a dyn EmbeddingClient,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            settings,
        }
    }

    /// Ingest raw crawl captures.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn ingest_pages(&self, pages: &[CapturedPage]) -> IngestReport {
        let mut report = IngestReport::default();

        for page in pages {
            let extracted = extract(&page.html);

            if extracted.content.chars().count() < self.settings.min_content_chars {
                debug!(url = %page.url, "content too short, skipping page");
                report.pages_skipped += 1;
                continue;
            }

            let host = match Url::parse(&page.url) {
                Ok(parsed) => parsed.host_str().unwrap_or("").to_string(),
                Err(e) => {
                    report.failures.push((page.url.clone(), e.to_string()));
                    continue;
                }
            };

            let record = DocumentRecord {
                source: SourceCategory::from_host(&host),
                url: page.url.clone(),
                title: extracted.title,
                published_at: extracted.published_at,
                sha256: fingerprint(&extracted.content),
                content: extracted.content,
                crawled_at: page.fetched_at,
            };

            self.apply(record, &mut report).await;
        }

        info!(
            written = report.documents_written,
            unchanged = report.documents_unchanged,
            skipped = report.pages_skipped,
            chunks = report.chunks_written,
            failures = report.failures.len(),
            "ingestion run complete"
        );

        report
    }

    /// Ingest curated documents that arrive pre-extracted (no crawl stage).
    #[instrument(skip_all, fields(seeds = seeds.len()))]
    pub async fn ingest_seeds(&self, seeds: &[SeedDocument]) -> IngestReport {
        let mut report = IngestReport::default();

        for seed in seeds {
            let record = DocumentRecord {
                source: seed.source,
                url: seed.url.clone(),
                title: seed.title.clone(),
                published_at: None,
                sha256: fingerprint(&seed.content),
                content: seed.content.clone(),
                crawled_at: chrono::Utc::now(),
            };

            self.apply(record, &mut report).await;
        }

        info!(
            written = report.documents_written,
            unchanged = report.documents_unchanged,
            failures = report.failures.len(),
            "seed load complete"
        );

        report
    }

    /// Ingest one record and fold the outcome into the report.
    async fn apply(&self, record: DocumentRecord, report: &mut IngestReport) {
        let url = record.url.clone();
        match self.ingest_record(record).await {
            Ok(IngestOutcome::Written(chunks)) => {
                info!(url, chunks, "document ingested");
                report.documents_written += 1;
                report.chunks_written += chunks;
            }
            Ok(IngestOutcome::Unchanged) => {
                debug!(url, "content unchanged, no writes");
                report.documents_unchanged += 1;
            }
            Err(e) => {
                warn!(url, error = %e, "document ingestion failed, continuing");
                report.failures.push((url, e.to_string()));
            }
        }
    }

    async fn ingest_record(&self, record: DocumentRecord) -> Result<IngestOutcome> {
        let existing = self.store.find_document_by_url(&record.url).await?;
        let existing_digest = existing.as_ref().map(|(_, sha)| sha.as_str());

        if !should_update(existing_digest, &record.sha256) {
            return Ok(IngestOutcome::Unchanged);
        }

        let mut passages = chunk(&record.content, self.settings.token_budget);
        if passages.is_empty() {
            passages.push(
                record
                    .content
                    .chars()
                    .take(self.settings.fallback_prefix_chars)
                    .collect(),
            );
        }

        // Embed everything before touching the store: a provider failure must
        // leave the previous document version and chunk set fully intact.
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(passages.len());
        for slice in passages.chunks(self.settings.embed_batch_size) {
            let vectors = self.embedder.embed_batch(slice).await?;
            embeddings.extend(vectors);
        }

        let doc_id = self.store.upsert_document(&record).await?;

        let chunks: Vec<ChunkRecord> = passages
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkRecord {
                doc_id: doc_id.clone(),
                idx: i as u32,
                token_count: est_tokens(&text),
                text,
                embedding,
            })
            .collect();

        self.store.replace_chunks(&doc_id, &chunks).await?;

        Ok(IngestOutcome::Written(chunks.len()))
    }
}
