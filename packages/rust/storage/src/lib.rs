//! libSQL storage layer for the Lexibase knowledge base.
//!
//! The [`Store`] struct wraps a local libSQL database holding documents and
//! their embedded chunks. Documents are keyed by URL (at most one row per
//! URL); a document's chunk set is only ever replaced wholesale, inside a
//! transaction, so readers never observe a mix of two content versions.

mod migrations;
mod vector;

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use lexibase_shared::{ChunkRecord, DocumentRecord, LexibaseError, Result, RetrievedChunk};

use vector::{cosine_similarity, decode_embedding, encode_embedding};

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LexibaseError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LexibaseError::Store(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Look up a document by URL. Returns `(id, sha256)` when present.
    pub async fn find_document_by_url(&self, url: &str) -> Result<Option<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, sha256 FROM documents WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some((
                row.get::<String>(0)
                    .map_err(|e| LexibaseError::Store(e.to_string()))?,
                row.get::<String>(1)
                    .map_err(|e| LexibaseError::Store(e.to_string()))?,
            ))),
            Ok(None) => Ok(None),
            Err(e) => Err(LexibaseError::Store(e.to_string())),
        }
    }

    /// Insert or update a document, keyed by URL. Returns the stable row id.
    pub async fn upsert_document(&self, doc: &DocumentRecord) -> Result<String> {
        if let Some((id, _)) = self.find_document_by_url(&doc.url).await? {
            self.conn
                .execute(
                    "UPDATE documents SET
                       source = ?1, title = ?2, published_at = ?3,
                       sha256 = ?4, content = ?5, crawled_at = ?6
                     WHERE id = ?7",
                    params![
                        doc.source.as_str(),
                        doc.title.as_str(),
                        doc.published_at.map(|dt| dt.to_rfc3339()),
                        doc.sha256.as_str(),
                        doc.content.as_str(),
                        doc.crawled_at.to_rfc3339(),
                        id.as_str(),
                    ],
                )
                .await
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            return Ok(id);
        }

        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO documents (id, source, url, title, published_at, sha256, content, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    doc.source.as_str(),
                    doc.url.as_str(),
                    doc.title.as_str(),
                    doc.published_at.map(|dt| dt.to_rfc3339()),
                    doc.sha256.as_str(),
                    doc.content.as_str(),
                    doc.crawled_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;
        Ok(id)
    }

    /// Load a full document row by URL.
    pub async fn get_document(&self, url: &str) -> Result<Option<DocumentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, url, title, published_at, sha256, content, crawled_at
                 FROM documents WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(LexibaseError::Store(e.to_string())),
        }
    }

    /// Number of documents in the knowledge base.
    pub async fn count_documents(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM documents").await
    }

    /// Number of chunks in the knowledge base.
    pub async fn count_chunks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chunks").await
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0).max(0) as u64),
            _ => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Chunk operations
    // -----------------------------------------------------------------------

    /// Atomically discard a document's existing chunks and insert the new set.
    pub async fn replace_chunks(&self, doc_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (doc_id, idx, text, token_count, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    doc_id,
                    i64::from(chunk.idx),
                    chunk.text.as_str(),
                    i64::from(chunk.token_count),
                    encode_embedding(&chunk.embedding),
                ],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        tracing::debug!(doc_id, chunks = chunks.len(), "chunk set replaced");
        Ok(())
    }

    /// Chunk texts for a document, in sequence order.
    pub async fn chunk_texts(&self, doc_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT text FROM chunks WHERE doc_id = ?1 ORDER BY idx",
                params![doc_id],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(
                row.get::<String>(0)
                    .map_err(|e| LexibaseError::Store(e.to_string()))?,
            );
        }
        Ok(results)
    }

    /// Rank every stored chunk against `query` by cosine similarity.
    ///
    /// Returns up to `k` rows scoring at least `min_score`, descending by
    /// score with ties broken by `(doc_id, idx)` so results are deterministic.
    pub async fn similarity_search(
        &self,
        query: &[f32],
        k: u32,
        min_score: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.doc_id, c.idx, c.text, c.embedding, d.title, d.url
                 FROM chunks c
                 JOIN documents d ON d.id = c.doc_id
                 ORDER BY c.doc_id, c.idx",
                params![],
            )
            .await
            .map_err(|e| LexibaseError::Store(e.to_string()))?;

        let mut hits: Vec<RetrievedChunk> = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let doc_id: String = row
                .get(0)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            let idx: u32 = row
                .get(1)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            let text: String = row
                .get(2)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            let blob: Vec<u8> = row
                .get(3)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            let title: String = row
                .get(4)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;
            let url: String = row
                .get(5)
                .map_err(|e| LexibaseError::Store(e.to_string()))?;

            let embedding = decode_embedding(&blob)?;
            let Some(score) = cosine_similarity(query, &embedding) else {
                continue;
            };
            if score < min_score {
                continue;
            }

            hits.push(RetrievedChunk {
                doc_id,
                idx,
                text,
                title,
                url,
                score,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
                .then_with(|| a.idx.cmp(&b.idx))
        });
        hits.truncate(k as usize);

        Ok(hits)
    }
}

/// Convert a database row to a [`DocumentRecord`].
fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord> {
    let parse_ts = |s: String| -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LexibaseError::Store(format!("invalid date: {e}")))
    };

    Ok(DocumentRecord {
        source: row
            .get::<String>(0)
            .map_err(|e| LexibaseError::Store(e.to_string()))?
            .parse()?,
        url: row
            .get::<String>(1)
            .map_err(|e| LexibaseError::Store(e.to_string()))?,
        title: row
            .get::<String>(2)
            .map_err(|e| LexibaseError::Store(e.to_string()))?,
        published_at: match row.get::<String>(3) {
            Ok(s) => Some(parse_ts(s)?),
            Err(_) => None,
        },
        sha256: row
            .get::<String>(4)
            .map_err(|e| LexibaseError::Store(e.to_string()))?,
        content: row
            .get::<String>(5)
            .map_err(|e| LexibaseError::Store(e.to_string()))?,
        crawled_at: parse_ts(
            row.get::<String>(6)
                .map_err(|e| LexibaseError::Store(e.to_string()))?,
        )?,
    })
}
