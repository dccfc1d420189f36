//! SQL migration definitions for the Lexibase database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, chunks",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per ingested source URL
CREATE TABLE IF NOT EXISTS documents (
    id           TEXT PRIMARY KEY,
    source       TEXT NOT NULL,
    url          TEXT NOT NULL UNIQUE,
    title        TEXT NOT NULL,
    published_at TEXT,
    sha256       TEXT NOT NULL,
    content      TEXT NOT NULL,
    crawled_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_sha256 ON documents(sha256);

-- Token-budgeted passages, embedded as little-endian f32 blobs.
-- idx is contiguous from 0 within a document's current chunk set.
CREATE TABLE IF NOT EXISTS chunks (
    doc_id      TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    idx         INTEGER NOT NULL,
    text        TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    embedding   BLOB NOT NULL,
    PRIMARY KEY (doc_id, idx)
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
