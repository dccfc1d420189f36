//! Query-time retrieval: embed the question, rank stored chunks.

use tracing::debug;

use lexibase_providers::EmbeddingClient;
use lexibase_shared::{LexibaseError, Result, RetrievalProfile, RetrievedChunk};
use lexibase_storage::Store;

/// Embeds a query and performs similarity search against the document store.
///
/// The two invocation profiles (exploratory search vs. answer grounding) are
/// configuration passed per call, not separate code paths.
pub struct Retriever<'a> {
    store: &'a Store,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a Store, embedder: &'a dyn EmbeddingClient) -> Self {
        Self { store, embedder }
    }

    /// Retrieve up to `profile.k` passages scoring at least
    /// `profile.min_score` against the query.
    pub async fn retrieve(
        &self,
        query: &str,
        profile: RetrievalProfile,
    ) -> Result<Vec<RetrievedChunk>> {
        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let query_vector = vectors.into_iter().next().ok_or_else(|| {
            LexibaseError::Embedding("provider returned no vector for the query".into())
        })?;

        let hits = self
            .store
            .similarity_search(&query_vector, profile.k, profile.min_score)
            .await?;

        debug!(
            query,
            k = profile.k,
            min_score = profile.min_score,
            hits = hits.len(),
            "retrieval complete"
        );

        Ok(hits)
    }
}
