//! Hybrid retrieval orchestration: embed, scan wide, dedup, rerank.

use std::collections::HashMap;

use quarry_embed::{EmbeddingProvider, EmbeddingService};

use crate::error::Result;
use crate::store::{LocalVectorStore, SearchFilters, SearchHit};

/// Retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Semantic vs. lexical blend in `[0, 1]`; 1.0 is purely semantic.
    pub hybrid_weight: f32,
    /// Candidates kept from the store scan before final truncation.
    pub rerank_top_k: usize,
    /// Metadata keys participating in equality filtering.
    pub metadata_filter_fields: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_weight: 0.6,
            rerank_top_k: 10,
            metadata_filter_fields: vec!["year".into(), "journal".into(), "authors".into()],
        }
    }
}

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub question: String,
    pub max_results: usize,
    pub filters: Option<SearchFilters>,
}

/// One ranked result, scoped to a single query.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub chunk_id: String,
    pub score: f32,
    pub content: String,
    /// Merged document and chunk metadata; chunk keys win on conflict.
    pub metadata: HashMap<String, String>,
}

impl From<SearchHit> for RetrievedDocument {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk_id: hit.chunk_id,
            score: hit.score,
            content: hit.content,
            metadata: hit.metadata,
        }
    }
}

/// Query-side orchestrator over the embedding service and the store.
pub struct Retriever<P> {
    service: EmbeddingService<P>,
    store: LocalVectorStore,
    config: RetrievalConfig,
}

impl<P: EmbeddingProvider> Retriever<P> {
    #[must_use]
    pub fn new(
        service: EmbeddingService<P>,
        store: LocalVectorStore,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            service,
            store,
            config,
        }
    }

    /// Retrieve ranked chunks for a query.
    ///
    /// The store scan considers `max(query.max_results, rerank_top_k)`
    /// candidates, deduplicates by chunk id (later occurrences win), re-sorts
    /// by score descending, and truncates to the requested count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn retrieve(&self, query: &SearchQuery) -> Result<Vec<RetrievedDocument>> {
        let vector = self.service.embed_one(&query.question).await;
        let top_k = query.max_results.max(self.config.rerank_top_k);

        let hits = self
            .store
            .search(
                &query.question,
                &vector,
                query.filters.as_ref(),
                &self.config.metadata_filter_fields,
                self.config.hybrid_weight,
                top_k,
            )
            .await?;

        let mut by_chunk: HashMap<String, RetrievedDocument> = HashMap::new();
        for hit in hits {
            by_chunk.insert(hit.chunk_id.clone(), hit.into());
        }

        let mut ranked: Vec<RetrievedDocument> = by_chunk.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(query.max_results);

        tracing::debug!(results = ranked.len(), "retrieval complete");
        Ok(ranked)
    }
}
