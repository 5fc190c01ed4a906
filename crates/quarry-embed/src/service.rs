//! Batched embedding generation with silent deterministic fallback.

use crate::fallback::fallback_embedding;
use crate::provider::EmbeddingProvider;

/// How a batch of vectors was obtained. Collapsed to plain vectors at the
/// service boundary; the distinction only feeds logging.
enum BatchOutcome {
    Provider(Vec<Vec<f32>>),
    Fallback(Vec<Vec<f32>>),
}

impl BatchOutcome {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Self::Provider(v) | Self::Fallback(v) => v,
        }
    }
}

/// Embedding front-end used by ingestion and retrieval.
///
/// Requests are grouped into provider batches of `batch_size`. A provider
/// error, a count mismatch, or a vector whose length differs from the
/// configured dimension marks the whole batch malformed; the affected texts
/// get deterministic fallback vectors instead and no error reaches the
/// caller. With no provider configured every text takes the fallback path.
pub struct EmbeddingService<P> {
    provider: Option<P>,
    batch_size: usize,
    dimension: usize,
}

impl<P: EmbeddingProvider> EmbeddingService<P> {
    #[must_use]
    pub fn new(provider: Option<P>, batch_size: usize, dimension: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a collection of texts, one vector per input in order.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await.into_vectors());
        }
        vectors
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vectors = self.embed(&[text.to_owned()]).await;
        vectors.remove(0)
    }

    async fn embed_batch(&self, batch: &[String]) -> BatchOutcome {
        let Some(provider) = &self.provider else {
            return BatchOutcome::Fallback(self.fallback_batch(batch));
        };

        match provider.embed_batch(batch).await {
            Ok(vectors) => {
                if vectors.len() != batch.len() {
                    tracing::warn!(
                        provider = provider.name(),
                        sent = batch.len(),
                        received = vectors.len(),
                        "embedding count mismatch, substituting fallback vectors"
                    );
                    return BatchOutcome::Fallback(self.fallback_batch(batch));
                }
                if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
                    tracing::warn!(
                        provider = provider.name(),
                        expected = self.dimension,
                        received = bad.len(),
                        "unexpected embedding dimension, substituting fallback vectors"
                    );
                    return BatchOutcome::Fallback(self.fallback_batch(batch));
                }
                BatchOutcome::Provider(vectors)
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    "embedding request failed, substituting fallback vectors: {e}"
                );
                BatchOutcome::Fallback(self.fallback_batch(batch))
            }
        }
    }

    fn fallback_batch(&self, batch: &[String]) -> Vec<Vec<f32>> {
        batch
            .iter()
            .map(|text| fallback_embedding(text, self.dimension))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;

    fn offline(dimension: usize) -> EmbeddingService<MockEmbedder> {
        EmbeddingService::new(None, 10, dimension)
    }

    #[tokio::test]
    async fn offline_service_uses_fallback() {
        let service = offline(32);
        let vectors = service.embed(&["alpha".into(), "beta".into()]).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], fallback_embedding("alpha", 32));
        assert_eq!(vectors[1], fallback_embedding("beta", 32));
    }

    #[tokio::test]
    async fn provider_vectors_pass_through() {
        let provider = MockEmbedder::with_embedding(vec![1.0, 0.0, 0.0]);
        let service = EmbeddingService::new(Some(provider), 10, 3);
        let vectors = service.embed(&["text".into()]).await;
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0]]);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_silently() {
        let service = EmbeddingService::new(Some(MockEmbedder::failing()), 10, 16);
        let vectors = service.embed(&["resilient".into()]).await;
        assert_eq!(vectors, vec![fallback_embedding("resilient", 16)]);
    }

    #[tokio::test]
    async fn count_mismatch_falls_back() {
        let mut provider = MockEmbedder::short_response();
        provider.embedding = vec![0.5; 4];
        let service = EmbeddingService::new(Some(provider), 10, 4);
        let vectors = service.embed(&["a".into(), "b".into()]).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], fallback_embedding("a", 4));
    }

    #[tokio::test]
    async fn dimension_mismatch_falls_back() {
        let provider = MockEmbedder::with_embedding(vec![1.0, 2.0]);
        let service = EmbeddingService::new(Some(provider), 10, 128);
        let vectors = service.embed(&["dims".into()]).await;
        assert_eq!(vectors[0].len(), 128);
        assert_eq!(vectors[0], fallback_embedding("dims", 128));
    }

    #[tokio::test]
    async fn texts_grouped_into_batches() {
        let provider = MockEmbedder::with_embedding(vec![0.0; 2]);
        let probe = provider.clone();
        let service = EmbeddingService::new(Some(provider), 2, 2);
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let vectors = service.embed(&texts).await;
        assert_eq!(vectors.len(), 5);
        assert_eq!(probe.batch_sizes(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn fallback_applies_per_text_not_per_batch() {
        let service = offline(8);
        let vectors = service.embed(&["one".into(), "two".into()]).await;
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn embed_one_matches_batch_result() {
        let service = offline(8);
        let single = service.embed_one("solo").await;
        let batch = service.embed(&["solo".into()]).await;
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let service = offline(8);
        assert!(service.embed(&[]).await.is_empty());
    }

    #[test]
    fn zero_batch_size_clamped() {
        let service: EmbeddingService<MockEmbedder> = EmbeddingService::new(None, 0, 8);
        assert_eq!(service.batch_size, 1);
    }
}
