//! Test-only mock embedding provider.

use std::sync::{Arc, Mutex};

use crate::error::EmbedError;
use crate::provider::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub embedding: Vec<f32>,
    pub fail: bool,
    /// Drop one vector from each response to simulate a count mismatch.
    pub drop_last: bool,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            embedding: vec![0.0; 128],
            fail: false,
            drop_last: false,
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_embedding(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn short_response() -> Self {
        Self {
            drop_last: true,
            ..Self::default()
        }
    }

    /// Batch sizes observed across all `embed_batch` calls.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.batch_sizes.lock().unwrap().push(texts.len());
        if self.fail {
            return Err(EmbedError::Other("mock embed error".into()));
        }
        let mut vectors = vec![self.embedding.clone(); texts.len()];
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
