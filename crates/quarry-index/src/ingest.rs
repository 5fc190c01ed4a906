//! Document ingestion: hash, dedup, chunk, embed, store.

use std::collections::HashMap;
use std::path::Path;

use quarry_embed::{EmbeddingProvider, EmbeddingService};

use crate::chunker::Chunker;
use crate::error::{IndexError, Result};
use crate::store::{LocalVectorStore, normalize_metadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

const DEFAULT_EXTENSIONS: &[&str] = &[".txt", ".md", ".markdown"];

/// Outcome of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub document_id: String,
    pub chunks_indexed: usize,
    pub duplicate: bool,
}

/// Coordinates the ingest path: extension validation, content hashing,
/// duplicate detection, chunking, embedding, and the store upsert.
pub struct IngestionPipeline<P> {
    chunker: Chunker,
    service: EmbeddingService<P>,
    store: LocalVectorStore,
    supported_extensions: Vec<String>,
    max_file_size: u64,
}

impl<P: EmbeddingProvider> IngestionPipeline<P> {
    #[must_use]
    pub fn new(chunker: Chunker, service: EmbeddingService<P>, store: LocalVectorStore) -> Self {
        Self {
            chunker,
            service,
            store,
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    #[must_use]
    pub fn with_supported_extensions(mut self, extensions: Vec<String>) -> Self {
        self.supported_extensions = extensions;
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Ingest one document from raw bytes.
    ///
    /// Byte-identical content resolves to the same document id; re-ingesting
    /// it reports `duplicate: true` with zero newly indexed chunks and does
    /// not touch the store.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported extension, for non-empty content
    /// that chunks to nothing, or if the store cannot be written.
    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> Result<IngestionResult> {
        let extension = detect_extension(filename);
        if !self.supported_extensions.contains(&extension) {
            return Err(IndexError::UnsupportedFormat(extension));
        }

        let document_id = blake3::hash(bytes).to_hex().to_string();
        if self.store.has_document(&document_id).await? {
            tracing::info!(filename, "duplicate document detected");
            return Ok(IngestionResult {
                document_id,
                chunks_indexed: 0,
                duplicate: true,
            });
        }

        let text = String::from_utf8_lossy(bytes);
        let mut combined = metadata.clone();
        combined.insert(
            "document_id".to_owned(),
            serde_json::Value::String(document_id.clone()),
        );

        let chunk_metadata = normalize_metadata(&combined);
        let chunks = self.chunker.chunk(&text, &chunk_metadata);
        if chunks.is_empty() {
            return Err(IndexError::EmptyDocument);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.service.embed(&texts).await;

        self.store
            .add_document(&document_id, filename, &combined, &chunks, &embeddings)
            .await?;

        tracing::info!(filename, chunks = chunks.len(), "document ingested");
        Ok(IngestionResult {
            document_id,
            chunks_indexed: chunks.len(),
            duplicate: false,
        })
    }

    /// Ingest a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, exceeds the size
    /// ceiling, or fails `ingest_bytes` validation.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestionResult> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > self.max_file_size {
            return Err(IndexError::FileTooLarge(meta.len()));
        }

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.ingest_bytes(&bytes, &filename, &HashMap::new()).await
    }

    /// Ingest a batch of documents independently: a failing document is
    /// logged and skipped, the rest still go through.
    pub async fn ingest_batch(
        &self,
        documents: Vec<(Vec<u8>, String, HashMap<String, serde_json::Value>)>,
    ) -> Vec<IngestionResult> {
        let mut results = Vec::new();
        for (bytes, filename, metadata) in documents {
            match self.ingest_bytes(&bytes, &filename, &metadata).await {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(filename, "failed to ingest: {e}"),
            }
        }
        results
    }

    /// Remove a document and its chunks. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or rewritten.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        self.store.remove_document(document_id).await
    }
}

/// Lowercased extension including the dot, or an empty string.
fn detect_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
