//! JSON-file-backed vector store with hybrid (semantic + lexical) search.
//!
//! One file per store holds every document with its chunks and embeddings.
//! Mutations rewrite the file through a sibling temp file and an atomic
//! rename, serialized by a single mutex. Reads never take the lock: they see
//! either the pre- or post-mutation snapshot, never a torn file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};

pub struct LocalVectorStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    documents: BTreeMap<String, DocumentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    filename: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    chunk_id: String,
    position: usize,
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    embedding: Vec<f32>,
}

/// One entry of `list_documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub journal: Option<String>,
    /// Best-effort numeric year; non-numeric metadata degrades to `None`.
    pub year: Option<i64>,
    pub chunks: usize,
}

/// One scored chunk returned by `search`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document_id: String,
    pub chunk_id: String,
    pub position: usize,
    pub content: String,
    /// Merged document and chunk metadata; chunk keys win on conflict.
    pub metadata: HashMap<String, String>,
    pub score: f32,
}

/// Metadata filter set applied during search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Inclusive year range; metadata `year` must parse as an integer inside
    /// it. An unparsable year fails the filter.
    pub year_range: Option<(i64, i64)>,
    /// Allowed values per metadata field, matched case-insensitively.
    pub fields: HashMap<String, FilterValue>,
}

#[derive(Debug, Clone)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::One(value) => value.is_empty(),
            Self::Many(values) => values.is_empty(),
        }
    }

    fn matches(&self, target_lower: &str) -> bool {
        match self {
            Self::One(value) => value.to_lowercase() == target_lower,
            Self::Many(values) => values.iter().any(|v| v.to_lowercase() == target_lower),
        }
    }
}

impl LocalVectorStore {
    /// Open a store at `path`, creating parent directories and initializing
    /// a missing file to an empty document mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or initial file cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        if !tokio::fs::try_exists(&store.path).await? {
            store.write_data(&StoreData::default()).await?;
        }
        Ok(store)
    }

    /// Insert or replace a document record. `chunks` and `embeddings` must
    /// be parallel sequences.
    ///
    /// # Errors
    ///
    /// Returns an error on a chunk/embedding length mismatch or if the store
    /// file cannot be read or rewritten.
    pub async fn add_document(
        &self,
        document_id: &str,
        filename: &str,
        document_metadata: &HashMap<String, serde_json::Value>,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::ChunkEmbeddingMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let stored: Vec<StoredChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk {
                chunk_id: chunk.chunk_id.clone(),
                position: chunk.position,
                content: chunk.content.clone(),
                metadata: chunk
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                embedding: embedding.clone(),
            })
            .collect();

        let record = DocumentRecord {
            filename: filename.to_owned(),
            metadata: normalize_metadata(document_metadata).into_iter().collect(),
            chunks: stored,
        };

        let _guard = self.write_lock.lock().await;
        let mut data = self.read_data().await?;
        data.documents.insert(document_id.to_owned(), record);
        self.write_data(&data).await?;
        tracing::debug!(document_id, chunks = chunks.len(), "document stored");
        Ok(())
    }

    /// Remove a document and all its chunks. Returns whether a record
    /// existed; a miss leaves the file untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be read or rewritten.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_data().await?;
        if data.documents.remove(document_id).is_none() {
            return Ok(false);
        }
        self.write_data(&data).await?;
        tracing::debug!(document_id, "document removed");
        Ok(true)
    }

    /// Existence check by document id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be read.
    pub async fn has_document(&self, document_id: &str) -> Result<bool> {
        let data = self.read_data().await?;
        Ok(data.documents.contains_key(document_id))
    }

    /// Summaries for every stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be read.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let data = self.read_data().await?;
        Ok(data
            .documents
            .into_iter()
            .map(|(id, record)| {
                let year = record
                    .metadata
                    .get("year")
                    .and_then(|y| y.trim().parse::<i64>().ok());
                DocumentSummary {
                    id,
                    title: record.metadata.get("title").cloned(),
                    authors: record.metadata.get("authors").cloned(),
                    journal: record.metadata.get("journal").cloned(),
                    year,
                    chunks: record.chunks.len(),
                }
            })
            .collect())
    }

    /// Scan every chunk of every document passing the filters and score it
    /// with `hybrid_weight * cosine + (1 - hybrid_weight) * lexical overlap`.
    /// Results come back sorted by score descending, truncated to `top_k`.
    ///
    /// Incomparable embeddings (empty, mismatched length, zero magnitude)
    /// contribute a vector score of 0 rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be read.
    pub async fn search(
        &self,
        question: &str,
        query_embedding: &[f32],
        filters: Option<&SearchFilters>,
        metadata_filter_fields: &[String],
        hybrid_weight: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut question_terms = tokenize(question);
        if question_terms.is_empty() {
            question_terms.push(question.to_lowercase());
        }
        let term_count = question_terms.len();
        let unique_terms: HashSet<&str> = question_terms.iter().map(String::as_str).collect();

        let data = self.read_data().await?;
        let mut results = Vec::new();

        for (document_id, record) in &data.documents {
            if !passes_filters(&record.metadata, filters, metadata_filter_fields) {
                continue;
            }

            for chunk in &record.chunks {
                let mut merged = record.metadata.clone();
                merged.extend(chunk.metadata.clone());
                if !passes_filters(&merged, filters, metadata_filter_fields) {
                    continue;
                }

                let chunk_terms: HashSet<String> = tokenize(&chunk.content).into_iter().collect();
                #[allow(clippy::cast_precision_loss)]
                let lexical_overlap = if chunk_terms.is_empty() {
                    0.0
                } else {
                    let overlap = unique_terms
                        .iter()
                        .filter(|term| chunk_terms.contains(**term))
                        .count();
                    overlap as f32 / term_count as f32
                };

                let vector_score = cosine_similarity(query_embedding, &chunk.embedding);
                let score =
                    hybrid_weight * vector_score + (1.0 - hybrid_weight) * lexical_overlap;

                results.push(SearchHit {
                    document_id: document_id.clone(),
                    chunk_id: chunk.chunk_id.clone(),
                    position: chunk.position,
                    content: chunk.content.clone(),
                    metadata: merged.into_iter().collect(),
                    score,
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn read_data(&self) -> Result<StoreData> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temp file, then rename over the original so
    /// concurrent readers never observe a partial write.
    async fn write_data(&self, data: &StoreData) -> Result<()> {
        let bytes = serde_json::to_vec(data)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Normalize loose metadata values into plain strings: nulls are dropped,
/// arrays join their non-null items with `"; "`, strings stay verbatim, and
/// everything else is stringified.
#[must_use]
pub fn normalize_metadata(
    metadata: &HashMap<String, serde_json::Value>,
) -> HashMap<String, String> {
    let mut normalized = HashMap::new();
    for (key, value) in metadata {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(stringify)
                    .collect::<Vec<_>>()
                    .join("; ");
                normalized.insert(key.clone(), joined);
            }
            other => {
                normalized.insert(key.clone(), stringify(other));
            }
        }
    }
    normalized
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn passes_filters(
    metadata: &BTreeMap<String, String>,
    filters: Option<&SearchFilters>,
    metadata_filter_fields: &[String],
) -> bool {
    let Some(filters) = filters else {
        return true;
    };

    if let Some((start, end)) = filters.year_range {
        let Some(year) = metadata
            .get("year")
            .and_then(|y| y.trim().parse::<i64>().ok())
        else {
            return false;
        };
        if year < start || year > end {
            return false;
        }
    }

    for field in metadata_filter_fields {
        let Some(allowed) = filters.fields.get(field) else {
            continue;
        };
        if allowed.is_empty() {
            continue;
        }
        let Some(target) = metadata.get(field) else {
            return false;
        };
        if !allowed.matches(&target.to_lowercase()) {
            return false;
        }
    }

    true
}
