//! Document chunking, local vector storage, and hybrid retrieval.
//!
//! The pipeline: raw text is split into overlapping, paragraph-aware chunks,
//! each chunk is embedded, and chunks are persisted per document in a single
//! JSON file. Queries blend cosine similarity against stored embeddings with
//! lexical term overlap, filtered by document metadata.

pub mod chunker;
pub mod error;
pub mod ingest;
pub mod retriever;
pub mod store;

pub use chunker::{Chunk, Chunker, ChunkerConfig};
pub use error::{IndexError, Result};
pub use ingest::{IngestionPipeline, IngestionResult};
pub use retriever::{RetrievalConfig, RetrievedDocument, Retriever, SearchQuery};
pub use store::{DocumentSummary, FilterValue, LocalVectorStore, SearchFilters, SearchHit};
