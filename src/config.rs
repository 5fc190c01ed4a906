use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/vector_store.json".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_characters: usize,
    pub overlap: usize,
    pub max_tokens: usize,
    pub approx_tokens_per_char: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_characters: 1024,
            overlap: 128,
            max_tokens: 800,
            approx_tokens_per_char: 0.25,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint. Unset means
    /// deterministic offline embeddings.
    pub base_url: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "text-embedding-3-small".into(),
            dimension: 128,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub hybrid_weight: f32,
    pub max_results: usize,
    pub rerank_top_k: usize,
    pub metadata_filter_fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hybrid_weight: 0.6,
            max_results: 25,
            rerank_top_k: 10,
            metadata_filter_fields: vec!["year".into(), "journal".into(), "authors".into()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub supported_file_types: Vec<String>,
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            supported_file_types: vec![".txt".into(), ".md".into(), ".markdown".into()],
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error when a value is outside its documented range.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.search.hybrid_weight) {
            anyhow::bail!(
                "search.hybrid_weight must be within [0, 1], got {}",
                self.search.hybrid_weight
            );
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_STORE_PATH") {
            self.store.path = v;
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
    }
}

/// API key for the embeddings endpoint, sourced from the environment only.
#[must_use]
pub fn api_key() -> Option<String> {
    std::env::var("QUARRY_EMBEDDING_API_KEY").ok()
}
