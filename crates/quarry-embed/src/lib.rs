//! Embedding provider abstraction and offline fallback generation.

pub mod error;
pub mod fallback;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod service;

pub use error::EmbedError;
pub use fallback::{FALLBACK_DIMENSION, fallback_embedding};
pub use provider::EmbeddingProvider;
pub use service::EmbeddingService;
