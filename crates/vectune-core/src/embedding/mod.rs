//! Embedding Generation
//!
//! Turns query text into the fixed-length vector the storage engine searches
//! with. Failures here are fatal for a cycle.

mod hash;
mod ollama;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::error::Result;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Counters shared by the embedding providers.
#[derive(Debug, Default)]
pub struct EmbedderStats {
    /// Vectors produced
    pub embeddings_generated: AtomicU64,
    /// Failed requests
    pub errors: AtomicU64,
}

impl EmbedderStats {
    pub fn generated(&self) -> u64 {
        self.embeddings_generated.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Build the provider selected in the configuration.
pub fn from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider {
        EmbeddingProviderType::Hash => Arc::new(HashEmbedder::new(config.dimension)),
        EmbeddingProviderType::Ollama => Arc::new(OllamaEmbedder::new(config)),
    }
}
