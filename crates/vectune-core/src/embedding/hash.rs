use std::sync::atomic::Ordering;

use async_trait::async_trait;

use super::{EmbedderStats, EmbeddingProvider};
use crate::error::{Result, TuneError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic embedder for simulated runs and tests.
///
/// The same text always yields the same unit-length vector, across processes
/// and platforms.
#[derive(Debug)]
pub struct HashEmbedder {
    dimension: usize,
    stats: EmbedderStats,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            stats: EmbedderStats::default(),
        }
    }

    pub fn stats(&self) -> &EmbedderStats {
        &self.stats
    }

    fn seed(text: &str) -> u64 {
        text.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut state = Self::seed(text);
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
            })
            .collect();

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            return Err(TuneError::Embedding(
                "embedding dimension must be positive".to_string(),
            ));
        }
        self.stats
            .embeddings_generated
            .fetch_add(1, Ordering::Relaxed);
        Ok(self.generate(text))
    }
}
