use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbedderStats, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::{Result, TuneError};

/// Embedding provider backed by a local Ollama server.
pub struct OllamaEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
    stats: EmbedderStats,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            config: config.clone(),
            client,
            stats: EmbedderStats::default(),
        }
    }

    pub fn stats(&self) -> &EmbedderStats {
        &self.stats
    }

    fn url(&self) -> String {
        format!("{}/api/embeddings", self.config.endpoint.trim_end_matches('/'))
    }

    async fn call_api(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TuneError::Embedding(format!(
                        "request timed out after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    TuneError::Embedding(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TuneError::Embedding(format!(
                "HTTP {}: {}",
                status, error_body
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TuneError::Embedding(format!("Failed to parse response: {}", e)))?;

        check_dimension(body.embedding, self.config.dimension)
    }
}

fn check_dimension(embedding: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if embedding.len() != expected {
        return Err(TuneError::Embedding(format!(
            "expected {} dimensions, model returned {}",
            expected,
            embedding.len()
        )));
    }
    Ok(embedding)
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.call_api(text).await {
            Ok(embedding) => {
                self.stats
                    .embeddings_generated
                    .fetch_add(1, Ordering::Relaxed);
                Ok(embedding)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}
