use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TextOracle;
use crate::config::OracleConfig;
use crate::error::{Result, TuneError};

/// Chat completion client for a local Ollama server.
///
/// The request deadline is enforced by the decision engine, not here.
pub struct OllamaOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, system: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        }
    }
}

#[async_trait]
impl TextOracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url())
            .json(&self.request(system, prompt))
            .send()
            .await
            .map_err(|e| TuneError::Oracle(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TuneError::Oracle(format!(
                "HTTP {}: {}",
                status, error_body
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| TuneError::Oracle(format!("Failed to parse response: {}", e)))?;
        Ok(body.message.content)
    }
}
