//! Advisory oracle
//!
//! The decision engine only sees the structured [`Advisor`] boundary. Free-text
//! models plug in through [`TextReplyAdvisor`], the one place that renders a
//! prompt and scrapes a reply.

mod ollama;
mod parse;
mod prompt;

pub use ollama::OllamaOracle;
pub use parse::parse_reply;
pub use prompt::{render_prompt, SYSTEM_PROMPT};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::config::OracleConfig;
use crate::decision::Action;
use crate::detector::IssueTag;
use crate::error::Result;

/// Summary of an observation handed to an advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub execution_time_ms: f64,
    pub scan_kind: String,
    pub index_used: bool,
    pub rows_scanned: u64,
    pub rows_returned: u64,
    pub issues: Vec<IssueTag>,
    /// Dimension of the indexed vector column
    pub vector_dimension: usize,
}

impl AdvisoryRequest {
    pub fn from_analysis(analysis: &Analysis, vector_dimension: usize) -> Self {
        Self {
            execution_time_ms: analysis.execution_time_ms,
            scan_kind: analysis.scan_kind().to_string(),
            index_used: analysis.index_used(),
            rows_scanned: analysis.rows_scanned(),
            rows_returned: analysis.rows_returned,
            issues: analysis.issues.iter().copied().collect(),
            vector_dimension,
        }
    }
}

/// An advisor's structured opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub action: Action,
    pub reasoning: String,
    pub expected_improvement: String,
}

/// Structured advisory boundary used by the decision engine.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    /// Propose an action for the observation.
    async fn propose_structured(&self, request: &AdvisoryRequest) -> Result<Proposal>;
}

/// A chat-style model that answers a prompt with free text.
#[async_trait]
pub trait TextOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Adapts a [`TextOracle`] to the structured [`Advisor`] boundary.
pub struct TextReplyAdvisor<O> {
    oracle: O,
}

impl<O: TextOracle> TextReplyAdvisor<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn inner(&self) -> &O {
        &self.oracle
    }
}

#[async_trait]
impl<O: TextOracle> Advisor for TextReplyAdvisor<O> {
    fn name(&self) -> &str {
        self.oracle.name()
    }

    async fn propose_structured(&self, request: &AdvisoryRequest) -> Result<Proposal> {
        let prompt = render_prompt(request);
        let reply = self.oracle.complete(SYSTEM_PROMPT, &prompt).await?;
        tracing::debug!(oracle = self.oracle.name(), reply_len = reply.len(), "Oracle replied");
        parse_reply(&reply)
    }
}

/// Build the advisor selected in the configuration, if any.
pub fn from_config(config: &OracleConfig) -> Option<Arc<dyn Advisor>> {
    if !config.enabled {
        return None;
    }
    Some(Arc::new(TextReplyAdvisor::new(OllamaOracle::new(config))))
}
