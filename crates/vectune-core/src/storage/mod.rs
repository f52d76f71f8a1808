//! Storage engine seam
//!
//! Everything the control loop needs from the vector store: plan
//! introspection, index lifecycle, and the metric/action logs. The
//! [`SimulatedEngine`] is always available; [`PostgresEngine`] sits behind the
//! `postgres` feature.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{PlanShape, SimulatedEngine};
#[cfg(feature = "postgres")]
pub use postgres::PostgresEngine;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::{ExplainOutput, ScanKind};
use crate::config::Config;
use crate::decision::{Action, Confidence, IndexType};
use crate::error::{Result, TuneError};
use crate::executor::IndexSpec;

/// The nearest-neighbour query being tuned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Label used in logs and metric records
    pub name: String,
    pub table: String,
    pub column: String,
    /// `LIMIT` of the top-k query
    pub limit: u32,
}

impl QueryDescriptor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.controller.query_name.clone(),
            table: config.index.table.clone(),
            column: config.index.column.clone(),
            limit: config.controller.result_limit,
        }
    }

    /// `query_type` value written to the metric log.
    pub fn metric_label(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

/// One row of the query metric log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub query_type: String,
    pub execution_time_ms: f64,
    pub index_used: bool,
    pub rows_scanned: u64,
    pub scan_kind: ScanKind,
    pub recorded_at: DateTime<Utc>,
}

/// Expected effect recorded alongside an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    pub expected_improvement: String,
    pub confidence: Confidence,
}

/// One row of the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: Action,
    pub reasoning: String,
    pub statement: Option<String>,
    pub success: bool,
    pub impact: ImpactMetrics,
    pub recorded_at: DateTime<Utc>,
}

/// An index the controller created, as kept in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredIndex {
    pub index_name: String,
    pub table_name: String,
    pub index_type: IndexType,
    pub created_at: DateTime<Utc>,
}

/// Per-action success counts from the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTally {
    pub action_type: String,
    pub total: u64,
    pub successful: u64,
}

impl ActionTally {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }
}

/// Aggregate of the metric log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub query_count: u64,
    pub avg_execution_ms: Option<f64>,
    pub min_execution_ms: Option<f64>,
    pub max_execution_ms: Option<f64>,
}

/// Storage engine used by the control loop.
///
/// Callers bound every call with a timeout; implementations do not need to.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Run the query under `EXPLAIN ANALYZE` for `embedding`.
    async fn explain_analyze(
        &self,
        query: &QueryDescriptor,
        embedding: &[f32],
    ) -> Result<ExplainOutput>;

    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create the index and record it in the registry.
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Ask the server to stop whatever statement is still running, after the
    /// caller gave up waiting on it.
    async fn cancel_running(&self) -> Result<()> {
        Ok(())
    }

    /// Drop an index if present. Returns whether it existed.
    async fn drop_index(&self, name: &str) -> Result<bool>;

    async fn append_metric_log(&self, record: &MetricRecord) -> Result<()>;

    async fn append_action_log(&self, record: &ActionRecord) -> Result<()>;

    async fn registered_indexes(&self) -> Result<Vec<RegisteredIndex>>;

    /// Empty the registry. Returns the number of entries removed.
    async fn clear_registry(&self) -> Result<u64>;

    async fn action_summary(&self) -> Result<Vec<ActionTally>>;

    async fn metric_summary(&self) -> Result<MetricSummary>;
}

/// Run a storage call under a deadline.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TuneError::QueryTimeout {
            operation,
            elapsed: limit,
        }),
    }
}
