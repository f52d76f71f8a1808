//! Action execution
//!
//! Turns a [`Decision`] into at most one idempotent index creation. Failures
//! never escape: they are folded into the returned [`ActionResult`].

mod locks;
pub mod statement;

pub use locks::ScopeLocks;
pub use statement::{index_name, validate_scope, IndexParams, IndexSpec};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::IndexConfig;
use crate::decision::{Action, Decision, IndexType};
use crate::error::TuneError;
use crate::storage::{bounded, ActionRecord, ImpactMetrics, StorageEngine};

/// What an `act` call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Nothing was requested
    NoAction,
    /// A new index was built
    Created,
    /// The index was already present; nothing was executed
    AlreadyExists,
    Failed,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionOutcome::NoAction => "no_action",
            ActionOutcome::Created => "created",
            ActionOutcome::AlreadyExists => "already_exists",
            ActionOutcome::Failed => "failed",
        })
    }
}

/// Result of one `act` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: Action,
    pub success: bool,
    pub outcome: ActionOutcome,
    pub statement_executed: Option<String>,
    pub index_name: Option<String>,
    pub error: Option<String>,
}

impl ActionResult {
    fn no_action() -> Self {
        Self {
            action: Action::NoAction,
            success: true,
            outcome: ActionOutcome::NoAction,
            statement_executed: None,
            index_name: None,
            error: None,
        }
    }

    fn failed(action: Action, index_name: Option<String>, error: impl fmt::Display) -> Self {
        Self {
            action,
            success: false,
            outcome: ActionOutcome::Failed,
            statement_executed: None,
            index_name,
            error: Some(error.to_string()),
        }
    }

    /// True when a new index was built by this call.
    pub fn created_index(&self) -> bool {
        self.outcome == ActionOutcome::Created
    }
}

/// Applies decisions to the storage engine.
pub struct ActionExecutor {
    storage: Arc<dyn StorageEngine>,
    index: IndexConfig,
    timeout: Duration,
    locks: ScopeLocks,
}

impl ActionExecutor {
    pub fn new(storage: Arc<dyn StorageEngine>, index: IndexConfig, timeout: Duration) -> Self {
        Self {
            storage,
            index,
            timeout,
            locks: ScopeLocks::new(),
        }
    }

    /// Share scope locks with other executors on the same database.
    pub fn with_locks(mut self, locks: ScopeLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &ScopeLocks {
        &self.locks
    }

    pub async fn act(&self, decision: &Decision, scope: &str) -> ActionResult {
        match decision.action {
            Action::NoAction => ActionResult::no_action(),
            Action::CreateHnswIndex => self.create(IndexType::Hnsw, decision, scope).await,
            Action::CreateIvfflatIndex => self.create(IndexType::Ivfflat, decision, scope).await,
            Action::OptimizeQuery => {
                info!(scope, "optimize_query is advisory only, nothing to execute");
                ActionResult::failed(
                    Action::OptimizeQuery,
                    None,
                    "no executable statement for optimize_query",
                )
            }
        }
    }

    async fn create(&self, index_type: IndexType, decision: &Decision, scope: &str) -> ActionResult {
        let action = Action::for_index(index_type);
        let spec = match IndexSpec::for_scope(index_type, scope, &self.index) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(scope, error = %e, "Refusing to build index statement");
                return ActionResult::failed(action, None, e);
            }
        };
        let sql = spec.to_sql();

        let _guard = self.locks.acquire(scope).await;

        match bounded(
            "index_exists",
            self.timeout,
            self.storage.index_exists(&spec.name),
        )
        .await
        {
            Ok(true) => {
                info!(index = %spec.name, "Index already exists, skipping creation");
                return ActionResult {
                    action,
                    success: true,
                    outcome: ActionOutcome::AlreadyExists,
                    statement_executed: None,
                    index_name: Some(spec.name),
                    error: None,
                };
            }
            Ok(false) => {}
            Err(e) => {
                warn!(index = %spec.name, error = %e, "Existence check failed");
                if let Err(log_err) = self.log_action(decision, None, false).await {
                    warn!(action = %action, error = %log_err, "Failed to append action log");
                }
                return ActionResult::failed(action, Some(spec.name), e);
            }
        }

        info!(index = %spec.name, index_type = %index_type, scope, "Creating index");
        let created = match self.build(&spec).await {
            Ok(()) => self.confirm(&spec.name).await,
            Err(e) => Err(e),
        };

        let logged = self
            .log_action(decision, Some(sql.clone()), created.is_ok())
            .await;

        match (created, logged) {
            (Ok(()), Ok(())) => {
                info!(index = %spec.name, "Index created");
                ActionResult {
                    action,
                    success: true,
                    outcome: ActionOutcome::Created,
                    statement_executed: Some(sql),
                    index_name: Some(spec.name),
                    error: None,
                }
            }
            (Ok(()), Err(e)) => {
                warn!(
                    index = %spec.name,
                    error = %e,
                    "Index created but the action log append failed"
                );
                let error = format!("action log: {}", e);
                ActionResult {
                    statement_executed: Some(sql),
                    ..ActionResult::failed(action, Some(spec.name), error)
                }
            }
            (Err(e), logged) => {
                warn!(index = %spec.name, error = %e, kind = e.kind(), "Index creation failed");
                if let Err(log_err) = logged {
                    warn!(action = %action, error = %log_err, "Failed to append action log");
                }
                ActionResult {
                    statement_executed: Some(sql),
                    ..ActionResult::failed(action, Some(spec.name), e)
                }
            }
        }
    }

    /// Run the build under the index build timeout, cancelling it server-side
    /// when the timeout fires.
    async fn build(&self, spec: &IndexSpec) -> Result<(), TuneError> {
        let result = bounded(
            "create_index",
            self.index.build_timeout(),
            self.storage.create_index(spec),
        )
        .await;

        if matches!(result, Err(TuneError::QueryTimeout { .. })) {
            if let Err(e) = bounded("cancel", self.timeout, self.storage.cancel_running()).await {
                warn!(index = %spec.name, error = %e, "Could not cancel index build");
            }
        }
        result
    }

    /// Post-condition: the index must be visible after creation.
    async fn confirm(&self, name: &str) -> Result<(), TuneError> {
        match bounded("index_exists", self.timeout, self.storage.index_exists(name)).await? {
            true => Ok(()),
            false => Err(TuneError::Action(format!(
                "index {} not present after creation",
                name
            ))),
        }
    }

    async fn log_action(
        &self,
        decision: &Decision,
        statement: Option<String>,
        success: bool,
    ) -> Result<(), TuneError> {
        let record = ActionRecord {
            action: decision.action,
            reasoning: decision.reasoning.clone(),
            statement,
            success,
            impact: ImpactMetrics {
                expected_improvement: decision.expected_improvement.clone(),
                confidence: decision.confidence,
            },
            recorded_at: Utc::now(),
        };
        bounded(
            "append_action_log",
            self.timeout,
            self.storage.append_action_log(&record),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Confidence, DecisionSource};
    use crate::storage::SimulatedEngine;

    fn decision(action: Action) -> Decision {
        Decision {
            action,
            reasoning: "Dataset size suitable for HNSW. High performance required.".to_string(),
            expected_improvement: "10-50x faster".to_string(),
            confidence: Confidence::Low,
            source: DecisionSource::Fallback,
        }
    }

    fn executor(engine: Arc<SimulatedEngine>) -> ActionExecutor {
        ActionExecutor::new(engine, IndexConfig::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_no_action() {
        let engine = Arc::new(SimulatedEngine::default());
        let result = executor(engine.clone())
            .act(&decision(Action::NoAction), "default")
            .await;
        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::NoAction);
        assert!(result.statement_executed.is_none());
        assert!(engine.action_log().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_skip() {
        let engine = Arc::new(SimulatedEngine::default());
        let executor = executor(engine.clone());

        let first = executor
            .act(&decision(Action::CreateHnswIndex), "wikipedia")
            .await;
        assert!(first.success);
        assert_eq!(first.outcome, ActionOutcome::Created);
        assert_eq!(first.index_name.as_deref(), Some("idx_embedding_hnsw_wikipedia"));
        assert!(first
            .statement_executed
            .as_deref()
            .unwrap()
            .contains("USING hnsw"));

        let second = executor
            .act(&decision(Action::CreateHnswIndex), "wikipedia")
            .await;
        assert!(second.success);
        assert_eq!(second.outcome, ActionOutcome::AlreadyExists);
        assert!(second.statement_executed.is_none());
        assert!(second.error.is_none());

        assert_eq!(engine.creations(), 1);
        let log = engine.action_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert_eq!(log[0].impact.expected_improvement, "10-50x faster");
    }

    #[tokio::test]
    async fn test_create_failure_is_recorded() {
        let engine = Arc::new(SimulatedEngine::default());
        engine.fail_creates(true);
        let result = executor(engine.clone())
            .act(&decision(Action::CreateIvfflatIndex), "default")
            .await;
        assert!(!result.success);
        assert_eq!(result.outcome, ActionOutcome::Failed);
        assert!(result.error.as_deref().unwrap().contains("out of memory"));
        assert!(result.statement_executed.is_some());

        let log = engine.action_log();
        assert_eq!(log.len(), 1);
        assert!(!log[0].success);
    }

    #[tokio::test]
    async fn test_action_log_failure_fails_the_action() {
        let engine = Arc::new(SimulatedEngine::default());
        engine.fail_logs(true);
        let result = executor(engine.clone())
            .act(&decision(Action::CreateHnswIndex), "default")
            .await;

        assert!(!result.success);
        assert_eq!(result.outcome, ActionOutcome::Failed);
        assert!(!result.created_index());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("log table unavailable"));
        assert_eq!(result.index_name.as_deref(), Some("idx_embedding_hnsw_default"));
        assert!(result
            .statement_executed
            .as_deref()
            .unwrap()
            .contains("USING hnsw"));
        // The build itself went through.
        assert_eq!(engine.creations(), 1);
    }

    #[tokio::test]
    async fn test_invalid_scope_never_reaches_storage() {
        let engine = Arc::new(SimulatedEngine::default());
        let result = executor(engine.clone())
            .act(&decision(Action::CreateHnswIndex), "x; DROP TABLE documents")
            .await;
        assert!(!result.success);
        assert!(result.statement_executed.is_none());
        assert!(result.error.as_deref().unwrap().contains("Invalid scope"));
        assert_eq!(engine.creations(), 0);
    }

    #[tokio::test]
    async fn test_optimize_query_has_no_statement() {
        let engine = Arc::new(SimulatedEngine::default());
        let result = executor(engine)
            .act(&decision(Action::OptimizeQuery), "default")
            .await;
        assert!(!result.success);
        assert!(result.statement_executed.is_none());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("no executable statement"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_timeout_cancels_the_build() {
        let engine = Arc::new(SimulatedEngine::default());
        engine.delay_create(Duration::from_secs(60));
        let index = IndexConfig {
            build_timeout_ms: 100,
            ..IndexConfig::default()
        };
        let executor = ActionExecutor::new(engine.clone(), index, Duration::from_secs(5));
        let result = executor
            .act(&decision(Action::CreateHnswIndex), "default")
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("create_index"));
        assert_eq!(engine.creations(), 0);
        assert_eq!(engine.cancellations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_build_outlives_storage_timeout() {
        let engine = Arc::new(SimulatedEngine::default());
        engine.delay_create(Duration::from_secs(60));
        let executor = ActionExecutor::new(
            engine.clone(),
            IndexConfig::default(),
            Duration::from_millis(100),
        );
        let result = executor
            .act(&decision(Action::CreateHnswIndex), "default")
            .await;
        assert!(result.success);
        assert_eq!(result.outcome, ActionOutcome::Created);
        assert_eq!(engine.creations(), 1);
        assert_eq!(engine.cancellations(), 0);
    }
}
