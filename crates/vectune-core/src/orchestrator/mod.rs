//! Cycle orchestration
//!
//! One [`CycleOrchestrator`] drives the observe, reason, act and verify phases
//! for a single database and owns the running [`ControllerStatistics`].
//! Cycles may run concurrently; index creation on the same scope is
//! serialized by the executor's scope locks.

pub mod cycle;
mod stats;

pub use cycle::{improvement_percent, CyclePhase, CycleResult};
pub use stats::ControllerStatistics;

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::Analysis;
use crate::analyzer::PlanAnalyzer;
use crate::config::{Config, ControllerConfig};
use crate::decision::{Decision, DecisionEngine};
use crate::detector::IssueDetector;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::executor::{ActionExecutor, ActionResult};
use crate::oracle::Advisor;
use crate::storage::{bounded, MetricRecord, QueryDescriptor, StorageEngine};

/// Runs tuning cycles against one storage engine.
pub struct CycleOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    storage: Arc<dyn StorageEngine>,
    analyzer: PlanAnalyzer,
    detector: IssueDetector,
    engine: DecisionEngine,
    executor: ActionExecutor,
    query: QueryDescriptor,
    controller: ControllerConfig,
    stats: Mutex<ControllerStatistics>,
}

impl CycleOrchestrator {
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        storage: Arc<dyn StorageEngine>,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Self {
        let engine = DecisionEngine::new(config.decision.clone(), advisor)
            .with_vector_dimension(embedder.dimension());
        let executor = ActionExecutor::new(
            Arc::clone(&storage),
            config.index.clone(),
            config.controller.storage_timeout(),
        );

        Self {
            embedder,
            storage,
            analyzer: PlanAnalyzer::new(),
            detector: IssueDetector::new(config.detection.clone()),
            engine,
            executor,
            query: QueryDescriptor::from_config(config),
            controller: config.controller.clone(),
            stats: Mutex::new(ControllerStatistics::default()),
        }
    }

    /// Replace the executor, e.g. to share scope locks between orchestrators.
    pub fn with_executor(mut self, executor: ActionExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    /// Snapshot of the running statistics.
    pub fn statistics(&self) -> ControllerStatistics {
        *self.stats.lock()
    }

    /// Observe the query once. Storage failures produce a degraded analysis.
    pub async fn observe(&self, embedding: &[f32], scope: &str) -> Analysis {
        let explain = bounded(
            "explain_analyze",
            self.controller.storage_timeout(),
            self.storage.explain_analyze(&self.query, embedding),
        )
        .await;

        let mut analysis = match explain {
            Ok(explain) => Analysis::from_explain(&explain, &self.analyzer, &self.detector),
            Err(e) => {
                warn!(scope, error = %e, kind = e.kind(), "Observation failed, using degraded analysis");
                Analysis::degraded(self.controller.degraded_execution_ms, e.to_string())
            }
        };

        let coarse = self
            .detector
            .coarse_issues(analysis.execution_time_ms, analysis.index_used());
        analysis.issues.extend(coarse);

        let record = MetricRecord {
            query_type: self.query.metric_label(),
            execution_time_ms: analysis.execution_time_ms,
            index_used: analysis.index_used(),
            rows_scanned: analysis.rows_scanned(),
            scan_kind: analysis.scan_kind(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = bounded(
            "append_metric_log",
            self.controller.storage_timeout(),
            self.storage.append_metric_log(&record),
        )
        .await
        {
            warn!(error = %e, "Failed to append metric log");
        }

        info!(
            scope,
            execution_ms = analysis.execution_time_ms,
            scan_kind = %analysis.scan_kind(),
            index_used = analysis.index_used(),
            rows_scanned = analysis.rows_scanned(),
            issues = analysis.issues.len(),
            "Observed query"
        );
        analysis
    }

    /// Decide what to do. The decision engine is consulted only when a coarse
    /// latency or missing-index issue is present.
    pub async fn reason(&self, analysis: &Analysis) -> Decision {
        let gated = analysis.issues.iter().any(|issue| issue.is_coarse());
        let decision = if gated {
            self.engine.decide(analysis).await
        } else {
            Decision::no_action(
                "Performance is acceptable",
                self.engine.confidence_for(analysis.execution_time_ms),
            )
        };

        info!(
            action = %decision.action,
            confidence = %decision.confidence,
            source = %decision.source,
            "Decision made"
        );
        decision
    }

    pub async fn act(&self, decision: &Decision, scope: &str) -> ActionResult {
        let result = self.executor.act(decision, scope).await;
        info!(
            scope,
            action = %result.action,
            outcome = %result.outcome,
            success = result.success,
            "Action finished"
        );
        result
    }

    /// Run one full cycle for `query_text` on `scope`.
    ///
    /// Only an embedding failure aborts the cycle.
    pub async fn run_cycle(&self, query_text: &str, scope: &str) -> Result<CycleResult> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut phases = vec![CyclePhase::Idle];

        info!(%cycle_id, scope, "Optimization cycle start");

        phases.push(CyclePhase::Observing);
        let embedding = self.embedder.embed(query_text).await?;
        let analysis_before = self.observe(&embedding, scope).await;

        phases.push(CyclePhase::Reasoning);
        let decision = self.reason(&analysis_before).await;

        phases.push(CyclePhase::Acting);
        let action_result = self.act(&decision, scope).await;

        let mut analysis_after = None;
        let mut improvement = None;
        if action_result.created_index() {
            phases.push(CyclePhase::Verifying);
            tokio::time::sleep(self.controller.settle_interval()).await;
            let after = self.observe(&embedding, scope).await;

            if !analysis_before.is_degraded() && !after.is_degraded() {
                improvement =
                    improvement_percent(analysis_before.execution_time_ms, after.execution_time_ms);
            }
            if let Some(pct) = improvement {
                info!(
                    %cycle_id,
                    before_ms = analysis_before.execution_time_ms,
                    after_ms = after.execution_time_ms,
                    improvement_pct = pct,
                    "Optimization verified"
                );
            }
            analysis_after = Some(after);
        }

        phases.push(CyclePhase::Done);
        self.stats
            .lock()
            .record_cycle(action_result.created_index(), improvement);

        let cycle_duration_seconds = start.elapsed().as_secs_f64();
        info!(%cycle_id, duration_s = cycle_duration_seconds, "Cycle complete");

        Ok(CycleResult {
            cycle_id,
            scope: scope.to_string(),
            query_text: query_text.to_string(),
            started_at,
            analysis_before,
            decision,
            action_result,
            analysis_after,
            improvement_percent: improvement,
            cycle_duration_seconds,
            phases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, DecisionSource};
    use crate::detector::IssueTag;
    use crate::embedding::HashEmbedder;
    use crate::storage::SimulatedEngine;

    fn orchestrator(engine: Arc<SimulatedEngine>) -> CycleOrchestrator {
        let mut config = Config::default();
        config.controller.settle_interval_ms = 0;
        CycleOrchestrator::new(&config, Arc::new(HashEmbedder::new(8)), engine, None)
    }

    #[tokio::test]
    async fn test_observe_adds_coarse_issues_and_logs_metric() {
        let engine = Arc::new(SimulatedEngine::default());
        let orchestrator = orchestrator(engine.clone());
        let analysis = orchestrator.observe(&[0.1; 8], "default").await;

        assert!(analysis.issues.contains(&IssueTag::HighLatency));
        assert!(analysis.issues.contains(&IssueTag::MissingIndex));
        assert!(analysis.issues.contains(&IssueTag::HighExecutionTime));
        assert_eq!(engine.metric_log().len(), 1);
        assert_eq!(engine.metric_log()[0].query_type, "vector_similarity_search");
    }

    #[tokio::test]
    async fn test_observe_degrades_on_query_error() {
        let engine = Arc::new(SimulatedEngine::default());
        engine.fail_next_explains(1);
        let analysis = orchestrator(engine).observe(&[0.1; 8], "default").await;
        assert!(analysis.is_degraded());
        assert_eq!(analysis.execution_time_ms, 100.0);
        assert!(analysis.issues.contains(&IssueTag::MissingIndex));
    }

    #[tokio::test]
    async fn test_reason_short_circuits_without_coarse_issue() {
        let engine = Arc::new(SimulatedEngine::default());
        let orchestrator = orchestrator(engine);
        let mut analysis = Analysis::degraded(5.0, "x");
        analysis.query_error = None;
        analysis.scan.index_used = true;
        analysis.issues.insert(IssueTag::LowSelectivity);

        let decision = orchestrator.reason(&analysis).await;
        assert_eq!(decision.action, Action::NoAction);
        assert_eq!(decision.source, DecisionSource::Gate);
    }

    #[tokio::test]
    async fn test_full_cycle_phases() {
        let engine = Arc::new(SimulatedEngine::default());
        let orchestrator = orchestrator(engine.clone());

        let first = orchestrator.run_cycle("renewable energy sources", "default").await.unwrap();
        assert_eq!(
            first.phases,
            vec![
                CyclePhase::Idle,
                CyclePhase::Observing,
                CyclePhase::Reasoning,
                CyclePhase::Acting,
                CyclePhase::Verifying,
                CyclePhase::Done,
            ]
        );
        assert!(first.verified());
        assert!(first.improvement_percent.unwrap() > 98.0);

        let second = orchestrator.run_cycle("renewable energy sources", "default").await.unwrap();
        assert!(!second.verified());
        assert_eq!(second.decision.action, Action::NoAction);

        let stats = orchestrator.statistics();
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.optimizations_performed, 1);
    }
}
