//! End-to-end control loop tests against the simulated storage engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vectune_core::config::{Config, IndexConfig, SimulatedConfig};
use vectune_core::decision::DecisionSource;
use vectune_core::embedding::{EmbeddingProvider, HashEmbedder};
use vectune_core::executor::IndexSpec;
use vectune_core::oracle::{AdvisoryRequest, Advisor, Proposal};
use vectune_core::storage::{PlanShape, SimulatedEngine, StorageEngine};
use vectune_core::{
    Action, ActionOutcome, Analysis, Confidence, CycleOrchestrator, CyclePhase, DecisionEngine,
    IndexType, IssueTag, Result, ScanKind, TuneError,
};

// ── Helpers ─────────────────────────────────────────────────────────────

enum Reply {
    Propose(Action),
    Unavailable,
    Hang,
}

/// Advisor stub that records every call.
struct RecordingAdvisor {
    reply: Reply,
    calls: AtomicUsize,
}

impl RecordingAdvisor {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisor for RecordingAdvisor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn propose_structured(&self, _request: &AdvisoryRequest) -> Result<Proposal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Propose(action) => Ok(Proposal {
                action,
                reasoning: "proposed by stub".to_string(),
                expected_improvement: "10x".to_string(),
            }),
            Reply::Unavailable => Err(TuneError::Oracle("connection refused".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TuneError::Oracle("unreachable".to_string()))
            }
        }
    }
}

struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        384
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(TuneError::Embedding("model not loaded".to_string()))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.controller.settle_interval_ms = 10;
    config
}

fn engine(rows: u64, ms_per_row: f64) -> Arc<SimulatedEngine> {
    Arc::new(
        SimulatedEngine::new(SimulatedConfig {
            row_count: rows,
            seq_scan_ms_per_row: ms_per_row,
            ..Default::default()
        })
        .with_plan_shape(PlanShape::BareScan),
    )
}

fn orchestrator(
    config: &Config,
    engine: Arc<SimulatedEngine>,
    advisor: Option<Arc<RecordingAdvisor>>,
) -> CycleOrchestrator {
    CycleOrchestrator::new(
        config,
        Arc::new(HashEmbedder::new(384)),
        engine,
        advisor.map(|a| a as Arc<dyn Advisor>),
    )
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_slow_sequential_scan_gets_hnsw_index() {
    let storage = engine(40_000, 0.0045);
    let advisor = RecordingAdvisor::new(Reply::Unavailable);
    let orchestrator = orchestrator(&test_config(), storage.clone(), Some(advisor.clone()));

    let result = orchestrator
        .run_cycle("artificial intelligence and machine learning", "wikipedia")
        .await
        .unwrap();

    let before = &result.analysis_before;
    assert!((before.execution_time_ms - 180.0).abs() < 1e-6);
    assert_eq!(before.scan_kind(), ScanKind::Sequential);
    assert_eq!(before.rows_scanned(), 40_000);
    assert!(!before.index_used());
    assert!(before.issues.contains(&IssueTag::SequentialScanLargeDataset));
    assert!(before.issues.contains(&IssueTag::HighExecutionTime));

    // Oracle down: the rule-based fallback decides.
    assert_eq!(advisor.calls(), 1);
    assert_eq!(result.decision.action, Action::CreateHnswIndex);
    assert_eq!(result.decision.index_type(), Some(IndexType::Hnsw));
    assert_eq!(result.decision.source, DecisionSource::Fallback);
    assert_eq!(result.decision.confidence, Confidence::Low);

    assert!(result.action_result.success);
    assert_eq!(result.action_result.outcome, ActionOutcome::Created);
    assert!(result.phases.contains(&CyclePhase::Verifying));

    let after = result.analysis_after.as_ref().unwrap();
    assert!(after.index_used());
    assert_eq!(
        after.scan.index_name.as_deref(),
        Some("idx_embedding_hnsw_wikipedia")
    );

    let improvement = result.improvement_percent.unwrap();
    assert!((improvement - 99.0).abs() < 1e-6);

    let stats = orchestrator.statistics();
    assert_eq!(stats.optimizations_performed, 1);
    assert!((stats.total_improvement_percent - improvement).abs() < 1e-9);
    assert!((stats.average_improvement_percent() - improvement).abs() < 1e-9);
}

#[tokio::test]
async fn test_existing_index_is_not_recreated() {
    let storage = engine(40_000, 0.0045);
    // Present under the scope's name but outside the planner's reach, so the
    // query still looks slow and the controller asks for it again.
    let mut spec =
        IndexSpec::for_scope(IndexType::Hnsw, "wikipedia", &IndexConfig::default()).unwrap();
    spec.table = "archive.documents".to_string();
    storage.create_index(&spec).await.unwrap();
    assert_eq!(storage.creations(), 1);

    let orchestrator = orchestrator(&test_config(), storage.clone(), None);
    let result = orchestrator
        .run_cycle("climate change and global warming", "wikipedia")
        .await
        .unwrap();

    assert_eq!(result.decision.action, Action::CreateHnswIndex);
    assert!(result.action_result.success);
    assert_eq!(result.action_result.outcome, ActionOutcome::AlreadyExists);
    assert!(result.action_result.statement_executed.is_none());
    assert!(result.analysis_after.is_none());
    assert!(result.improvement_percent.is_none());
    assert!(!result.phases.contains(&CyclePhase::Verifying));
    assert_eq!(storage.creations(), 1);

    let stats = orchestrator.statistics();
    assert_eq!(stats.optimizations_performed, 0);
    assert_eq!(stats.total_improvement_percent, 0.0);
    assert_eq!(stats.cycles_completed, 1);
}

#[tokio::test]
async fn test_second_cycle_after_optimization_needs_nothing() {
    let storage = engine(40_000, 0.0045);
    let advisor = RecordingAdvisor::new(Reply::Propose(Action::CreateHnswIndex));
    let orchestrator = orchestrator(&test_config(), storage.clone(), Some(advisor.clone()));

    let first = orchestrator.run_cycle("quantum computing", "default").await.unwrap();
    assert_eq!(first.decision.source, DecisionSource::Oracle);
    assert_eq!(advisor.calls(), 1);

    let second = orchestrator.run_cycle("quantum computing", "default").await.unwrap();
    assert_eq!(second.decision.action, Action::NoAction);
    assert_eq!(second.decision.source, DecisionSource::Gate);
    assert_eq!(second.action_result.outcome, ActionOutcome::NoAction);
    assert_eq!(
        second.phases,
        vec![
            CyclePhase::Idle,
            CyclePhase::Observing,
            CyclePhase::Reasoning,
            CyclePhase::Acting,
            CyclePhase::Done,
        ]
    );
    // Healthy query: the advisor is not consulted again.
    assert_eq!(advisor.calls(), 1);
    assert_eq!(storage.creations(), 1);
}

#[tokio::test]
async fn test_empty_issues_never_reach_the_oracle() {
    let advisor = RecordingAdvisor::new(Reply::Propose(Action::CreateIvfflatIndex));
    let engine = DecisionEngine::new(
        Default::default(),
        Some(advisor.clone() as Arc<dyn Advisor>),
    );

    let mut analysis = Analysis::degraded(450.0, "unused");
    analysis.query_error = None;
    assert!(analysis.issues.is_empty());

    let decision = engine.decide(&analysis).await;
    assert_eq!(decision.action, Action::NoAction);
    assert_eq!(decision.index_type(), None);
    assert_eq!(advisor.calls(), 0);
}

#[tokio::test]
async fn test_fallback_picks_index_by_dataset_size() {
    let advisor = RecordingAdvisor::new(Reply::Unavailable);

    // Both datasets take 150 ms to scan sequentially.
    let small = engine(50_000, 0.003);
    let result = orchestrator(&test_config(), small, Some(advisor.clone()))
        .run_cycle("renewable energy sources", "small")
        .await
        .unwrap();
    assert!((result.analysis_before.execution_time_ms - 150.0).abs() < 1e-6);
    assert_eq!(result.decision.action, Action::CreateHnswIndex);

    let large = engine(200_000, 0.00075);
    let result = orchestrator(&test_config(), large, Some(advisor.clone()))
        .run_cycle("renewable energy sources", "large")
        .await
        .unwrap();
    assert_eq!(result.decision.action, Action::CreateIvfflatIndex);
    assert_eq!(
        result.action_result.index_name.as_deref(),
        Some("idx_embedding_ivfflat_large")
    );
    assert_eq!(advisor.calls(), 2);
}

#[tokio::test]
async fn test_oracle_timeout_falls_back() {
    let mut config = test_config();
    config.decision.oracle_timeout_ms = 50;
    let advisor = RecordingAdvisor::new(Reply::Hang);
    let orchestrator = orchestrator(&config, engine(40_000, 0.0045), Some(advisor.clone()));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_cycle("space exploration and astronomy", "default"),
    )
    .await
    .expect("cycle must not block on the oracle")
    .unwrap();

    assert_eq!(result.decision.source, DecisionSource::Fallback);
    assert_eq!(result.decision.action, Action::CreateHnswIndex);
    assert!(result.action_result.success);
}

#[tokio::test]
async fn test_storage_failure_degrades_observation() {
    let storage = engine(40_000, 0.0045);
    storage.fail_next_explains(1);
    let orchestrator = orchestrator(&test_config(), storage.clone(), None);

    let result = orchestrator.run_cycle("anything", "default").await.unwrap();
    let before = &result.analysis_before;
    assert!(before.is_degraded());
    assert_eq!(before.scan_kind(), ScanKind::Error);
    assert_eq!(before.rows_scanned(), 0);
    assert_eq!(before.execution_time_ms, 100.0);
    assert!(before.issues.contains(&IssueTag::HighLatency));
    assert!(before.issues.contains(&IssueTag::MissingIndex));

    // 100 ms is not above the fallback threshold.
    assert_eq!(result.decision.action, Action::NoAction);
    assert_eq!(result.decision.source, DecisionSource::Fallback);
    assert_eq!(result.phases.last(), Some(&CyclePhase::Done));
    assert_eq!(storage.creations(), 0);
}

#[tokio::test]
async fn test_failed_creation_skips_verification() {
    let storage = engine(40_000, 0.0045);
    storage.fail_creates(true);
    let orchestrator = orchestrator(&test_config(), storage.clone(), None);

    let result = orchestrator.run_cycle("anything", "default").await.unwrap();
    assert!(!result.action_result.success);
    assert_eq!(result.action_result.outcome, ActionOutcome::Failed);
    assert!(result.action_result.error.is_some());
    assert!(result.analysis_after.is_none());
    assert!(result.improvement_percent.is_none());

    let stats = orchestrator.statistics();
    assert_eq!(stats.optimizations_performed, 0);
    assert_eq!(stats.cycles_completed, 1);

    let log = storage.action_log();
    assert_eq!(log.len(), 1);
    assert!(!log[0].success);
}

#[tokio::test]
async fn test_action_log_failure_skips_verification() {
    let storage = engine(40_000, 0.0045);
    storage.fail_logs(true);
    let orchestrator = orchestrator(&test_config(), storage.clone(), None);

    let result = orchestrator.run_cycle("anything", "default").await.unwrap();
    let action = &result.action_result;
    assert!(!action.success);
    assert_eq!(action.outcome, ActionOutcome::Failed);
    assert!(action.error.as_deref().unwrap().contains("action log"));
    assert_eq!(action.index_name.as_deref(), Some("idx_embedding_hnsw_default"));
    assert!(action.statement_executed.is_some());

    assert!(!result.phases.contains(&CyclePhase::Verifying));
    assert!(result.analysis_after.is_none());
    assert!(result.improvement_percent.is_none());

    let stats = orchestrator.statistics();
    assert_eq!(stats.optimizations_performed, 0);
    assert_eq!(stats.cycles_completed, 1);
}

#[tokio::test]
async fn test_optimize_query_proposal_completes_cycle() {
    let advisor = RecordingAdvisor::new(Reply::Propose(Action::OptimizeQuery));
    let storage = engine(40_000, 0.0045);
    let orchestrator = orchestrator(&test_config(), storage.clone(), Some(advisor));

    let result = orchestrator.run_cycle("anything", "default").await.unwrap();
    assert_eq!(result.decision.action, Action::OptimizeQuery);
    assert_eq!(result.decision.index_type(), None);
    assert!(!result.action_result.success);
    assert!(!result.phases.contains(&CyclePhase::Verifying));
    assert_eq!(storage.creations(), 0);
}

#[tokio::test]
async fn test_embedding_failure_aborts_cycle() {
    let storage = engine(40_000, 0.0045);
    let orchestrator = CycleOrchestrator::new(
        &test_config(),
        Arc::new(BrokenEmbedder),
        storage.clone(),
        None,
    );

    let err = orchestrator.run_cycle("anything", "default").await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, TuneError::Embedding(_)));
    assert_eq!(storage.explain_calls(), 0);
    assert_eq!(orchestrator.statistics().cycles_completed, 0);
}

#[tokio::test]
async fn test_every_observation_is_logged() {
    let storage = engine(40_000, 0.0045);
    let orchestrator = orchestrator(&test_config(), storage.clone(), None);
    orchestrator.run_cycle("anything", "default").await.unwrap();

    // Before and after the index build.
    let metrics = storage.metric_log();
    assert_eq!(metrics.len(), 2);
    assert!(!metrics[0].index_used);
    assert!(metrics[1].index_used);
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cycles_on_one_scope_create_once() {
    let storage = engine(40_000, 0.0045);
    storage.delay_create(Duration::from_millis(50));
    let orchestrator = Arc::new(orchestrator(&test_config(), storage.clone(), None));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .run_cycle(&format!("query {}", i), "wikipedia")
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.action_result.success);
        if result.action_result.outcome == ActionOutcome::Created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(storage.creations(), 1);
    let stats = orchestrator.statistics();
    assert_eq!(stats.optimizations_performed, 1);
    assert_eq!(stats.cycles_completed, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cycles_on_different_scopes() {
    let storage = engine(40_000, 0.0045);
    storage.delay_create(Duration::from_millis(200));
    let orchestrator = Arc::new(orchestrator(&test_config(), storage.clone(), None));

    let a = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_cycle("q", "tenant_a").await })
    };
    let b = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_cycle("q", "tenant_b").await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!(a.action_result.outcome, ActionOutcome::Created);
    assert_eq!(b.action_result.outcome, ActionOutcome::Created);
    assert_eq!(
        storage.index_names(),
        vec![
            "idx_embedding_hnsw_tenant_a".to_string(),
            "idx_embedding_hnsw_tenant_b".to_string()
        ]
    );
}
