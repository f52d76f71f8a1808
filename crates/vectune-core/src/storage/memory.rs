use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::{
    ActionRecord, ActionTally, MetricRecord, MetricSummary, QueryDescriptor, RegisteredIndex,
    StorageEngine,
};
use crate::analyzer::{ExplainOutput, PlanNode};
use crate::config::SimulatedConfig;
use crate::error::{Result, TuneError};
use crate::executor::IndexSpec;

/// Shape of the plans the simulated engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanShape {
    /// `Limit -> Sort -> Seq Scan` / `Limit -> Index Scan`, as PostgreSQL plans a top-k query
    #[default]
    TopK,
    /// The scan node alone at the root
    BareScan,
}

#[derive(Debug, Default)]
struct State {
    indexes: BTreeMap<String, IndexSpec>,
    registry: BTreeMap<String, RegisteredIndex>,
    metrics: Vec<MetricRecord>,
    actions: Vec<ActionRecord>,
}

#[derive(Debug, Default)]
struct Faults {
    explain_failures: u32,
    fail_create: bool,
    fail_logs: bool,
    explain_delay: Option<Duration>,
    create_delay: Option<Duration>,
}

/// In-process stand-in for a pgvector table.
///
/// Timing is a deterministic function of the row count and the presence of a
/// matching index, so whole cycles are reproducible.
pub struct SimulatedEngine {
    config: SimulatedConfig,
    shape: PlanShape,
    state: RwLock<State>,
    faults: Mutex<Faults>,
    explain_calls: AtomicU64,
    creations: AtomicU64,
    cancellations: AtomicU64,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            shape: PlanShape::default(),
            state: RwLock::new(State::default()),
            faults: Mutex::new(Faults::default()),
            explain_calls: AtomicU64::new(0),
            creations: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    pub fn with_plan_shape(mut self, shape: PlanShape) -> Self {
        self.shape = shape;
        self
    }

    // -- fault injection -------------------------------------------------

    /// Fail the next `n` `explain_analyze` calls.
    pub fn fail_next_explains(&self, n: u32) {
        self.faults.lock().explain_failures = n;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.faults.lock().fail_create = fail;
    }

    /// Make both log appends fail.
    pub fn fail_logs(&self, fail: bool) {
        self.faults.lock().fail_logs = fail;
    }

    pub fn delay_explain(&self, delay: Duration) {
        self.faults.lock().explain_delay = Some(delay);
    }

    pub fn delay_create(&self, delay: Duration) {
        self.faults.lock().create_delay = Some(delay);
    }

    // -- inspection ------------------------------------------------------

    pub fn index_names(&self) -> Vec<String> {
        self.state.read().indexes.keys().cloned().collect()
    }

    /// Number of indexes actually built.
    pub fn creations(&self) -> u64 {
        self.creations.load(Ordering::SeqCst)
    }

    /// Number of `cancel_running` calls.
    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn explain_calls(&self) -> u64 {
        self.explain_calls.load(Ordering::SeqCst)
    }

    pub fn metric_log(&self) -> Vec<MetricRecord> {
        self.state.read().metrics.clone()
    }

    pub fn action_log(&self) -> Vec<ActionRecord> {
        self.state.read().actions.clone()
    }

    fn plan(&self, query: &QueryDescriptor, index: Option<&str>) -> ExplainOutput {
        let rows_returned = u64::from(query.limit).min(self.config.row_count);

        let (plan, execution_time_ms) = match (index, self.shape) {
            (None, PlanShape::TopK) => (
                PlanNode::new("Limit", rows_returned).with_child(
                    PlanNode::new("Sort", rows_returned)
                        .with_child(PlanNode::new("Seq Scan", self.config.row_count)),
                ),
                self.seq_scan_ms(),
            ),
            (None, PlanShape::BareScan) => (
                PlanNode::new("Seq Scan", self.config.row_count),
                self.seq_scan_ms(),
            ),
            (Some(name), PlanShape::TopK) => (
                PlanNode::new("Limit", rows_returned)
                    .with_child(PlanNode::new("Index Scan", rows_returned).with_index(name)),
                self.config.index_scan_ms,
            ),
            (Some(name), PlanShape::BareScan) => (
                PlanNode::new("Index Scan", rows_returned).with_index(name),
                self.config.index_scan_ms,
            ),
        };

        ExplainOutput {
            plan,
            planning_time_ms: self.config.planning_ms,
            execution_time_ms,
        }
    }

    fn seq_scan_ms(&self) -> f64 {
        self.config.row_count as f64 * self.config.seq_scan_ms_per_row
    }

    fn check_logs(&self) -> Result<()> {
        if self.faults.lock().fail_logs {
            return Err(TuneError::Query("log table unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl StorageEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn explain_analyze(
        &self,
        query: &QueryDescriptor,
        embedding: &[f32],
    ) -> Result<ExplainOutput> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.faults.lock().explain_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut faults = self.faults.lock();
            if faults.explain_failures > 0 {
                faults.explain_failures -= 1;
                return Err(TuneError::Query("connection reset by peer".to_string()));
            }
        }

        if embedding.is_empty() {
            return Err(TuneError::Query("No embedding provided".to_string()));
        }

        let state = self.state.read();
        let index = state
            .indexes
            .values()
            .find(|spec| spec.table == query.table && spec.column == query.column)
            .map(|spec| spec.name.clone());
        drop(state);

        Ok(self.plan(query, index.as_deref()))
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.read().indexes.contains_key(name))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let delay = self.faults.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.lock().fail_create {
            return Err(TuneError::Action(format!(
                "could not create index \"{}\": out of memory",
                spec.name
            )));
        }

        let mut state = self.state.write();
        if state.indexes.contains_key(&spec.name) {
            // IF NOT EXISTS
            return Ok(());
        }
        state.indexes.insert(spec.name.clone(), spec.clone());
        state.registry.insert(
            spec.name.clone(),
            RegisteredIndex {
                index_name: spec.name.clone(),
                table_name: spec.table.clone(),
                index_type: spec.index_type(),
                created_at: Utc::now(),
            },
        );
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel_running(&self) -> Result<()> {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn drop_index(&self, name: &str) -> Result<bool> {
        Ok(self.state.write().indexes.remove(name).is_some())
    }

    async fn append_metric_log(&self, record: &MetricRecord) -> Result<()> {
        self.check_logs()?;
        self.state.write().metrics.push(record.clone());
        Ok(())
    }

    async fn append_action_log(&self, record: &ActionRecord) -> Result<()> {
        self.check_logs()?;
        self.state.write().actions.push(record.clone());
        Ok(())
    }

    async fn registered_indexes(&self) -> Result<Vec<RegisteredIndex>> {
        Ok(self.state.read().registry.values().cloned().collect())
    }

    async fn clear_registry(&self) -> Result<u64> {
        let mut state = self.state.write();
        let removed = state.registry.len() as u64;
        state.registry.clear();
        Ok(removed)
    }

    async fn action_summary(&self) -> Result<Vec<ActionTally>> {
        let state = self.state.read();
        let mut tallies: BTreeMap<&str, ActionTally> = BTreeMap::new();
        for record in &state.actions {
            let tally = tallies
                .entry(record.action.as_str())
                .or_insert_with(|| ActionTally {
                    action_type: record.action.as_str().to_string(),
                    total: 0,
                    successful: 0,
                });
            tally.total += 1;
            if record.success {
                tally.successful += 1;
            }
        }
        Ok(tallies.into_values().collect())
    }

    async fn metric_summary(&self) -> Result<MetricSummary> {
        let state = self.state.read();
        if state.metrics.is_empty() {
            return Ok(MetricSummary::default());
        }
        let times = state.metrics.iter().map(|m| m.execution_time_ms);
        let count = state.metrics.len();
        Ok(MetricSummary {
            query_count: count as u64,
            avg_execution_ms: Some(times.clone().sum::<f64>() / count as f64),
            min_execution_ms: times.clone().reduce(f64::min),
            max_execution_ms: times.reduce(f64::max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ScanKind;
    use crate::config::{Config, IndexConfig};
    use crate::decision::{Action, Confidence, IndexType};
    use crate::storage::ImpactMetrics;

    fn query() -> QueryDescriptor {
        QueryDescriptor::from_config(&Config::default())
    }

    fn hnsw(scope: &str) -> IndexSpec {
        IndexSpec::for_scope(IndexType::Hnsw, scope, &IndexConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_plan_without_index() {
        let engine = SimulatedEngine::default();
        let explain = engine.explain_analyze(&query(), &[0.1, 0.2]).await.unwrap();
        assert_eq!(explain.plan.kind, "Limit");
        assert_eq!(explain.plan.actual_rows, 5);
        assert_eq!(explain.plan.node_count(), 3);
        assert!((explain.execution_time_ms - 180.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_index_plan_after_create() {
        let engine = SimulatedEngine::default();
        engine.create_index(&hnsw("default")).await.unwrap();
        let explain = engine.explain_analyze(&query(), &[0.1]).await.unwrap();
        let scan = &explain.plan.children[0];
        assert_eq!(scan.kind, "Index Scan");
        assert_eq!(scan.index_name.as_deref(), Some("idx_embedding_hnsw_default"));
        assert_eq!(explain.execution_time_ms, 1.8);
    }

    #[tokio::test]
    async fn test_bare_scan_shape() {
        let engine = SimulatedEngine::default().with_plan_shape(PlanShape::BareScan);
        let explain = engine.explain_analyze(&query(), &[0.1]).await.unwrap();
        assert_eq!(explain.plan.kind, "Seq Scan");
        assert_eq!(explain.plan.actual_rows, 40_000);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_registered() {
        let engine = SimulatedEngine::default();
        engine.create_index(&hnsw("default")).await.unwrap();
        engine.create_index(&hnsw("default")).await.unwrap();
        assert_eq!(engine.creations(), 1);
        assert!(engine.index_exists("idx_embedding_hnsw_default").await.unwrap());

        let registry = engine.registered_indexes().await.unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].index_type, IndexType::Hnsw);

        assert_eq!(engine.clear_registry().await.unwrap(), 1);
        assert!(engine.registered_indexes().await.unwrap().is_empty());
        // Clearing the registry leaves the index itself alone.
        assert!(engine.index_exists("idx_embedding_hnsw_default").await.unwrap());

        assert!(engine.drop_index("idx_embedding_hnsw_default").await.unwrap());
        assert!(!engine.drop_index("idx_embedding_hnsw_default").await.unwrap());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let engine = SimulatedEngine::default();
        engine.fail_next_explains(1);
        assert!(engine.explain_analyze(&query(), &[0.1]).await.is_err());
        assert!(engine.explain_analyze(&query(), &[0.1]).await.is_ok());
        assert_eq!(engine.explain_calls(), 2);

        engine.fail_creates(true);
        assert!(matches!(
            engine.create_index(&hnsw("default")).await,
            Err(TuneError::Action(_))
        ));
        assert_eq!(engine.creations(), 0);
    }

    #[tokio::test]
    async fn test_empty_embedding_is_query_error() {
        let engine = SimulatedEngine::default();
        let err = engine.explain_analyze(&query(), &[]).await.unwrap_err();
        assert!(err.is_query_failure());
    }

    #[tokio::test]
    async fn test_logs_and_summaries() {
        let engine = SimulatedEngine::default();
        for (ms, success) in [(180.0, true), (1.8, false), (2.2, true)] {
            engine
                .append_metric_log(&MetricRecord {
                    query_type: "vector_similarity_search".to_string(),
                    execution_time_ms: ms,
                    index_used: ms < 100.0,
                    rows_scanned: 40_000,
                    scan_kind: ScanKind::Unknown,
                    recorded_at: Utc::now(),
                })
                .await
                .unwrap();
            engine
                .append_action_log(&ActionRecord {
                    action: Action::CreateHnswIndex,
                    reasoning: "r".to_string(),
                    statement: None,
                    success,
                    impact: ImpactMetrics {
                        expected_improvement: "10-50x faster".to_string(),
                        confidence: Confidence::Low,
                    },
                    recorded_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let metrics = engine.metric_summary().await.unwrap();
        assert_eq!(metrics.query_count, 3);
        assert_eq!(metrics.min_execution_ms, Some(1.8));
        assert_eq!(metrics.max_execution_ms, Some(180.0));

        let tallies = engine.action_summary().await.unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].total, 3);
        assert_eq!(tallies[0].successful, 2);

        engine.fail_logs(true);
        assert!(engine.action_log().len() == 3);
        assert!(engine
            .append_metric_log(&engine.metric_log()[0])
            .await
            .is_err());
    }
}
