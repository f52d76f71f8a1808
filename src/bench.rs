//! Benchmark driver: a fixed list of queries, one cycle each, on one scope.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use vectune_core::orchestrator::ControllerStatistics;
use vectune_core::{CycleOrchestrator, CycleResult, Result, TuneError};

/// Queries run when no query file is given.
pub const BENCHMARK_QUERIES: [&str; 5] = [
    "artificial intelligence and machine learning",
    "climate change and global warming",
    "quantum computing and physics",
    "renewable energy sources",
    "space exploration and astronomy",
];

/// Scope the benchmark tunes by default.
pub const DEFAULT_BENCH_SCOPE: &str = "wikipedia";

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub scope: String,
    pub total_queries: usize,
    pub statistics: ControllerStatistics,
    pub average_improvement_percent: f64,
    pub results: Vec<CycleResult>,
}

impl BenchReport {
    /// Cycles that verified an improvement.
    pub fn improved(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.improvement_percent.is_some())
            .count()
    }
}

/// The built-in queries as owned strings.
pub fn default_queries() -> Vec<String> {
    BENCHMARK_QUERIES.iter().map(|q| q.to_string()).collect()
}

/// Read one query per non-blank line.
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    let queries: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if queries.is_empty() {
        return Err(TuneError::Config(format!(
            "No queries found in {}",
            path.display()
        )));
    }
    Ok(queries)
}

/// Run one cycle per query, pausing between queries.
///
/// Stops at the first cycle that fails outright (embedding failure).
pub async fn run(
    orchestrator: &CycleOrchestrator,
    queries: &[String],
    scope: &str,
    pause: Duration,
) -> Result<BenchReport> {
    let mut results = Vec::with_capacity(queries.len());

    for (i, query) in queries.iter().enumerate() {
        info!(
            query_index = i + 1,
            total = queries.len(),
            query = %query,
            "Benchmark query"
        );
        results.push(orchestrator.run_cycle(query, scope).await?);

        if i + 1 < queries.len() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    let statistics = orchestrator.statistics();
    Ok(BenchReport {
        scope: scope.to_string(),
        total_queries: queries.len(),
        statistics,
        average_improvement_percent: statistics.average_improvement_percent(),
        results,
    })
}
