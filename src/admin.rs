//! Maintenance commands: dropping managed indexes and summarizing the store.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use vectune_core::executor::{index_name, validate_scope};
use vectune_core::storage::{
    bounded, ActionTally, MetricSummary, RegisteredIndex, StorageEngine,
};
use vectune_core::{IndexType, Result};

/// Scopes cleaned when none are named.
pub const DEFAULT_CLEAN_SCOPES: [&str; 2] = ["wikipedia", "default"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub dropped: Vec<String>,
    /// Names that were not present
    pub absent: Vec<String>,
    /// Names whose drop failed, with the error
    pub failed: Vec<(String, String)>,
    pub registry_entries_removed: u64,
}

/// Drop both index kinds for every scope, then empty the registry.
///
/// A failed drop is reported and skipped; every scope is validated up front.
pub async fn clean_indexes(
    storage: &dyn StorageEngine,
    scopes: &[String],
    timeout: Duration,
) -> Result<CleanReport> {
    for scope in scopes {
        validate_scope(scope)?;
    }

    let mut report = CleanReport::default();
    for scope in scopes {
        for index_type in [IndexType::Hnsw, IndexType::Ivfflat] {
            let name = index_name(index_type, scope)?;
            match bounded("drop_index", timeout, storage.drop_index(&name)).await {
                Ok(true) => {
                    info!(index = %name, "Dropped index");
                    report.dropped.push(name);
                }
                Ok(false) => report.absent.push(name),
                Err(e) => {
                    warn!(index = %name, error = %e, "Could not drop index");
                    report.failed.push((name, e.to_string()));
                }
            }
        }
    }

    report.registry_entries_removed =
        bounded("clear_registry", timeout, storage.clear_registry()).await?;
    info!(
        removed = report.registry_entries_removed,
        "Index registry cleaned"
    );
    Ok(report)
}

/// Registry, action log and metric log at a glance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSummary {
    pub indexes: Vec<RegisteredIndex>,
    pub actions: Vec<ActionTally>,
    pub metrics: MetricSummary,
}

pub async fn collect_summary(
    storage: &dyn StorageEngine,
    timeout: Duration,
) -> Result<StoreSummary> {
    Ok(StoreSummary {
        indexes: bounded("registered_indexes", timeout, storage.registered_indexes()).await?,
        actions: bounded("action_summary", timeout, storage.action_summary()).await?,
        metrics: bounded("metric_summary", timeout, storage.metric_summary()).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectune_core::config::IndexConfig;
    use vectune_core::executor::IndexSpec;
    use vectune_core::storage::SimulatedEngine;
    use vectune_core::TuneError;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn scopes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_clean_drops_known_names_and_registry() {
        let engine = SimulatedEngine::default();
        let spec =
            IndexSpec::for_scope(IndexType::Hnsw, "wikipedia", &IndexConfig::default()).unwrap();
        engine.create_index(&spec).await.unwrap();

        let report = clean_indexes(&engine, &scopes(&DEFAULT_CLEAN_SCOPES), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(report.dropped, vec!["idx_embedding_hnsw_wikipedia"]);
        assert_eq!(
            report.absent,
            vec![
                "idx_embedding_ivfflat_wikipedia",
                "idx_embedding_hnsw_default",
                "idx_embedding_ivfflat_default",
            ]
        );
        assert!(report.failed.is_empty());
        assert_eq!(report.registry_entries_removed, 1);
        assert!(engine.index_names().is_empty());
        assert!(engine.registered_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_rejects_invalid_scope_before_dropping() {
        let engine = SimulatedEngine::default();
        let spec =
            IndexSpec::for_scope(IndexType::Hnsw, "default", &IndexConfig::default()).unwrap();
        engine.create_index(&spec).await.unwrap();

        let err = clean_indexes(&engine, &scopes(&["default", "x; DROP"]), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, TuneError::InvalidScope(_)));
        assert_eq!(engine.index_names(), vec!["idx_embedding_hnsw_default"]);
    }

    #[tokio::test]
    async fn test_summary_of_fresh_store() {
        let engine = SimulatedEngine::default();
        let summary = collect_summary(&engine, TIMEOUT).await.unwrap();
        assert!(summary.indexes.is_empty());
        assert!(summary.actions.is_empty());
        assert_eq!(summary.metrics.query_count, 0);
        assert_eq!(summary.metrics.avg_execution_ms, None);
    }
}
