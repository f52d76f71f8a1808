//! Per-observation performance verdict.

use serde::{Deserialize, Serialize};

use crate::analyzer::{ExplainOutput, PlanAnalyzer, ScanKind, ScanSummary};
use crate::detector::{IssueDetector, IssueSet, Recommendation};

/// Everything known about one observation of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub execution_time_ms: f64,
    pub planning_time_ms: f64,
    pub total_time_ms: f64,
    #[serde(flatten)]
    pub scan: ScanSummary,
    pub rows_returned: u64,
    pub issues: IssueSet,
    pub recommendations: Vec<Recommendation>,
    /// Storage failure that forced a degraded observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_error: Option<String>,
}

impl Analysis {
    /// Analyze a decoded EXPLAIN document and run issue detection over it.
    pub fn from_explain(
        explain: &ExplainOutput,
        analyzer: &PlanAnalyzer,
        detector: &IssueDetector,
    ) -> Self {
        let scan = analyzer.analyze(&explain.plan);
        // The root of a top-k query emits the rows handed back to the client.
        let rows_returned = explain.plan.actual_rows;
        let execution_time_ms = explain.execution_time_ms.max(0.0);
        let planning_time_ms = explain.planning_time_ms.max(0.0);
        let detection = detector.detect(&scan, execution_time_ms, rows_returned);

        Self {
            execution_time_ms,
            planning_time_ms,
            total_time_ms: execution_time_ms + planning_time_ms,
            scan,
            rows_returned,
            issues: detection.issues,
            recommendations: detection.recommendations,
            query_error: None,
        }
    }

    /// Sentinel analysis for an observation the storage engine could not
    /// answer. Timing is fabricated so the loop still reasons over it.
    pub fn degraded(execution_time_ms: f64, error: impl Into<String>) -> Self {
        Self {
            execution_time_ms,
            planning_time_ms: 0.0,
            total_time_ms: execution_time_ms,
            scan: ScanSummary {
                primary_scan_kind: ScanKind::Error,
                ..ScanSummary::default()
            },
            rows_returned: 0,
            issues: IssueSet::new(),
            recommendations: Vec::new(),
            query_error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.query_error.is_some()
    }

    pub fn index_used(&self) -> bool {
        self.scan.index_used
    }

    pub fn rows_scanned(&self) -> u64 {
        self.scan.rows_scanned
    }

    pub fn scan_kind(&self) -> ScanKind {
        self.scan.primary_scan_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PlanNode;
    use crate::detector::IssueTag;

    fn explain(plan: PlanNode, execution_ms: f64) -> ExplainOutput {
        ExplainOutput {
            plan,
            planning_time_ms: 0.12,
            execution_time_ms: execution_ms,
        }
    }

    #[test]
    fn test_from_explain_sequential() {
        let plan = PlanNode::new("Seq Scan", 40_000);
        let analysis = Analysis::from_explain(
            &explain(plan, 180.0),
            &PlanAnalyzer::new(),
            &IssueDetector::default(),
        );
        assert_eq!(analysis.scan_kind(), ScanKind::Sequential);
        assert_eq!(analysis.rows_scanned(), 40_000);
        assert!((analysis.total_time_ms - 180.12).abs() < 1e-9);
        assert!(analysis
            .issues
            .contains(&IssueTag::SequentialScanLargeDataset));
        assert!(analysis.issues.contains(&IssueTag::HighExecutionTime));
        assert!(!analysis.is_degraded());
    }

    #[test]
    fn test_rows_returned_from_root() {
        let plan = PlanNode::new("Limit", 5).with_child(
            PlanNode::new("Index Scan", 5).with_index("idx_embedding_hnsw_default"),
        );
        let analysis = Analysis::from_explain(
            &explain(plan, 1.8),
            &PlanAnalyzer::new(),
            &IssueDetector::default(),
        );
        assert_eq!(analysis.rows_returned, 5);
        assert!(analysis.index_used());
        assert!(analysis.issues.is_empty());
    }

    #[test]
    fn test_degraded() {
        let analysis = Analysis::degraded(100.0, "connection reset");
        assert_eq!(analysis.scan_kind(), ScanKind::Error);
        assert_eq!(analysis.rows_scanned(), 0);
        assert!(!analysis.index_used());
        assert_eq!(analysis.execution_time_ms, 100.0);
        assert_eq!(analysis.query_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let analysis = Analysis::degraded(100.0, "boom");
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["primary_scan_kind"], "error");
        assert_eq!(json["rows_scanned"], 0);
        assert_eq!(json["query_error"], "boom");
    }
}
