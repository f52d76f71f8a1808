//! Issue detection
//!
//! Applies a table of independent threshold rules to a [`ScanSummary`] plus
//! timing, then maps the resulting issue combination to advisory
//! recommendations. Several issues may fire for the same observation.

pub mod issue;
pub mod recommendation;

pub use issue::{IssueSet, IssueTag};
pub use recommendation::{Priority, Recommendation, RecommendationType};

use serde::{Deserialize, Serialize};

use crate::analyzer::{ScanKind, ScanSummary};
use crate::config::DetectionConfig;
use crate::decision::Action;

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub summary: &'a ScanSummary,
    pub execution_time_ms: f64,
    pub rows_returned: u64,
}

/// A threshold rule that inspects one observation and optionally raises an issue.
pub struct Rule {
    /// Human-readable rule name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Condition check.
    pub check: fn(&DetectionInput<'_>, &DetectionConfig) -> Option<IssueTag>,
}

/// Output of [`IssueDetector::detect`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub issues: IssueSet,
    pub recommendations: Vec<Recommendation>,
}

/// Threshold-based issue detector.
pub struct IssueDetector {
    config: DetectionConfig,
    rules: Vec<Rule>,
}

impl Default for IssueDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl IssueDetector {
    /// Create a detector with the default rule set.
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect issues and derive recommendations for one observation.
    pub fn detect(
        &self,
        summary: &ScanSummary,
        execution_time_ms: f64,
        rows_returned: u64,
    ) -> Detection {
        let input = DetectionInput {
            summary,
            execution_time_ms,
            rows_returned,
        };

        let issues: IssueSet = self
            .rules
            .iter()
            .filter_map(|rule| (rule.check)(&input, &self.config))
            .collect();
        let recommendations = recommend(&issues, summary);

        Detection {
            issues,
            recommendations,
        }
    }

    /// Coarse gate used by the orchestrator: `high_latency` above the coarse
    /// latency threshold, `missing_index` whenever no index was used.
    pub fn coarse_issues(&self, execution_time_ms: f64, index_used: bool) -> IssueSet {
        let mut issues = IssueSet::new();
        if execution_time_ms > self.config.coarse_latency_ms {
            issues.insert(IssueTag::HighLatency);
        }
        if !index_used {
            issues.insert(IssueTag::MissingIndex);
        }
        issues
    }

    /// List all registered rules.
    pub fn rules(&self) -> Vec<(&'static str, &'static str)> {
        self.rules.iter().map(|r| (r.name, r.description)).collect()
    }
}

// ---------------------------------------------------------------------------
// Default rules
// ---------------------------------------------------------------------------

fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "sequential_scan",
            description: "Primary sequential scan, split by dataset size",
            check: |input, config| {
                if input.summary.primary_scan_kind != ScanKind::Sequential {
                    return None;
                }
                if input.summary.rows_scanned > config.large_dataset_rows {
                    Some(IssueTag::SequentialScanLargeDataset)
                } else {
                    Some(IssueTag::SequentialScanSmallDataset)
                }
            },
        },
        Rule {
            name: "high_execution_time",
            description: "Execution time above the latency budget",
            check: |input, config| {
                (input.execution_time_ms > config.high_execution_ms)
                    .then_some(IssueTag::HighExecutionTime)
            },
        },
        Rule {
            name: "no_index_available",
            description: "No index used while scanning many rows",
            check: |input, config| {
                (!input.summary.index_used && input.summary.rows_scanned > config.no_index_rows)
                    .then_some(IssueTag::NoIndexAvailable)
            },
        },
        Rule {
            name: "low_selectivity",
            description: "Few rows returned relative to rows scanned",
            check: |input, config| {
                let scanned = input.summary.rows_scanned;
                if scanned == 0 {
                    return None;
                }
                let selectivity = input.rows_returned as f64 / scanned as f64;
                (selectivity < config.low_selectivity_ratio
                    && scanned > config.low_selectivity_min_rows)
                    .then_some(IssueTag::LowSelectivity)
            },
        },
    ]
}

fn recommend(issues: &IssueSet, summary: &ScanSummary) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if issues.contains(&IssueTag::SequentialScanLargeDataset) {
        recommendations.push(Recommendation {
            kind: RecommendationType::CreateIndex,
            priority: Priority::High,
            action: Action::CreateHnswIndex,
            reasoning: format!(
                "Sequential scan detected on {} rows. Vector similarity search requires an index for acceptable performance.",
                summary.rows_scanned
            ),
            expected_improvement: "10-100x faster queries".to_string(),
        });
    }

    if issues.contains(&IssueTag::HighExecutionTime) && !summary.index_used {
        recommendations.push(Recommendation {
            kind: RecommendationType::CreateIndex,
            priority: Priority::High,
            action: Action::CreateHnswIndex,
            reasoning: "High execution time without index usage. HNSW index recommended."
                .to_string(),
            expected_improvement: "40-50x faster queries".to_string(),
        });
    }

    if issues.contains(&IssueTag::NoIndexAvailable) {
        recommendations.push(Recommendation {
            kind: RecommendationType::CreateIndex,
            priority: Priority::Medium,
            action: Action::CreateIvfflatIndex,
            reasoning: "No vector index found. Consider IVFFlat for larger datasets.".to_string(),
            expected_improvement: "20-30x faster queries".to_string(),
        });
    }

    if issues.contains(&IssueTag::LowSelectivity) {
        recommendations.push(Recommendation {
            kind: RecommendationType::OptimizeQuery,
            priority: Priority::Medium,
            action: Action::OptimizeQuery,
            reasoning: "Low selectivity detected. Consider adding WHERE clauses.".to_string(),
            expected_improvement: "Reduced rows scanned".to_string(),
        });
    }

    recommendations
}
