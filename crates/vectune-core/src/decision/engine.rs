use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Action, Confidence, Decision, DecisionSource};
use crate::analysis::Analysis;
use crate::config::DecisionConfig;
use crate::error::TuneError;
use crate::oracle::{AdvisoryRequest, Advisor};

/// Maps an [`Analysis`] to one [`Decision`].
///
/// The advisor is consulted first under a deadline; any failure falls through
/// to a deterministic rule so a decision is always produced.
pub struct DecisionEngine {
    config: DecisionConfig,
    advisor: Option<Arc<dyn Advisor>>,
    vector_dimension: usize,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig, advisor: Option<Arc<dyn Advisor>>) -> Self {
        Self {
            config,
            advisor,
            vector_dimension: 384,
        }
    }

    /// Dimension quoted to the advisor.
    pub fn with_vector_dimension(mut self, dimension: usize) -> Self {
        self.vector_dimension = dimension;
        self
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    pub async fn decide(&self, analysis: &Analysis) -> Decision {
        let confidence = self.confidence_for(analysis.execution_time_ms);

        if analysis.issues.is_empty() {
            return Decision::no_action("Performance is acceptable", confidence);
        }

        let Some(advisor) = &self.advisor else {
            debug!("No advisor configured, using rule-based decision");
            return self.fallback(analysis);
        };

        let request = AdvisoryRequest::from_analysis(analysis, self.vector_dimension);
        let timeout = self.config.oracle_timeout();
        let outcome = match tokio::time::timeout(timeout, advisor.propose_structured(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(TuneError::OracleTimeout(timeout)),
        };

        match outcome {
            Ok(proposal) => {
                info!(
                    advisor = advisor.name(),
                    action = %proposal.action,
                    confidence = %confidence,
                    "Advisor proposal accepted"
                );
                Decision {
                    action: proposal.action,
                    reasoning: proposal.reasoning,
                    expected_improvement: proposal.expected_improvement,
                    confidence,
                    source: DecisionSource::Oracle,
                }
            }
            Err(e) => {
                warn!(
                    advisor = advisor.name(),
                    error = %e,
                    kind = e.kind(),
                    "Advisor unavailable, falling back to rules"
                );
                self.fallback(analysis)
            }
        }
    }

    /// Confidence from execution time alone.
    pub fn confidence_for(&self, execution_time_ms: f64) -> Confidence {
        if execution_time_ms > self.config.high_confidence_ms {
            Confidence::High
        } else if execution_time_ms > self.config.medium_confidence_ms {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Deterministic rule used when the advisor cannot answer.
    pub fn fallback(&self, analysis: &Analysis) -> Decision {
        let (action, reasoning, expected_improvement) = if analysis.execution_time_ms
            > self.config.fallback_execution_ms
            && !analysis.index_used()
        {
            if analysis.rows_scanned() < self.config.hnsw_max_rows {
                (
                    Action::CreateHnswIndex,
                    "Dataset size suitable for HNSW. High performance required.",
                    "10-50x faster",
                )
            } else {
                (
                    Action::CreateIvfflatIndex,
                    "Large dataset. IVFFlat more memory efficient.",
                    "20-30x faster",
                )
            }
        } else {
            (Action::NoAction, "Fallback rule-based decision", "Unknown")
        };

        Decision {
            action,
            reasoning: reasoning.to_string(),
            expected_improvement: expected_improvement.to_string(),
            confidence: Confidence::Low,
            source: DecisionSource::Fallback,
        }
    }
}
