//! Cycle lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analysis::Analysis;
use crate::decision::Decision;
use crate::executor::ActionResult;

/// States of one observe-reason-act-verify cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Observing,
    Reasoning,
    Acting,
    /// Entered only after a new index was built
    Verifying,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Observing => "observing",
            CyclePhase::Reasoning => "reasoning",
            CyclePhase::Acting => "acting",
            CyclePhase::Verifying => "verifying",
            CyclePhase::Done => "done",
        })
    }
}

/// Everything one completed cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: Uuid,
    pub scope: String,
    pub query_text: String,
    pub started_at: DateTime<Utc>,
    pub analysis_before: Analysis,
    pub decision: Decision,
    pub action_result: ActionResult,
    pub analysis_after: Option<Analysis>,
    pub improvement_percent: Option<f64>,
    pub cycle_duration_seconds: f64,
    /// Phases in the order they were entered
    pub phases: Vec<CyclePhase>,
}

impl CycleResult {
    pub fn verified(&self) -> bool {
        self.phases.contains(&CyclePhase::Verifying)
    }
}

/// Relative latency change, positive when `after` is faster.
///
/// Undefined for a non-positive baseline.
pub fn improvement_percent(before_ms: f64, after_ms: f64) -> Option<f64> {
    if before_ms <= 0.0 || !before_ms.is_finite() || !after_ms.is_finite() {
        return None;
    }
    Some((before_ms - after_ms) / before_ms * 100.0)
}
