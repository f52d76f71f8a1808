//! Advisory recommendations attached to an analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decision::Action;

/// Category of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    CreateIndex,
    OptimizeQuery,
}

/// Priority level for a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Worth doing once higher-priority items are handled.
    Medium = 2,
    /// Dominates query latency.
    High = 3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::High => write!(f, "HIGH"),
        }
    }
}

/// A single advisory recommendation. Detected issues stay the authoritative
/// signal; these are text for the decision step and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub action: Action,
    pub reasoning: String,
    pub expected_improvement: String,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.priority, self.action, self.expected_improvement, self.reasoning
        )
    }
}
