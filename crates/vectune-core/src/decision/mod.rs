//! Optimization decisions
//!
//! A [`Decision`] is produced from exactly one [`Analysis`](crate::Analysis)
//! by the [`DecisionEngine`]: advisory oracle first, deterministic rules when
//! the oracle is absent or fails.

pub mod action;
pub mod engine;

pub use action::{Action, IndexType};
pub use engine::DecisionEngine;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How sure the controller is that acting will help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// Which step of the decision pipeline produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// No issue warranted reasoning
    Gate,
    /// Parsed from the advisory oracle's proposal
    Oracle,
    /// Deterministic rule after the oracle was unavailable
    Fallback,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecisionSource::Gate => "gate",
            DecisionSource::Oracle => "oracle",
            DecisionSource::Fallback => "fallback",
        })
    }
}

/// One optimization decision.
///
/// The index type is derived from the action, so it is present exactly when
/// the action creates an index. It is written out on serialization and
/// ignored when reading back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DecisionRecord")]
pub struct Decision {
    pub action: Action,
    pub reasoning: String,
    pub expected_improvement: String,
    pub confidence: Confidence,
    pub source: DecisionSource,
}

#[derive(Serialize)]
struct DecisionRecord {
    action: Action,
    index_type: Option<IndexType>,
    reasoning: String,
    expected_improvement: String,
    confidence: Confidence,
    source: DecisionSource,
}

impl From<Decision> for DecisionRecord {
    fn from(decision: Decision) -> Self {
        Self {
            index_type: decision.index_type(),
            action: decision.action,
            reasoning: decision.reasoning,
            expected_improvement: decision.expected_improvement,
            confidence: decision.confidence,
            source: decision.source,
        }
    }
}

impl Decision {
    /// A `no_action` decision that skipped reasoning entirely.
    pub fn no_action(reasoning: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            action: Action::NoAction,
            reasoning: reasoning.into(),
            expected_improvement: "None".to_string(),
            confidence,
            source: DecisionSource::Gate,
        }
    }

    pub fn index_type(&self) -> Option<IndexType> {
        self.action.index_type()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} confidence, {}]: {}",
            self.action, self.confidence, self.source, self.reasoning
        )
    }
}
