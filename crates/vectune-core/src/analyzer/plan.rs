//! Execution plan tree as reported by `EXPLAIN (ANALYZE, FORMAT JSON)`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuneError};

/// One node of an execution plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Operator label, e.g. "Seq Scan", "Index Scan", "Limit".
    #[serde(rename = "Node Type", default)]
    pub kind: String,
    /// Rows produced by this node.
    #[serde(rename = "Actual Rows", default, deserialize_with = "rows_from_number")]
    pub actual_rows: u64,
    /// Index used by this node, if any.
    #[serde(
        rename = "Index Name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub index_name: Option<String>,
    /// Child operators in plan order.
    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(kind: impl Into<String>, actual_rows: u64) -> Self {
        Self {
            kind: kind.into(),
            actual_rows,
            index_name: None,
            children: Vec::new(),
        }
    }

    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }
}

/// PostgreSQL 18 reports fractional averages for looped nodes.
fn rows_from_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let rows = f64::deserialize(deserializer)?;
    Ok(if rows.is_finite() && rows > 0.0 {
        rows.round() as u64
    } else {
        0
    })
}

/// A decoded EXPLAIN ANALYZE document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainOutput {
    #[serde(rename = "Plan")]
    pub plan: PlanNode,
    #[serde(rename = "Planning Time", default)]
    pub planning_time_ms: f64,
    #[serde(rename = "Execution Time", default)]
    pub execution_time_ms: f64,
}

impl ExplainOutput {
    /// Decode the JSON returned by PostgreSQL.
    ///
    /// Accepts the raw single-element array PostgreSQL emits, a bare object, or
    /// either of those wrapped in a JSON string.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(text) => Self::from_json(&text),
            serde_json::Value::Array(items) => {
                let first = items
                    .into_iter()
                    .next()
                    .ok_or_else(|| TuneError::Query("Empty EXPLAIN plan".to_string()))?;
                Self::from_value(first)
            }
            serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(TuneError::Query(format!(
                "Unexpected EXPLAIN document: {}",
                other
            ))),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }
}
