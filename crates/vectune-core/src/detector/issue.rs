//! Issue tags raised against an observation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A named performance problem.
///
/// The first five come from [`IssueDetector`](super::IssueDetector); the last
/// two are the coarse tags the orchestrator uses to decide whether reasoning
/// is needed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueTag {
    #[serde(rename = "SEQUENTIAL_SCAN_LARGE_DATASET")]
    SequentialScanLargeDataset,
    #[serde(rename = "SEQUENTIAL_SCAN_SMALL_DATASET")]
    SequentialScanSmallDataset,
    #[serde(rename = "HIGH_EXECUTION_TIME")]
    HighExecutionTime,
    #[serde(rename = "NO_INDEX_AVAILABLE")]
    NoIndexAvailable,
    #[serde(rename = "LOW_SELECTIVITY")]
    LowSelectivity,
    #[serde(rename = "high_latency")]
    HighLatency,
    #[serde(rename = "missing_index")]
    MissingIndex,
}

/// Issues of one observation, in detection order.
pub type IssueSet = BTreeSet<IssueTag>;

impl IssueTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueTag::SequentialScanLargeDataset => "SEQUENTIAL_SCAN_LARGE_DATASET",
            IssueTag::SequentialScanSmallDataset => "SEQUENTIAL_SCAN_SMALL_DATASET",
            IssueTag::HighExecutionTime => "HIGH_EXECUTION_TIME",
            IssueTag::NoIndexAvailable => "NO_INDEX_AVAILABLE",
            IssueTag::LowSelectivity => "LOW_SELECTIVITY",
            IssueTag::HighLatency => "high_latency",
            IssueTag::MissingIndex => "missing_index",
        }
    }

    /// True for the orchestrator's gate tags.
    pub fn is_coarse(&self) -> bool {
        matches!(self, IssueTag::HighLatency | IssueTag::MissingIndex)
    }
}

impl fmt::Display for IssueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
