//! Scan classification for plan nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Substring that marks a plan node as a scan.
pub const SCAN_MARKER: &str = "Scan";
/// Substring that marks a scan as index-backed.
pub const INDEX_MARKER: &str = "Index";

/// How the outermost scan of a plan reads its relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    /// Full table scan
    Sequential,
    /// B-tree / ANN index scan with heap fetches
    Index,
    /// Index scan answered without touching the heap
    IndexOnly,
    /// Bitmap heap scan
    Bitmap,
    /// Root is not a scan, or the label is not recognised
    #[default]
    Unknown,
    /// Placeholder for an observation that never produced a plan
    Error,
}

impl ScanKind {
    /// Classify a node label. Labels without an exact match are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Seq Scan" => ScanKind::Sequential,
            "Index Scan" => ScanKind::Index,
            "Index Only Scan" => ScanKind::IndexOnly,
            "Bitmap Heap Scan" => ScanKind::Bitmap,
            _ => ScanKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Sequential => "sequential",
            ScanKind::Index => "index",
            ScanKind::IndexOnly => "index_only",
            ScanKind::Bitmap => "bitmap",
            ScanKind::Unknown => "unknown",
            ScanKind::Error => "error",
        }
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if a node label denotes a scan.
pub fn is_scan(label: &str) -> bool {
    label.contains(SCAN_MARKER)
}

/// Returns true if a scan label denotes index usage.
pub fn uses_index(label: &str) -> bool {
    label.contains(INDEX_MARKER)
}

/// Flat summary of every scan in a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Classification of the root node when it is a scan
    pub primary_scan_kind: ScanKind,
    /// Whether any scan in the tree used an index
    pub index_used: bool,
    /// First index found in plan order
    pub index_name: Option<String>,
    /// Sum of actual rows over all scan nodes
    pub rows_scanned: u64,
    /// Labels of every scan node in plan order
    pub scan_kinds_found: Vec<String>,
}
