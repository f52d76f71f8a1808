//! Plan analysis
//!
//! Turns an execution-plan tree into a flat [`ScanSummary`]. The walk is an
//! explicit pre-order stack traversal; all state lives in one accumulator so
//! sibling subtrees never observe each other's partial results.

pub mod plan;
pub mod scan;

pub use plan::{ExplainOutput, PlanNode};
pub use scan::{ScanKind, ScanSummary};

/// Stateless plan analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanAnalyzer;

impl PlanAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Summarize every scan in `root`.
    ///
    /// The primary scan kind describes the root only: a plan whose root is not
    /// a scan (e.g. `Limit`) is `Unknown` even if its children scan. Index
    /// information is first-found-wins in pre-order, so a parent's own index
    /// is never overwritten by a descendant's.
    pub fn analyze(&self, root: &PlanNode) -> ScanSummary {
        let mut summary = ScanSummary {
            primary_scan_kind: if scan::is_scan(&root.kind) {
                ScanKind::from_label(&root.kind)
            } else {
                ScanKind::Unknown
            },
            ..ScanSummary::default()
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if scan::is_scan(&node.kind) {
                summary.scan_kinds_found.push(node.kind.clone());
                summary.rows_scanned = summary.rows_scanned.saturating_add(node.actual_rows);

                if !summary.index_used && scan::uses_index(&node.kind) {
                    summary.index_used = true;
                    summary.index_name = node.index_name.clone();
                }
            }

            // Reverse so the first child is visited first.
            stack.extend(node.children.iter().rev());
        }

        summary
    }
}
