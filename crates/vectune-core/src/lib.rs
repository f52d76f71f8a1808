//! # Vectune Core
//!
//! Closed-loop tuning of vector indexes: observe a nearest-neighbour query,
//! reason about its plan, create an index when warranted, and verify the
//! effect.

// ── Control loop ─────────────────────────────────────────────────────────────

pub mod analysis;
pub mod analyzer;
pub mod decision;
pub mod detector;
pub mod executor;
pub mod orchestrator;

// ── Collaborators ────────────────────────────────────────────────────────────

pub mod embedding;
pub mod oracle;
pub mod storage;

// ── Support ──────────────────────────────────────────────────────────────────

pub mod config;
pub mod error;

// ── Public re-exports ────────────────────────────────────────────────────────

pub use analysis::Analysis;
pub use analyzer::{PlanAnalyzer, PlanNode, ScanKind, ScanSummary};
pub use config::Config;
pub use decision::{Action, Confidence, Decision, DecisionEngine, IndexType};
pub use detector::{IssueDetector, IssueTag};
pub use error::{Result, TuneError};
pub use executor::{ActionExecutor, ActionOutcome, ActionResult};
pub use orchestrator::{ControllerStatistics, CycleOrchestrator, CyclePhase, CycleResult};
