//! # Vectune
//!
//! Closed-loop index tuner for pgvector-backed vector stores: observe a
//! nearest-neighbour query, reason about its plan, build an index when it
//! pays off, and verify the effect.
//!
//! The control loop lives in [`vectune_core`]; this crate adds the command
//! line surface around it.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bootstrap`] | Config discovery and wiring of the collaborators |
//! | [`bench`] | Fixed benchmark driver |
//! | [`admin`] | Index cleanup and store summary |
//! | [`report`] | Text, JSON and Markdown rendering |

#![deny(rustdoc::broken_intra_doc_links)]

// ── Re-exports from vectune-core ─────────────────────────────────────────────

pub use vectune_core::analysis;
pub use vectune_core::analyzer;
pub use vectune_core::config;
pub use vectune_core::decision;
pub use vectune_core::detector;
pub use vectune_core::embedding;
pub use vectune_core::error;
pub use vectune_core::executor;
pub use vectune_core::oracle;
pub use vectune_core::orchestrator;
pub use vectune_core::storage;

// ── Top-level re-exports for convenience ─────────────────────────────────────

pub use vectune_core::{Config, CycleOrchestrator, CycleResult, Result, TuneError};

// ── Command line support ─────────────────────────────────────────────────────

pub mod admin;
pub mod bench;
pub mod bootstrap;
pub mod report;
