//! # Orchestrator Pipeline
//!
//! The turn pipeline: canary gate, task graph, blackboard, model resolution,
//! synthesis, and the critic loop, composed into one
//! [`TurnOrchestrator::handle_turn`] call.
//!
//! Failure policy, end to end: provider failures degrade context, a
//! graph-level failure falls back to running providers directly, model
//! resolution never fails, the critic fails open, and telemetry is
//! best-effort. Only a hard failure of the synthesis call surfaces to the
//! user, and even that arrives as a generic fallback reply rather than an
//! error.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod orchestrator;
pub mod redispatch;
pub mod synthesis;

// Re-export main types
pub use config::{OrchestratorConfig, ToolPolicy};
pub use orchestrator::{TurnOrchestrator, TurnOrchestratorBuilder, TurnOutcome};
pub use synthesis::FALLBACK_REPLY;
