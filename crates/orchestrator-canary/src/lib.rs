//! # Orchestrator Canary
//!
//! Admission control for the experimental graph pipeline.
//!
//! The canary gates whether the graph pipeline runs a given turn and
//! self-heals by disabling itself under high failure rates: every pipeline
//! attempt lands in a bounded rolling window, and when the observed failure
//! rate crosses the configured budget the gate trips into a cooldown.
//!
//! State is process-wide and lives behind the injectable [`CanaryStore`]
//! trait so tests get isolated instances; production wires one long-lived
//! [`InMemoryCanaryStore`] per process, or a durable store for
//! multi-instance deployments.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod store;

// Re-export main types
pub use controller::{AdmissionDecision, CanaryConfig, CanaryController, CanarySnapshot, reasons};
pub use store::{CanaryOutcome, CanaryState, CanaryStore, InMemoryCanaryStore};
