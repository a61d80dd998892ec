//! # Orchestrator Telemetry
//!
//! Typed telemetry for the turn orchestrator.
//!
//! Events stay strongly typed inside the process; serialization happens only
//! at the sink boundary. Emission is best-effort end to end: a sink that
//! fails logs the failure and never propagates it into the turn.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod emitter;
pub mod events;
pub mod logging;

// Re-export main types
pub use emitter::{
    CompositeTelemetryEmitter, NoOpTelemetryEmitter, TelemetryEmitter, TracingTelemetryEmitter,
};
pub use events::TelemetryEvent;
pub use logging::{init_logging, LoggingConfig, LoggingError};
