//! # Orchestrator Resolve
//!
//! Model resolution for the turn orchestrator.
//!
//! Given a route's preference chain, the turn's feature requirements, live
//! health scores, and an optional allow-list, the resolver lands on exactly
//! one model id and leaves behind a full accept/reject audit trail. It never
//! fails: when nothing survives the capability walk it falls back down a
//! fixed ladder ending at the global default.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod resolver;

// Re-export main types
pub use catalog::{StaticHealthService, StaticModelCatalog};
pub use resolver::{ModelResolver, ResolutionRequest, GLOBAL_DEFAULT_MODEL};
