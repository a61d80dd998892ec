//! # Orchestrator Critic
//!
//! The quality-critic loop.
//!
//! A drafted reply is scored by an evaluator against a route-specific rubric.
//! When the draft falls short, the loop derives a small provider set from the
//! critic's issues, re-runs only those providers, and regenerates the reply
//! with the fresh context folded in. The loop is bounded and fails open on
//! evaluator errors so the user is never blocked.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod critic_loop;
pub mod evaluator;

// Re-export main types
pub use critic_loop::{
    CriticConfig, CriticContext, CriticIterationRecord, CriticLoop, CriticOutcome,
    ProviderRedispatcher,
};
pub use evaluator::{
    redispatch_targets, CriticAssessment, CriticVerdict, DraftEvaluator, EvaluationRequest,
    ModelEvaluator,
};
