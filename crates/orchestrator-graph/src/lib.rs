//! # Orchestrator Graph
//!
//! Task graph construction and execution for the turn orchestrator.
//!
//! This crate provides:
//! - [`AgentGraph`]: the per-turn DAG of provider tasks
//! - [`GraphBuilder`]: linear-chain and independent-fan-out construction
//! - [`GraphExecutor`]: dependency-ordered, partial-failure-tolerant
//!   execution under a parallelism ceiling
//! - [`BlackboardState`]: the single-writer aggregate of task status and
//!   artifacts for one turn

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blackboard;
pub mod builder;
pub mod executor;
pub mod graph;

// Re-export main types
pub use blackboard::{BlackboardState, TaskResult, TaskSnapshot, TaskStatus, TurnCounters};
pub use builder::GraphBuilder;
pub use executor::{
    ExecutionEvent, ExecutionReport, ExecutorConfig, GraphExecutor, NodeRunRecord,
};
pub use graph::{AgentGraph, AgentTaskNode, GraphEdge};
