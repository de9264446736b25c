//! Orchestration graph: typed routing table and the engine that drives it.

pub mod engine;
pub mod routing;

pub use engine::{WorkflowEngine, WorkflowInput, WorkflowPolicy};
