//! trainprep workflow orchestration.
//!
//! Holds the ordered stage runner. The binary crate supplies the concrete state
//! type and, when resuming is requested, the persistence backend.

pub mod stage_runner;

pub use stage_runner::{NoStore, StageDefinition, StageRunner, StateStore, WorkflowState};
