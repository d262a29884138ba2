//! Mooring Plan
//!
//! Checkpointed plan execution for the Mooring agent memory engine.
//!
//! # Overview
//!
//! A run is an ordered plan of steps executed against a
//! [`StepRunner`]. After every completed step the full
//! [`AgentState`] is checkpointed, so a crashed process or a failed
//! step picks up exactly where it left off:
//!
//! - [`types`]: the durable data model (plans, steps, results, state)
//! - [`checkpoint`]: the checkpoint store with per-session retention
//! - [`runner`]: the step runner seam and the action registry
//! - [`executor`]: the drive loop with resume and progress events

pub mod checkpoint;
pub mod executor;
pub mod runner;
pub mod types;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointId, CheckpointMeta, CheckpointStore,
    CheckpointSummary, SaveOptions, TriggerKind,
};
pub use executor::{ExecutionEvent, ExecutionOptions, ExecutionResult, PlanExecutor};
pub use runner::{ActionHandler, ActionRegistry, NullRunner, StepOutput, StepRunner};
pub use types::{AgentState, LastError, PlanStep, StepResult, StepStatus, Timestamp};
