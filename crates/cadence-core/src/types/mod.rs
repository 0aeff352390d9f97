//! Core type definitions

mod plan;
mod state;
mod trace;

pub use plan::{step_output_key, Plan, Step};
pub use state::{ExecutionState, StateError};
pub use trace::{ExecutionTrace, StepRecord, TraceStatus};
