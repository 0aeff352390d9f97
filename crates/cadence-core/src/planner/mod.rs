//! Planner module
//!
//! The Planner is responsible for:
//! - Turning a free-text goal into an ordered Plan
//! - Choosing capabilities from the directory manifest
//! - Wiring data flow between steps with forward references
//!
//! The Planner does NOT handle:
//! - Checking that referenced agents exist
//! - Checking that references point backwards
//! - Repairing a malformed plan

mod normalize;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::capability::RunBindings;
use crate::oracle::OracleError;
use crate::retry::RetryError;
use crate::types::Plan;

pub use normalize::{check_step_order, normalize_plan_value};

/// Planner errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner oracle call failed: {0}")]
    Oracle(#[from] RetryError<OracleError>),

    #[error("planner output is not valid JSON: {0}")]
    Parse(String),

    #[error("invalid plan shape: {0}")]
    InvalidPlanShape(String),

    #[error("invalid step ordering: {0}")]
    InvalidOrdering(String),
}

impl PlanError {
    /// True when planning stopped because the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlanError::Oracle(err) if err.is_cancelled())
    }
}

/// Planner trait - generates an execution plan from a goal
///
/// Implementations can use different LLM backends or prompting strategies.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, goal: &str, context: &PlannerContext) -> Result<Plan, PlanError>;
}

/// Context provided to the planner
#[derive(Debug, Clone)]
pub struct PlannerContext {
    /// Capability manifest, consumed verbatim
    pub manifest: String,
    /// Run bindings; the planner reaches its oracle through these
    pub bindings: Arc<RunBindings>,
}

impl PlannerContext {
    pub fn new(manifest: impl Into<String>, bindings: Arc<RunBindings>) -> Self {
        Self {
            manifest: manifest.into(),
            bindings,
        }
    }
}
