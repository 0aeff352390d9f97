//! Plan type definitions
//!
//! A Plan is the ordered list of capability invocations produced by the
//! planner. On the wire it is a bare JSON list of step objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State key under which the output of step `step` is stored.
pub fn step_output_key(step: u32) -> String {
    format!("STEP_{}_OUTPUT", step)
}

/// A single step in the execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step number, unique and ascending in plan order
    pub step: u32,
    /// Name of the capability to invoke
    pub agent: String,
    /// Declared input; string leaves may be forward references
    pub input: Value,
}

impl Step {
    pub fn new(step: u32, agent: impl Into<String>, input: Value) -> Self {
        Self {
            step,
            agent: agent.into(),
            input,
        }
    }

    /// State key this step's output is written to.
    pub fn output_key(&self) -> String {
        step_output_key(self.step)
    }
}

/// Plan - ordered steps, trusted as emitted by the planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Last step in plan order; its output is the run's final output.
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Get a step by number
    pub fn get_step(&self, step: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step == step)
    }
}
