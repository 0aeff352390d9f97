//! Execution trace
//!
//! The trace is the append-only record of one run. It is created when the
//! run starts, finalized exactly once when it ends, and handed back to the
//! caller whatever the outcome.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::Plan;

/// Terminal (or initial) status of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceStatus {
    Initialized,
    Success,
    FailedInitialization,
    FailedPlanning,
    FailedAtStep(u32),
    CancelledPlanning,
    CancelledAtStep(u32),
}

impl TraceStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TraceStatus::Success)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceStatus::Initialized)
    }

    /// Step number the run stopped at, if it stopped inside execution.
    pub fn failed_step(&self) -> Option<u32> {
        match self {
            TraceStatus::FailedAtStep(step) | TraceStatus::CancelledAtStep(step) => Some(*step),
            _ => None,
        }
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStatus::Initialized => f.write_str("Initialized"),
            TraceStatus::Success => f.write_str("Success"),
            TraceStatus::FailedInitialization => f.write_str("Failed during Initialization"),
            TraceStatus::FailedPlanning => f.write_str("Failed during Planning"),
            TraceStatus::FailedAtStep(step) => write!(f, "Failed at Step {}", step),
            TraceStatus::CancelledPlanning => f.write_str("Cancelled during Planning"),
            TraceStatus::CancelledAtStep(step) => write!(f, "Cancelled at Step {}", step),
        }
    }
}

impl Serialize for TraceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One completed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: u32,
    pub agent: String,
    /// Input as planned, forward references intact
    pub planned_input: Value,
    /// Input actually sent to the capability
    pub resolved_input: Value,
    pub output: Value,
}

/// Full record of one run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionTrace {
    run_id: Uuid,
    goal: String,
    plan: Option<Plan>,
    steps: Vec<StepRecord>,
    status: TraceStatus,
    final_output: Option<Value>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,
    #[serde(skip)]
    clock: Instant,
}

impl ExecutionTrace {
    pub(crate) fn new(goal: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            goal: goal.into(),
            plan: None,
            steps: Vec::new(),
            status: TraceStatus::Initialized,
            final_output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            clock: Instant::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Plan as acquired from the planner, untouched by resolution.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn status(&self) -> &TraceStatus {
        &self.status
    }

    /// Final output; present only on success.
    pub fn final_output(&self) -> Option<&Value> {
        self.final_output.as_ref()
    }

    /// Failure reason for non-success statuses.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn duration(&self) -> Option<std::time::Duration> {
        self.duration_ms.map(std::time::Duration::from_millis)
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn record_plan(&mut self, plan: Plan) {
        if self.is_finalized() || self.plan.is_some() {
            return;
        }
        self.plan = Some(plan);
    }

    pub(crate) fn record_step(&mut self, record: StepRecord) {
        if self.is_finalized() {
            return;
        }
        self.steps.push(record);
    }

    pub(crate) fn finalize_success(&mut self, output: Option<Value>) {
        self.finalize(TraceStatus::Success, output, None);
    }

    pub(crate) fn finalize_failure(&mut self, status: TraceStatus, error: impl Into<String>) {
        self.finalize(status, None, Some(error.into()));
    }

    fn finalize(&mut self, status: TraceStatus, output: Option<Value>, error: Option<String>) {
        if self.is_finalized() {
            tracing::warn!(
                run_id = %self.run_id,
                status = %self.status,
                "trace already finalized; ignoring second finalization"
            );
            return;
        }
        let elapsed = self.clock.elapsed();
        self.status = status;
        self.final_output = output;
        self.error = error;
        self.finished_at = Some(Utc::now());
        self.duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }
}
