//! Executor module
//!
//! The Engine is responsible for:
//! - Binding the data store for a run
//! - Acquiring a plan from the planner
//! - Running steps strictly in plan order, chaining their outputs
//! - Recording everything in the execution trace
//!
//! Any failure ends the run. There is no step-level retry and no
//! skip-ahead; the caller always gets the trace back.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::{CapabilityDirectory, CapabilityError, CapabilityNotFound, Namespaces, RunBindings};
use crate::message::Message;
use crate::oracle::{EmbeddingOracle, TextOracle};
use crate::planner::{check_step_order, PlanError, Planner, PlannerContext};
use crate::resolver::{resolve, ResolveError};
use crate::retry::RetryPolicy;
use crate::store::{StoreBinding, StoreConnector, StoreError};
use crate::text::{truncate_for_log, truncate_json_for_log};
use crate::types::{ExecutionState, ExecutionTrace, Plan, StateError, Step, StepRecord, TraceStatus};

/// Sender name stamped on every request the engine dispatches.
pub const ENGINE_SENDER: &str = "Engine";

const MAX_LOG_TEXT_CHARS: usize = 500;
const MAX_LOG_JSON_CHARS: usize = 2_000;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to bind data store: {0}")]
    InitializationFailure(#[source] StoreError),

    #[error("planning failed: {0}")]
    PlanningFailure(#[source] PlanError),

    #[error(transparent)]
    CapabilityNotFound(CapabilityNotFound),

    #[error(transparent)]
    DependencyNotFound(ResolveError),

    #[error("capability '{agent}' failed: {source}")]
    CapabilityExecutionFailure {
        agent: String,
        source: CapabilityError,
    },

    #[error("cannot record step output: {0}")]
    StateConflict(#[source] StateError),

    #[error("run cancelled")]
    Cancelled,
}

/// Engine behavior switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject plans whose steps are not strictly ascending or whose
    /// references do not point backwards, before any step runs.
    pub strict_step_order: bool,
}

/// Per-run configuration: oracle handles, store parameters and models
#[derive(Clone)]
pub struct RunConfig {
    pub text_oracle: Arc<dyn TextOracle>,
    pub embedding_oracle: Arc<dyn EmbeddingOracle>,
    pub store: StoreBinding,
    pub generation_model: String,
    pub embedding_model: String,
    pub namespaces: Namespaces,
    pub retry: RetryPolicy,
}

impl RunConfig {
    pub fn new(
        text_oracle: Arc<dyn TextOracle>,
        embedding_oracle: Arc<dyn EmbeddingOracle>,
        store: StoreBinding,
    ) -> Self {
        Self {
            text_oracle,
            embedding_oracle,
            store,
            generation_model: String::new(),
            embedding_model: String::new(),
            namespaces: Namespaces::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_models(
        mut self,
        generation_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        self.generation_model = generation_model.into();
        self.embedding_model = embedding_model.into();
        self
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Why a run stopped, and the status it ends in
struct RunFailure {
    status: TraceStatus,
    error: EngineError,
}

impl RunFailure {
    fn new(status: TraceStatus, error: EngineError) -> Self {
        Self { status, error }
    }
}

/// Sequential plan-and-execute engine
pub struct Engine {
    planner: Arc<dyn Planner>,
    directory: Arc<CapabilityDirectory>,
    connector: Arc<dyn StoreConnector>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        planner: Arc<dyn Planner>,
        directory: Arc<CapabilityDirectory>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            planner,
            directory,
            connector,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn directory(&self) -> &CapabilityDirectory {
        &self.directory
    }

    /// Plan and execute `goal`; returns the final output (on success only)
    /// and the finalized trace.
    pub async fn execute(&self, goal: &str, config: &RunConfig) -> (Option<Value>, ExecutionTrace) {
        self.execute_with_cancellation(goal, config, CancellationToken::new())
            .await
    }

    /// Like [`Engine::execute`], observing `cancellation` before planning,
    /// before each step and during retry backoff.
    pub async fn execute_with_cancellation(
        &self,
        goal: &str,
        config: &RunConfig,
        cancellation: CancellationToken,
    ) -> (Option<Value>, ExecutionTrace) {
        let (output, trace, _state) = self.execute_with_state(goal, config, cancellation).await;
        (output, trace)
    }

    /// Run `goal` and also hand back the execution state the run left behind.
    pub(crate) async fn execute_with_state(
        &self,
        goal: &str,
        config: &RunConfig,
        cancellation: CancellationToken,
    ) -> (Option<Value>, ExecutionTrace, ExecutionState) {
        let mut trace = ExecutionTrace::new(goal);
        let mut state = ExecutionState::new();
        let run_id = trace.run_id();
        info!(
            run_id = %run_id,
            goal = %truncate_for_log(goal, MAX_LOG_TEXT_CHARS),
            index = %config.store.index_name,
            "run started"
        );

        match self.run(goal, config, cancellation, &mut trace, &mut state).await {
            Ok(output) => {
                trace.finalize_success(Some(output.clone()));
                info!(
                    run_id = %run_id,
                    steps = trace.steps().len(),
                    duration_ms = trace.duration().map(|d| d.as_millis() as u64).unwrap_or(0),
                    "run succeeded"
                );
                (Some(output), trace, state)
            }
            Err(failure) => {
                warn!(
                    run_id = %run_id,
                    status = %failure.status,
                    error = %failure.error,
                    "run failed"
                );
                trace.finalize_failure(failure.status, failure.error.to_string());
                (None, trace, state)
            }
        }
    }

    async fn run(
        &self,
        goal: &str,
        config: &RunConfig,
        cancellation: CancellationToken,
        trace: &mut ExecutionTrace,
        state: &mut ExecutionState,
    ) -> Result<Value, RunFailure> {
        let run_id = trace.run_id();

        let index = self.connector.connect(&config.store).await.map_err(|e| {
            RunFailure::new(
                TraceStatus::FailedInitialization,
                EngineError::InitializationFailure(e),
            )
        })?;
        debug!(run_id = %run_id, index = %index.name(), "data store bound");

        let bindings = Arc::new(
            RunBindings::new(
                Arc::clone(&config.text_oracle),
                Arc::clone(&config.embedding_oracle),
                index,
            )
            .with_models(config.generation_model.clone(), config.embedding_model.clone())
            .with_namespaces(config.namespaces.clone())
            .with_retry(config.retry.clone())
            .with_cancellation(cancellation.clone()),
        );

        let plan = self.acquire_plan(goal, &bindings, &cancellation, trace).await?;

        for step in plan.steps() {
            if cancellation.is_cancelled() {
                return Err(RunFailure::new(
                    TraceStatus::CancelledAtStep(step.step),
                    EngineError::Cancelled,
                ));
            }
            let record = self
                .execute_step(run_id, step, &bindings, state)
                .await
                .map_err(|error| {
                    let status = match &error {
                        EngineError::Cancelled => TraceStatus::CancelledAtStep(step.step),
                        _ => TraceStatus::FailedAtStep(step.step),
                    };
                    RunFailure::new(status, error)
                })?;
            trace.record_step(record);
        }

        let output = plan
            .last()
            .and_then(|last| state.get(&last.output_key()))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(output)
    }

    async fn acquire_plan(
        &self,
        goal: &str,
        bindings: &Arc<RunBindings>,
        cancellation: &CancellationToken,
        trace: &mut ExecutionTrace,
    ) -> Result<Plan, RunFailure> {
        if cancellation.is_cancelled() {
            return Err(RunFailure::new(
                TraceStatus::CancelledPlanning,
                EngineError::Cancelled,
            ));
        }

        let context = PlannerContext::new(self.directory.describe(), Arc::clone(bindings));
        let plan = self.planner.plan(goal, &context).await.map_err(|e| {
            let status = if e.is_cancelled() {
                TraceStatus::CancelledPlanning
            } else {
                TraceStatus::FailedPlanning
            };
            RunFailure::new(status, EngineError::PlanningFailure(e))
        })?;

        let planning_failure =
            |e: PlanError| RunFailure::new(TraceStatus::FailedPlanning, EngineError::PlanningFailure(e));

        if plan.is_empty() {
            return Err(planning_failure(PlanError::InvalidPlanShape(
                "plan has no steps".to_string(),
            )));
        }

        info!(
            run_id = %trace.run_id(),
            steps = plan.len(),
            agents = ?plan.steps().iter().map(|s| s.agent.as_str()).collect::<Vec<_>>(),
            "plan acquired"
        );
        trace.record_plan(plan.clone());

        if self.options.strict_step_order {
            check_step_order(&plan).map_err(planning_failure)?;
        }
        Ok(plan)
    }

    async fn execute_step(
        &self,
        run_id: Uuid,
        step: &Step,
        bindings: &Arc<RunBindings>,
        state: &mut ExecutionState,
    ) -> Result<StepRecord, EngineError> {
        let capability = self
            .directory
            .resolve(&step.agent, Arc::clone(bindings))
            .map_err(EngineError::CapabilityNotFound)?;

        let resolved_input = resolve(&step.input, state).map_err(EngineError::DependencyNotFound)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                run_id = %run_id,
                step = step.step,
                agent = %step.agent,
                input = %truncate_json_for_log(&resolved_input, MAX_LOG_JSON_CHARS),
                "step input resolved"
            );
        }

        info!(run_id = %run_id, step = step.step, agent = %step.agent, "dispatching step");
        let request = Message::new(ENGINE_SENDER, resolved_input.clone())
            .with_metadata("run_id", run_id.to_string())
            .with_metadata("step", step.step);

        let response = capability.call(request).await.map_err(|source| {
            if source.is_cancelled() {
                EngineError::Cancelled
            } else {
                EngineError::CapabilityExecutionFailure {
                    agent: step.agent.clone(),
                    source,
                }
            }
        })?;
        response
            .validate()
            .map_err(|e| EngineError::CapabilityExecutionFailure {
                agent: step.agent.clone(),
                source: CapabilityError::InvalidResponse(e),
            })?;

        let output = response.into_content();
        state
            .record(step.output_key(), output.clone())
            .map_err(EngineError::StateConflict)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                run_id = %run_id,
                step = step.step,
                agent = %step.agent,
                output = %truncate_json_for_log(&output, MAX_LOG_JSON_CHARS),
                "step completed"
            );
        }

        Ok(StepRecord {
            step: step.step,
            agent: step.agent.clone(),
            planned_input: step.input.clone(),
            resolved_input,
            output,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("directory", &self.directory)
            .field("options", &self.options)
            .finish()
    }
}
