//! # Cadence Core
//!
//! Core abstractions and deterministic logic for the Cadence context engine.
//!
//! This crate contains:
//! - Message / Plan / Step / ExecutionState / ExecutionTrace definitions
//! - Planner / Capability / oracle / vector-store abstractions
//! - The retrying call layer wrapped around every oracle call
//! - Dependency resolution ("context chaining") and sequential execution
//!
//! This crate does NOT care about:
//! - Which LLM vendor answers the prompts
//! - Which vector database stores the blueprints and knowledge
//! - How capabilities phrase their prompts
//! - How the trace is displayed

pub mod capability;
pub mod executor;
pub mod message;
pub mod oracle;
pub mod planner;
pub mod resolver;
pub mod retry;
pub mod store;
pub mod text;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::capability::{
        BoundCapability, Capability, CapabilityDirectory, CapabilityError, CapabilityMeta,
        CapabilityNotFound, InputSpec, Namespaces, RunBindings,
    };
    pub use crate::executor::{Engine, EngineError, EngineOptions, RunConfig, ENGINE_SENDER};
    pub use crate::message::{validate_message, Message, MessageError, PROTOCOL_VERSION};
    pub use crate::oracle::{EmbeddingOracle, OracleError, OracleRequest, TextOracle};
    pub use crate::planner::{
        check_step_order, normalize_plan_value, PlanError, Planner, PlannerContext,
    };
    pub use crate::resolver::{forward_reference_key, resolve, ResolveError};
    pub use crate::retry::{retry_call, RetryError, RetryPolicy, Transient};
    pub use crate::store::{
        StoreBinding, StoreConnector, StoreError, VectorIndex, VectorMatch, VectorRecord,
    };
    pub use crate::types::{
        step_output_key, ExecutionState, ExecutionTrace, Plan, StateError, Step, StepRecord,
        TraceStatus,
    };
}

// Re-export key types at crate root
pub use capability::{Capability, CapabilityDirectory, CapabilityError, RunBindings};
pub use executor::{Engine, EngineError, EngineOptions, RunConfig};
pub use message::Message;
pub use planner::{PlanError, Planner, PlannerContext};
pub use retry::{RetryError, RetryPolicy};
pub use types::{ExecutionState, ExecutionTrace, Plan, Step, TraceStatus};

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;
