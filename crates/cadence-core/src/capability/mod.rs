//! Capability abstraction module
//!
//! This module defines the Capability trait and related types:
//! - Capability: a named unit of work invoked with a [`Message`]
//! - CapabilityMeta: the planner-facing description of a capability
//! - RunBindings: the per-run oracles and data-store handle
//! - CapabilityDirectory: the registry the planner and engine consult

mod bindings;
mod directory;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Message, MessageError};
use crate::oracle::OracleError;
use crate::retry::RetryError;
use crate::store::StoreError;

pub use bindings::{Namespaces, RunBindings, CONTEXT_NAMESPACE, KNOWLEDGE_NAMESPACE};
pub use directory::{BoundCapability, CapabilityDirectory, CapabilityNotFound};

/// Capability trait - a black box to the engine
///
/// A capability receives one message whose content is the resolved step
/// input and answers with one message whose content becomes the step
/// output. It holds no state between invocations; everything run-scoped
/// arrives through [`RunBindings`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// Get the capability name (must be unique in a directory)
    fn name(&self) -> &str;

    /// Describe the capability for planning
    fn metadata(&self) -> CapabilityMeta;

    /// Handle one request
    async fn invoke(&self, request: Message, bindings: &RunBindings)
        -> Result<Message, CapabilityError>;
}

/// One named input a capability reads from its request content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub key: String,
    pub description: String,
    pub required: bool,
}

impl InputSpec {
    pub fn required(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Capability metadata for the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMeta {
    pub name: String,
    /// What the capability is for, in one or two sentences
    pub role: String,
    pub inputs: Vec<InputSpec>,
    /// Shape of the output content
    pub output: String,
}

impl CapabilityMeta {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            inputs: Vec::new(),
            output: String::new(),
        }
    }

    pub fn with_input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// Capability errors
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("missing required input '{0}'")]
    MissingInput(String),

    #[error("invalid input '{key}': {reason}")]
    InvalidInput { key: String, reason: String },

    #[error(transparent)]
    Oracle(#[from] RetryError<OracleError>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid response envelope: {0}")]
    InvalidResponse(#[from] MessageError),

    #[error("{0}")]
    Failed(String),
}

impl CapabilityError {
    pub fn invalid_input(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure came from run cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CapabilityError::Oracle(err) if err.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_builders() {
        let meta = CapabilityMeta::new("Writer", "Writes prose")
            .with_input(InputSpec::required("blueprint", "style rules"))
            .with_input(InputSpec::optional("facts", "verified facts"))
            .with_output("plain text");

        assert_eq!(meta.inputs.len(), 2);
        assert!(meta.inputs[0].required);
        assert!(!meta.inputs[1].required);
        assert_eq!(meta.output, "plain text");
    }

    #[test]
    fn test_cancelled_oracle_error_is_reported() {
        let err = CapabilityError::from(RetryError::<OracleError>::Cancelled {
            operation: "writer.generate".to_string(),
            attempts: 1,
            last: None,
        });
        assert!(err.is_cancelled());
        assert!(!CapabilityError::MissingInput("facts".into()).is_cancelled());
    }
}
