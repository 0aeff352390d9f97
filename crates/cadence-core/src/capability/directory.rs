use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;

use super::{Capability, CapabilityError, RunBindings};
use crate::message::Message;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("capability '{0}' is not registered")]
pub struct CapabilityNotFound(pub String);

/// Registry of capabilities, in registration order
#[derive(Default, Clone)]
pub struct CapabilityDirectory {
    entries: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
}

impl CapabilityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. A later registration under the same name
    /// replaces the earlier one in place.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        match self.index.get(&name) {
            Some(&position) => {
                tracing::warn!(capability = %name, "replacing registered capability");
                self.entries[position] = capability;
            }
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push(capability);
            }
        }
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the manifest shown to the planner: one section per
    /// capability with its role, inputs and output.
    pub fn describe(&self) -> String {
        let mut manifest = String::new();
        for capability in &self.entries {
            let meta = capability.metadata();
            let _ = writeln!(manifest, "- {}: {}", meta.name, meta.role);
            if !meta.inputs.is_empty() {
                let _ = writeln!(manifest, "  inputs:");
                for input in &meta.inputs {
                    let marker = if input.required { "required" } else { "optional" };
                    let _ = writeln!(
                        manifest,
                        "    - {} ({}): {}",
                        input.key, marker, input.description
                    );
                }
            }
            if !meta.output.is_empty() {
                let _ = writeln!(manifest, "  output: {}", meta.output);
            }
        }
        manifest
    }

    /// Look up a capability by exact name and bind it to a run.
    pub fn resolve(
        &self,
        name: &str,
        bindings: Arc<RunBindings>,
    ) -> Result<BoundCapability, CapabilityNotFound> {
        let position = self
            .index
            .get(name)
            .copied()
            .ok_or_else(|| CapabilityNotFound(name.to_string()))?;
        Ok(BoundCapability {
            capability: Arc::clone(&self.entries[position]),
            bindings,
        })
    }
}

impl std::fmt::Debug for CapabilityDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDirectory")
            .field("capabilities", &self.names())
            .finish()
    }
}

/// A capability bound to one run's oracles and store handle
#[derive(Clone)]
pub struct BoundCapability {
    capability: Arc<dyn Capability>,
    bindings: Arc<RunBindings>,
}

impl BoundCapability {
    pub fn name(&self) -> &str {
        self.capability.name()
    }

    pub async fn call(&self, request: Message) -> Result<Message, CapabilityError> {
        self.capability.invoke(request, &self.bindings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityMeta, InputSpec};
    use crate::oracle::{EmbeddingOracle, OracleError, OracleRequest, TextOracle};
    use crate::store::{StoreError, VectorIndex, VectorMatch, VectorRecord};
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo {
        name: &'static str,
    }

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn metadata(&self) -> CapabilityMeta {
            CapabilityMeta::new(self.name, "Echoes its input")
                .with_input(InputSpec::required("text", "anything"))
                .with_output("the same content")
        }

        async fn invoke(
            &self,
            request: Message,
            bindings: &RunBindings,
        ) -> Result<Message, CapabilityError> {
            Ok(Message::new(self.name, request.into_content())
                .with_metadata("model", bindings.generation_model.clone()))
        }
    }

    struct NullOracle;

    #[async_trait]
    impl TextOracle for NullOracle {
        async fn complete(&self, _request: OracleRequest) -> Result<String, OracleError> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl EmbeddingOracle for NullOracle {
        async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>, OracleError> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    struct NullIndex;

    #[async_trait]
    impl VectorIndex for NullIndex {
        fn name(&self) -> &str {
            "null"
        }

        async fn query(
            &self,
            _namespace: &str,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<VectorMatch>, StoreError> {
            Ok(Vec::new())
        }

        async fn upsert(
            &self,
            _namespace: &str,
            records: Vec<VectorRecord>,
        ) -> Result<usize, StoreError> {
            Ok(records.len())
        }
    }

    fn bindings() -> Arc<RunBindings> {
        Arc::new(
            RunBindings::new(Arc::new(NullOracle), Arc::new(NullOracle), Arc::new(NullIndex))
                .with_models("gen-model", "embed-model"),
        )
    }

    #[test]
    fn test_describe_lists_capabilities_in_registration_order() {
        let directory = CapabilityDirectory::new()
            .with(Arc::new(Echo { name: "Beta" }))
            .with(Arc::new(Echo { name: "Alpha" }));

        let manifest = directory.describe();
        let beta = manifest.find("- Beta:").expect("beta listed");
        let alpha = manifest.find("- Alpha:").expect("alpha listed");
        assert!(beta < alpha);
        assert!(manifest.contains("text (required): anything"));
        assert_eq!(directory.names(), vec!["Beta", "Alpha"]);
    }

    #[test]
    fn test_resolve_unknown_name_fails() {
        let directory = CapabilityDirectory::new().with(Arc::new(Echo { name: "Writer" }));
        let err = directory.resolve("writer", bindings()).err().expect("not found");
        assert_eq!(err, CapabilityNotFound("writer".to_string()));
    }

    #[tokio::test]
    async fn test_bound_capability_receives_run_bindings() {
        let directory = CapabilityDirectory::new().with(Arc::new(Echo { name: "Echo" }));
        let bound = directory.resolve("Echo", bindings()).expect("resolve");

        let reply = bound
            .call(Message::new("Engine", json!({"text": "hi"})))
            .await
            .expect("call");
        assert_eq!(reply.sender(), "Echo");
        assert_eq!(reply.content(), &json!({"text": "hi"}));
        assert_eq!(reply.metadata().get("model"), Some(&json!("gen-model")));
    }

    #[test]
    fn test_register_same_name_replaces_in_place() {
        let mut directory = CapabilityDirectory::new();
        directory.register(Arc::new(Echo { name: "A" }));
        directory.register(Arc::new(Echo { name: "B" }));
        directory.register(Arc::new(Echo { name: "A" }));
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.names(), vec!["A", "B"]);
    }
}
