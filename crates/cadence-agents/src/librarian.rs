use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use cadence_core::capability::{
    Capability, CapabilityError, CapabilityMeta, InputSpec, RunBindings,
};
use cadence_core::message::Message;

use crate::input::require_text;

pub const LIBRARIAN: &str = "Librarian";

/// Retrieves the style blueprint closest to an intent from the context
/// namespace.
pub struct Librarian {
    top_k: usize,
}

impl Librarian {
    pub fn new() -> Self {
        Self { top_k: 1 }
    }

    /// Blueprint returned when the context namespace has no match.
    pub fn default_blueprint() -> String {
        json!({"instruction": "Generate the content neutrally."}).to_string()
    }
}

impl Default for Librarian {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for Librarian {
    fn name(&self) -> &str {
        LIBRARIAN
    }

    fn metadata(&self) -> CapabilityMeta {
        CapabilityMeta::new(
            LIBRARIAN,
            "Retrieves a Semantic Blueprint (style, tone and structure rules) from the Context Library.",
        )
        .with_input(InputSpec::required(
            "intent_query",
            "a short description of the desired style or format",
        ))
        .with_output("{\"blueprint\": <blueprint JSON text>}")
    }

    async fn invoke(
        &self,
        request: Message,
        bindings: &RunBindings,
    ) -> Result<Message, CapabilityError> {
        let intent = require_text(&request, "intent_query")?;
        let vector = bindings.embed("librarian.embed", intent).await?;
        let hits = bindings
            .index
            .query(&bindings.namespaces.context, &vector, self.top_k)
            .await?;

        let blueprint = match hits.first() {
            Some(hit) => {
                info!(blueprint_id = %hit.id, score = hit.score, "librarian found blueprint");
                hit.metadata_str("blueprint_json")
                    .ok_or_else(|| {
                        CapabilityError::Failed(format!(
                            "blueprint '{}' has no blueprint_json metadata",
                            hit.id
                        ))
                    })?
                    .to_string()
            }
            None => {
                info!("librarian found no blueprint, using default");
                Self::default_blueprint()
            }
        };
        Ok(Message::new(LIBRARIAN, json!({ "blueprint": blueprint })))
    }
}
