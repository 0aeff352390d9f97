use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use cadence_core::capability::{
    Capability, CapabilityError, CapabilityMeta, InputSpec, RunBindings,
};
use cadence_core::message::Message;

use crate::input::text_from;

pub const WRITER: &str = "Writer";

/// Keys checked, in order, when `facts` arrives as a mapping.
const FACT_KEYS: [&str; 3] = ["facts", "summary", "answer_with_sources"];

/// Generates content from source material under a semantic blueprint.
///
/// `facts` wins over `previous_content` when both are present. The reply
/// content is the generated text itself.
#[derive(Debug, Default)]
pub struct Writer;

impl Writer {
    pub fn new() -> Self {
        Self
    }

    fn blueprint(request: &Message) -> Result<String, CapabilityError> {
        let value = request
            .field("blueprint")
            .ok_or_else(|| CapabilityError::MissingInput("blueprint".to_string()))?;
        match value {
            Value::Object(map) if !map.contains_key("blueprint") => Err(
                CapabilityError::invalid_input("blueprint", "mapping has no 'blueprint' entry"),
            ),
            other => text_from(other, &["blueprint"])
                .ok_or_else(|| CapabilityError::MissingInput("blueprint".to_string())),
        }
    }

    fn source_material(request: &Message) -> Result<(&'static str, String), CapabilityError> {
        if let Some(facts) = request.field("facts").and_then(|v| text_from(v, &FACT_KEYS)) {
            return Ok(("RESEARCH FINDINGS", facts));
        }
        if let Some(previous) = request
            .field("previous_content")
            .and_then(|v| text_from(v, &[]))
        {
            return Ok(("PREVIOUS CONTENT (For Rewriting)", previous));
        }
        Err(CapabilityError::MissingInput(
            "facts or previous_content".to_string(),
        ))
    }
}

#[async_trait]
impl Capability for Writer {
    fn name(&self) -> &str {
        WRITER
    }

    fn metadata(&self) -> CapabilityMeta {
        CapabilityMeta::new(
            WRITER,
            "Generates or rewrites content by applying a Semantic Blueprint to source material.",
        )
        .with_input(InputSpec::required(
            "blueprint",
            "the style blueprint, usually a Librarian output",
        ))
        .with_input(InputSpec::optional(
            "facts",
            "new source material, e.g. a Researcher or Summarizer output",
        ))
        .with_input(InputSpec::optional(
            "previous_content",
            "existing text to rewrite when there are no new facts",
        ))
        .with_output("the generated text")
    }

    async fn invoke(
        &self,
        request: Message,
        bindings: &RunBindings,
    ) -> Result<Message, CapabilityError> {
        let blueprint = Self::blueprint(&request)?;
        let (label, material) = Self::source_material(&request)?;
        info!(source = label, material_len = material.len(), "writer applying blueprint");

        let system = format!(
            "You are an expert content generation AI.\n\
Your task is to generate content based on the provided SOURCE MATERIAL.\n\
Crucially, you MUST structure, style, and constrain your output according to the rules defined in the SEMANTIC BLUEPRINT provided below.\n\n\
--- SEMANTIC BLUEPRINT (JSON) ---\n{}\n--- END SEMANTIC BLUEPRINT ---\n\n\
Adhere strictly to the blueprint's instructions, style guides, and goals. \
The blueprint defines HOW you write; the source material defines WHAT you write about.",
            blueprint
        );
        let user = format!(
            "--- SOURCE MATERIAL ({}) ---\n{}\n--- END SOURCE MATERIAL ---\n\n\
Generate the content now, following the blueprint precisely.",
            label, material
        );
        let text = bindings
            .complete("writer.generate", bindings.request(system, user))
            .await?;
        Ok(Message::new(WRITER, Value::String(text)))
    }
}
