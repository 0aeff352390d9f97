use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use cadence_core::capability::{
    Capability, CapabilityError, CapabilityMeta, InputSpec, RunBindings,
};
use cadence_core::message::Message;

use crate::input::require_text;
use crate::sanitize::sanitize_input;

pub const RESEARCHER: &str = "Researcher";

const SUSPECT_DATA_ANSWER: &str =
    "Could not generate a reliable answer as retrieved data was suspect.";

const SYSTEM_PROMPT: &str = "You are an expert research synthesis AI. \
Your task is to provide a clear, factual answer to the user's topic based *only* on the provided source texts. \
After the answer, you MUST provide a \"Sources\" section listing the unique source document names you used.";

/// Answers a topic from the knowledge namespace, citing its sources.
///
/// Retrieved chunks are screened with [`sanitize_input`]; suspect ones are
/// skipped. When nothing survives screening the capability answers with a
/// fixed refusal instead of calling the text oracle.
pub struct Researcher {
    top_k: usize,
}

impl Researcher {
    pub fn new() -> Self {
        Self { top_k: 3 }
    }
}

impl Default for Researcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for Researcher {
    fn name(&self) -> &str {
        RESEARCHER
    }

    fn metadata(&self) -> CapabilityMeta {
        CapabilityMeta::new(
            RESEARCHER,
            "Retrieves and synthesizes factual information from the Knowledge Base, with sources.",
        )
        .with_input(InputSpec::required(
            "topic_query",
            "the subject to research",
        ))
        .with_output("{\"answer_with_sources\": <text>}")
    }

    async fn invoke(
        &self,
        request: Message,
        bindings: &RunBindings,
    ) -> Result<Message, CapabilityError> {
        let topic = require_text(&request, "topic_query")?;
        let vector = bindings.embed("researcher.embed", topic).await?;
        let hits = bindings
            .index
            .query(&bindings.namespaces.knowledge, &vector, self.top_k)
            .await?;

        let mut texts = Vec::new();
        let mut sources = BTreeSet::new();
        for hit in &hits {
            let Some(text) = hit.metadata_str("text") else {
                warn!(chunk_id = %hit.id, "retrieved chunk has no text, skipped");
                continue;
            };
            match sanitize_input(text) {
                Ok(clean) => {
                    texts.push(clean);
                    if let Some(source) = hit.metadata_str("source") {
                        sources.insert(source.to_string());
                    }
                }
                Err(err) => {
                    warn!(chunk_id = %hit.id, reason = %err, "retrieved chunk failed sanitization, skipped");
                }
            }
        }

        if texts.is_empty() {
            error!(retrieved = hits.len(), "no retrieved chunk passed sanitization");
            return Ok(Message::new(
                RESEARCHER,
                json!({"answer": SUSPECT_DATA_ANSWER, "sources": []}),
            ));
        }

        info!(chunks = texts.len(), "researcher synthesizing answer");
        let user = format!(
            "Topic: {}\n\nSources:\n{}\n\n---\nSynthesize your answer and list the source documents now.",
            topic,
            texts.join("\n\n---\n\n")
        );
        let findings = bindings
            .complete("researcher.synthesize", bindings.request(SYSTEM_PROMPT, user))
            .await?;

        let source_list = sources
            .iter()
            .map(|source| format!("- {}", source))
            .collect::<Vec<_>>()
            .join("\n");
        let answer = format!("{}\n\n**Sources:**\n{}", findings, source_list);
        Ok(Message::new(
            RESEARCHER,
            json!({ "answer_with_sources": answer }),
        ))
    }
}
