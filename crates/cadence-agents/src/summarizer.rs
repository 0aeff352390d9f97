use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use cadence_core::capability::{
    Capability, CapabilityError, CapabilityMeta, InputSpec, RunBindings,
};
use cadence_core::message::Message;

use crate::input::require_text;

pub const SUMMARIZER: &str = "Summarizer";

const SYSTEM_PROMPT: &str = "You are an expert summarization AI. \
Your task is to reduce the provided text to its essential points, guided by the user's specific objective. \
The summary must be concise, accurate, and directly address the stated goal.";

/// Reduces a large text to a summary guided by an objective
#[derive(Debug, Default)]
pub struct Summarizer;

impl Summarizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Capability for Summarizer {
    fn name(&self) -> &str {
        SUMMARIZER
    }

    fn metadata(&self) -> CapabilityMeta {
        CapabilityMeta::new(
            SUMMARIZER,
            "Reduces a large text to a concise summary based on an objective, keeping later prompts small.",
        )
        .with_input(InputSpec::required("text_to_summarize", "the text to reduce"))
        .with_input(InputSpec::required(
            "summary_objective",
            "what the summary must focus on",
        ))
        .with_output("{\"summary\": <text>}")
    }

    async fn invoke(
        &self,
        request: Message,
        bindings: &RunBindings,
    ) -> Result<Message, CapabilityError> {
        let text = require_text(&request, "text_to_summarize")?;
        let objective = require_text(&request, "summary_objective")?;
        info!(text_len = text.len(), "summarizer reducing context");

        let user = format!(
            "--- OBJECTIVE ---\n{}\n\n--- TEXT TO SUMMARIZE ---\n{}\n--- END TEXT ---\n\nGenerate the summary now.",
            objective, text
        );
        let summary = bindings
            .complete("summarizer.summarize", bindings.request(SYSTEM_PROMPT, user))
            .await?;
        Ok(Message::new(SUMMARIZER, json!({ "summary": summary })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::bindings;
    use cadence_llm::MockTextOracle;
    use std::sync::Arc;

    #[test]
    fn test_summarizer_returns_summary_mapping() {
        tokio_test::block_on(async {
            let oracle = Arc::new(MockTextOracle::new("Juno: Jupiter orbiter."));
            let (bindings, _index) = bindings(oracle.clone());

            let reply = Summarizer::new()
                .invoke(
                    Message::new(
                        "Engine",
                        json!({"text_to_summarize": "long text", "summary_objective": "key facts"}),
                    ),
                    &bindings,
                )
                .await
                .unwrap();

            assert_eq!(reply.content(), &json!({"summary": "Juno: Jupiter orbiter."}));
            assert!(oracle.requests()[0].user.contains("--- OBJECTIVE ---\nkey facts"));
        });
    }

    #[test]
    fn test_summarizer_requires_objective() {
        tokio_test::block_on(async {
            let oracle = Arc::new(MockTextOracle::new("unused"));
            let (bindings, _index) = bindings(oracle.clone());
            let err = Summarizer::new()
                .invoke(
                    Message::new("Engine", json!({"text_to_summarize": "long text"})),
                    &bindings,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, CapabilityError::MissingInput(key) if key == "summary_objective"));
            assert!(oracle.requests().is_empty());
        });
    }
}
