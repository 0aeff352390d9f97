use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use cadence_core::capability::{
    Capability, CapabilityError, CapabilityMeta, InputSpec, RunBindings,
};
use cadence_core::message::Message;

use crate::input::text_from;

pub const VALIDATOR: &str = "Validator";

const SYSTEM_PROMPT: &str = "You are a meticulous fact-checker. \
Determine if the 'DRAFT' is factually consistent with the 'SOURCE SUMMARY'.\n\
- If all claims in the DRAFT are supported by the SOURCE, respond with only the word \"pass\".\n\
- If the DRAFT contains any information not in the SOURCE, respond with \"fail\" and a one-sentence explanation.";

/// Fact-checks a draft against a source summary.
///
/// Replies with the text `pass` or `fail: <reason>`.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    fn text_input(request: &Message, key: &str, keys: &[&str]) -> Result<String, CapabilityError> {
        request
            .field(key)
            .and_then(|value| text_from(value, keys))
            .ok_or_else(|| CapabilityError::MissingInput(key.to_string()))
    }
}

/// Normalize a fact-checker reply to `pass` or `fail: <reason>`.
pub fn normalize_verdict(reply: &str) -> String {
    let trimmed = reply.trim();
    let lowered = trimmed.to_lowercase();
    if lowered.starts_with("pass") {
        return "pass".to_string();
    }
    let reason = if lowered.starts_with("fail") {
        trimmed
            .get(4..)
            .unwrap_or_default()
            .trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
    } else {
        trimmed
    };
    if reason.is_empty() {
        "fail: no reason given".to_string()
    } else {
        format!("fail: {}", reason)
    }
}

#[async_trait]
impl Capability for Validator {
    fn name(&self) -> &str {
        VALIDATOR
    }

    fn metadata(&self) -> CapabilityMeta {
        CapabilityMeta::new(
            VALIDATOR,
            "Fact-checks a draft against a source summary.",
        )
        .with_input(InputSpec::required(
            "summary",
            "the trusted source summary or research findings",
        ))
        .with_input(InputSpec::required("draft", "the text to check"))
        .with_output("\"pass\" or \"fail: <reason>\"")
    }

    async fn invoke(
        &self,
        request: Message,
        bindings: &RunBindings,
    ) -> Result<Message, CapabilityError> {
        let summary = Self::text_input(
            &request,
            "summary",
            &["summary", "answer_with_sources", "facts"],
        )?;
        let draft = Self::text_input(&request, "draft", &[])?;

        let user = format!("SOURCE SUMMARY:\n{}\n\nDRAFT:\n{}", summary, draft);
        let reply = bindings
            .complete("validator.check", bindings.request(SYSTEM_PROMPT, user))
            .await?;
        let verdict = normalize_verdict(&reply);
        info!(verdict = %verdict, "validation completed");
        Ok(Message::new(VALIDATOR, Value::String(verdict)))
    }
}
