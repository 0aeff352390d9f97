//! Screening of retrieved text before it reaches a prompt.

use thiserror::Error;

/// Phrases that try to steer the model instead of informing it.
const INJECTION_MARKERS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "ignore the above",
    "disregard previous instructions",
    "disregard all prior instructions",
    "forget your instructions",
    "override your instructions",
    "reveal your system prompt",
    "you are now",
    "new instructions:",
    "<|im_start|>",
    "<|system|>",
];

/// Retrieved text rejected as a likely prompt injection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("suspect content: contains '{marker}'")]
pub struct SuspectContent {
    pub marker: String,
}

/// Return `text` trimmed, or reject it when it carries an injection marker.
///
/// Matching ignores case and collapses runs of whitespace.
pub fn sanitize_input(text: &str) -> Result<String, SuspectContent> {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if let Some(marker) = INJECTION_MARKERS
        .iter()
        .find(|marker| normalized.contains(*marker))
    {
        return Err(SuspectContent {
            marker: (*marker).to_string(),
        });
    }
    Ok(text.trim().to_string())
}
