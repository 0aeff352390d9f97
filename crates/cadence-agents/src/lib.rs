//! # Cadence Agents
//!
//! Built-in capabilities for the Cadence context engine.
//!
//! This crate provides:
//! - Librarian: blueprint retrieval from the context namespace
//! - Researcher: sourced answers from the knowledge namespace
//! - Writer, Summarizer and Validator over the text oracle
//! - Prompt-injection screening for retrieved text
//!
//! Use [`default_directory`] to get a directory with all of them registered.

mod input;
mod librarian;
mod researcher;
mod sanitize;
mod summarizer;
mod validator;
mod writer;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use cadence_core::capability::CapabilityDirectory;

pub use librarian::{Librarian, LIBRARIAN};
pub use researcher::{Researcher, RESEARCHER};
pub use sanitize::{sanitize_input, SuspectContent};
pub use summarizer::{Summarizer, SUMMARIZER};
pub use validator::{normalize_verdict, Validator, VALIDATOR};
pub use writer::{Writer, WRITER};

/// Directory holding every built-in capability.
pub fn default_directory() -> CapabilityDirectory {
    CapabilityDirectory::new()
        .with(Arc::new(Librarian::new()))
        .with(Arc::new(Researcher::new()))
        .with(Arc::new(Writer::new()))
        .with(Arc::new(Summarizer::new()))
        .with(Arc::new(Validator::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_blueprint, seed_chunk};
    use cadence_core::executor::{Engine, RunConfig};
    use cadence_core::retry::RetryPolicy;
    use cadence_core::store::StoreBinding;
    use cadence_core::types::TraceStatus;
    use cadence_llm::{HashingEmbeddingOracle, LlmPlanner, MockTextOracle};
    use cadence_stores::{InMemoryConnector, InMemoryVectorIndex};
    use serde_json::json;

    #[test]
    fn test_default_directory_manifest_lists_every_capability() {
        let directory = default_directory();
        assert_eq!(
            directory.names(),
            vec![LIBRARIAN, RESEARCHER, WRITER, SUMMARIZER, VALIDATOR]
        );

        let manifest = directory.describe();
        for key in [
            "intent_query",
            "topic_query",
            "blueprint",
            "previous_content",
            "text_to_summarize",
            "summary_objective",
            "draft",
        ] {
            assert!(manifest.contains(key), "manifest is missing {}", key);
        }
    }

    #[test]
    fn test_librarian_researcher_writer_pipeline() {
        tokio_test::block_on(async {
            let index = Arc::new(InMemoryVectorIndex::new("cadence"));
            seed_blueprint(
                &index,
                "blueprint_suspense_narrative",
                "suspenseful narrative blueprint",
                "{\"tone\":\"tense\"}",
            )
            .await;
            seed_chunk(&index, "knowledge_chunk_0", "Apollo 11 landed on the Moon in 1969", "apollo.txt")
                .await;

            let plan = json!([
                {"step": 1, "agent": "Librarian", "input": {"intent_query": "suspenseful narrative"}},
                {"step": 2, "agent": "Researcher", "input": {"topic_query": "Apollo 11 landing"}},
                {"step": 3, "agent": "Writer", "input": {"blueprint": "$$STEP_1_OUTPUT$$", "facts": "$$STEP_2_OUTPUT$$"}}
            ]);
            let oracle = Arc::new(MockTextOracle::new("unused").with_script(vec![
                Ok(plan.to_string()),
                Ok("Apollo 11 landed in 1969.".to_string()),
                Ok("The Eagle descended in silence...".to_string()),
            ]));

            let engine = Engine::new(
                Arc::new(LlmPlanner::default()),
                Arc::new(default_directory()),
                Arc::new(InMemoryConnector::new().with_index(index)),
            );
            let config = RunConfig::new(
                oracle.clone(),
                Arc::new(HashingEmbeddingOracle::default()),
                StoreBinding::new("cadence"),
            )
            .with_models("gen-model", "embed-model")
            .with_retry(RetryPolicy::immediate(2));

            let (output, trace) = engine.execute("Write a suspenseful story about Apollo 11.", &config).await;

            assert_eq!(trace.status(), &TraceStatus::Success);
            assert_eq!(output, Some(json!("The Eagle descended in silence...")));
            assert_eq!(trace.steps().len(), 3);

            let requests = oracle.requests();
            assert_eq!(requests.len(), 3);
            assert!(requests[2].system.contains("{\"tone\":\"tense\"}"));
            assert!(requests[2].user.contains("Apollo 11 landed in 1969."));
            assert!(requests[2].user.contains("- apollo.txt"));
        });
    }
}
