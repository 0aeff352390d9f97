//! Shared fixtures for capability tests.

use std::sync::Arc;

use cadence_core::capability::{RunBindings, CONTEXT_NAMESPACE, KNOWLEDGE_NAMESPACE};
use cadence_core::oracle::TextOracle;
use cadence_core::retry::RetryPolicy;
use cadence_core::store::{VectorIndex, VectorRecord};
use cadence_llm::HashingEmbeddingOracle;
use cadence_stores::InMemoryVectorIndex;

pub(crate) fn bindings(text: Arc<dyn TextOracle>) -> (RunBindings, Arc<InMemoryVectorIndex>) {
    let index = Arc::new(InMemoryVectorIndex::new("test-index"));
    let bindings = RunBindings::new(
        text,
        Arc::new(HashingEmbeddingOracle::default()),
        index.clone(),
    )
    .with_models("gen-model", "embed-model")
    .with_retry(RetryPolicy::immediate(2));
    (bindings, index)
}

pub(crate) async fn seed_blueprint(
    index: &InMemoryVectorIndex,
    id: &str,
    description: &str,
    blueprint_json: &str,
) {
    let values = HashingEmbeddingOracle::default().embed_text(description);
    let record = VectorRecord::new(id, values)
        .with_metadata("description", description)
        .with_metadata("blueprint_json", blueprint_json);
    index.upsert(CONTEXT_NAMESPACE, vec![record]).await.unwrap();
}

pub(crate) async fn seed_chunk(index: &InMemoryVectorIndex, id: &str, text: &str, source: &str) {
    let values = HashingEmbeddingOracle::default().embed_text(text);
    let record = VectorRecord::new(id, values)
        .with_metadata("text", text)
        .with_metadata("source", source);
    index.upsert(KNOWLEDGE_NAMESPACE, vec![record]).await.unwrap();
}
