//! # Cadence Stores
//!
//! Vector store backends for the Cadence runtime.
//!
//! This crate provides:
//! - InMemory vector index and connector
//! - Pinecone-compatible vector index over HTTP
//! - Knowledge ingestion (chunking, batch embedding, upsert)

mod ingest;
mod memory;
mod pinecone;

pub use ingest::{
    chunk_text, load_blueprints, load_documents, BlueprintEntry, Corpus, DocumentEntry,
    IngestError, IngestReport, Ingestor, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_EMBED_BATCH_SIZE,
};
pub use memory::{InMemoryConnector, InMemoryVectorIndex};
pub use pinecone::{PineconeConnector, PineconeIndex, DEFAULT_CONTROLLER_URL, UPSERT_BATCH_SIZE};

// Re-export core store types for convenience
pub use cadence_core::store::{
    StoreBinding, StoreConnector, StoreError, VectorIndex, VectorMatch, VectorRecord,
};
