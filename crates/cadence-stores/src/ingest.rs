//! Knowledge ingestion: chunking, batch embedding and upsert.
//!
//! Blueprints land in the context namespace keyed by their description
//! embedding, carrying `description` and `blueprint_json` metadata.
//! Documents are split into overlapping word windows that land in the
//! knowledge namespace with `text` and `source` metadata.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cadence_core::capability::Namespaces;
use cadence_core::oracle::{EmbeddingOracle, OracleError};
use cadence_core::retry::{retry_call, RetryError, RetryPolicy};
use cadence_core::store::{StoreError, VectorIndex, VectorRecord};

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("embedding failed: {0}")]
    Oracle(#[from] RetryError<OracleError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("embedding oracle returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },
}

/// A style blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintEntry {
    pub id: String,
    /// Text embedded for retrieval, e.g. "A blueprint for suspenseful narratives".
    pub description: String,
    /// Stored verbatim when a string, JSON-encoded otherwise.
    pub blueprint: Value,
}

impl BlueprintEntry {
    pub fn blueprint_json(&self) -> String {
        match &self.blueprint {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// A source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub source: String,
    pub text: String,
}

/// Everything to seed into one index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub blueprints: Vec<BlueprintEntry>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

impl Corpus {
    /// Load a corpus JSON file (`{"blueprints": [...], "documents": [...]}`).
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let content = read_file(path)?;
        serde_json::from_str(&content).map_err(|e| IngestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Load a JSON list of blueprints.
pub fn load_blueprints(path: &Path) -> Result<Vec<BlueprintEntry>, IngestError> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| IngestError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load every `.txt` / `.md` file of a directory, ordered by file name.
///
/// The file name becomes the document's `source`.
pub fn load_documents(dir: &Path) -> Result<Vec<DocumentEntry>, IngestError> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| IngestError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_document = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_document {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let text = read_file(&path)?;
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(DocumentEntry { source, text })
        })
        .collect()
}

fn read_file(path: &Path) -> Result<String, IngestError> {
    fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split `text` into windows of `chunk_size` words, consecutive windows
/// sharing `overlap` words.
///
/// The unit is a whitespace-separated word, not a tokenizer token: the
/// 400/50 defaults measure words, so windows run longer than 400 model
/// tokens. Punctuation stays attached to its word. Newlines count as word
/// breaks. A window starts every
/// `chunk_size - overlap` words, so the tail of a document may appear in
/// more than one chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let stride = chunk_size - overlap.min(chunk_size - 1);
    let words: Vec<&str> = text.split_whitespace().collect();

    (0..words.len())
        .step_by(stride)
        .map(|start| {
            let end = (start + chunk_size).min(words.len());
            words[start..end].join(" ")
        })
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Counts written by one ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub blueprints: usize,
    pub chunks: usize,
}

/// Embeds and upserts blueprints and documents into a vector index
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingOracle>,
    embedding_model: String,
    namespaces: Namespaces,
    retry: RetryPolicy,
    cancellation: CancellationToken,
    chunk_size: usize,
    overlap: usize,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn EmbeddingOracle>, embedding_model: impl Into<String>) -> Self {
        Self {
            embedder,
            embedding_model: embedding_model.into(),
            namespaces: Namespaces::default(),
            retry: RetryPolicy::default(),
            cancellation: CancellationToken::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn ingest_corpus(
        &self,
        index: &dyn VectorIndex,
        corpus: &Corpus,
    ) -> Result<IngestReport, IngestError> {
        Ok(IngestReport {
            blueprints: self.ingest_blueprints(index, &corpus.blueprints).await?,
            chunks: self.ingest_documents(index, &corpus.documents).await?,
        })
    }

    /// Upsert blueprints into the context namespace.
    pub async fn ingest_blueprints(
        &self,
        index: &dyn VectorIndex,
        blueprints: &[BlueprintEntry],
    ) -> Result<usize, IngestError> {
        if blueprints.is_empty() {
            return Ok(0);
        }
        let descriptions: Vec<String> = blueprints
            .iter()
            .map(|bp| bp.description.clone())
            .collect();
        let vectors = self.embed_all(&descriptions).await?;

        let records = blueprints
            .iter()
            .zip(vectors)
            .map(|(bp, values)| {
                VectorRecord::new(bp.id.clone(), values)
                    .with_metadata("description", bp.description.clone())
                    .with_metadata("blueprint_json", bp.blueprint_json())
            })
            .collect();
        let written = index.upsert(&self.namespaces.context, records).await?;
        info!(
            index = %index.name(),
            namespace = %self.namespaces.context,
            written,
            "blueprints ingested"
        );
        Ok(written)
    }

    /// Chunk documents and upsert the chunks into the knowledge namespace.
    ///
    /// Chunk ids run `knowledge_chunk_0`, `knowledge_chunk_1`, ... across
    /// all documents of the call.
    pub async fn ingest_documents(
        &self,
        index: &dyn VectorIndex,
        documents: &[DocumentEntry],
    ) -> Result<usize, IngestError> {
        let mut chunks: Vec<(String, &str)> = Vec::new();
        for document in documents {
            let pieces = chunk_text(&document.text, self.chunk_size, self.overlap);
            debug!(source = %document.source, chunks = pieces.len(), "document chunked");
            chunks.extend(pieces.into_iter().map(|piece| (piece, document.source.as_str())));
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, ((text, source), values))| {
                VectorRecord::new(format!("knowledge_chunk_{}", i), values)
                    .with_metadata("text", text)
                    .with_metadata("source", source)
            })
            .collect();
        let written = index.upsert(&self.namespaces.knowledge, records).await?;
        info!(
            index = %index.name(),
            namespace = %self.namespaces.knowledge,
            documents = documents.len(),
            written,
            "documents ingested"
        );
        Ok(written)
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let batch: Vec<String> = batch.iter().map(|text| text.replace('\n', " ")).collect();
            debug!(batch = batch_no, size = batch.len(), "embedding batch");
            let embedded = retry_call(&self.retry, &self.cancellation, "ingest.embed", || {
                let embedder = Arc::clone(&self.embedder);
                let batch = batch.clone();
                let model = self.embedding_model.clone();
                async move { embedder.embed(&batch, &model).await }
            })
            .await?;
            if embedded.len() != batch.len() {
                return Err(IngestError::EmbeddingCount {
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}
