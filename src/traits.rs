//! External capability traits.
//!
//! The embedding model, the two retrieval backends, and the answer
//! generator are collaborators, not part of the core. Each is expressed as
//! an async trait so the pipeline is wired by explicit construction rather
//! than module-level singletons, and so tests can substitute in-memory
//! doubles (see [`crate::store_memory`]).
//!
//! Implementations must be `Send + Sync` to work with the tokio runtime.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkMetadata, RetrievalHit};

/// Distance metric requested when provisioning a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    DotProduct,
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::DotProduct => "dotproduct",
            Metric::Euclidean => "euclidean",
        }
    }
}

/// Embedding capability: text to fixed-dimension vector.
///
/// Must be deterministic for identical input — chunk identifiers are
/// deterministic, and re-ingestion is only idempotent if the vectors
/// written under those identifiers are too.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. The returned vector has [`dims`](Embedder::dims)
    /// elements.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Length of `text` under the embedding model's tokenizer.
    ///
    /// Recorded on each chunk for size policy; the default is the rough
    /// 4-chars-per-token heuristic.
    fn token_count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Vector dimensionality (e.g. 768).
    fn dims(&self) -> usize;
}

/// A chunk record prepared for the vector store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Vector store capability (semantic backend).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index if it does not exist. Idempotent.
    async fn ensure_index(&self, dims: usize, metric: Metric) -> Result<()>;

    /// Insert-or-overwrite a batch of records by identifier.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Top-k nearest records for a query vector, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>>;
}

/// Fields written per chunk to the keyword store.
///
/// `article` is the derived structural label ([`crate::terms::extract_article`]);
/// `title` is a truncated excerpt, weighted above body text at query time.
#[derive(Debug, Clone)]
pub struct KeywordRecord {
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub page: usize,
    pub part: String,
    pub token_count: usize,
    pub article: Option<String>,
    pub title: String,
}

/// Keyword store capability (lexical backend).
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Create the index and field mappings if they do not exist. Idempotent.
    async fn ensure_index(&self) -> Result<()>;

    /// Insert-or-overwrite a batch of records by identifier.
    async fn bulk_upsert(&self, records: &[KeywordRecord]) -> Result<()>;

    /// Top-k relevance-ranked records for a text query, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>>;
}

/// Token usage reported by the generation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// A generated answer. `usage` is `None` when generation failed and the
/// failure was folded into `text` (see [`crate::answer`]).
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Answer-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer to `question` grounded in the fused evidence.
    async fn generate(&self, question: &str, evidence: &[crate::models::FusedHit])
        -> Result<Answer>;
}
