//! Core data models used throughout Lexfuse.
//!
//! These types represent the chunks, per-backend hits, and fused results
//! that flow through the ingestion and retrieval pipeline. A chunk's
//! identifier is the join key across both backing stores, so it must be
//! produced identically on the vector and keyword paths.

use serde::{Deserialize, Serialize};

/// A bounded-length, identifiable span of document text prepared for indexing.
///
/// Chunks are created once per ingested document and never mutated;
/// re-ingesting the same document overwrites prior entries by identifier
/// (upsert semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier of the originating document (filename or equivalent).
    pub source_id: String,
    /// 1-based page index. Whole-document inputs collapse to page 1.
    pub page: usize,
    /// Ordinal label within the page: `batch_0`, `batch_1`, ...
    pub part: String,
    /// Normalized, whitespace-collapsed, lower-cased text.
    pub text: String,
    /// Length under the embedding model's tokenizer. Used only for
    /// chunk-size policy, not for identity.
    pub token_count: usize,
}

impl Chunk {
    /// Globally unique identifier: `{source_id}_p{page}_{part}`.
    ///
    /// Both stores are keyed on this string; fusion joins result sets on it.
    pub fn id(&self) -> String {
        format!("{}_p{}_{}", self.source_id, self.page, self.part)
    }

    /// Metadata payload written to both stores alongside the chunk.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source_id: self.source_id.clone(),
            page: self.page,
            part: self.part.clone(),
            text: self.text.clone(),
            token_count: self.token_count,
        }
    }
}

/// Chunk fields carried back by either store with a retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_id: String,
    pub page: usize,
    pub part: String,
    pub text: String,
    pub token_count: usize,
}

/// Result of a single-backend query.
///
/// The score scale is backend-specific: cosine similarity in `[-1, 1]` for
/// vector search, an unbounded relevance score for keyword search. Scores
/// are never compared across backends without normalization.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub id: String,
    pub score: f64,
    pub metadata: ChunkMetadata,
}

/// Which backend produced a hit.
///
/// Kept as an explicit tag so metadata precedence during fusion (vector
/// preferred over keyword) is a testable rule rather than incidental
/// map ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Vector,
    Keyword,
}

/// A merged evidence item produced by the fusion engine.
///
/// Ephemeral: created per query and discarded after the answer is generated.
#[derive(Debug, Clone, Serialize)]
pub struct FusedHit {
    pub id: String,
    pub fused_score: f64,
    pub source: HitSource,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
}
