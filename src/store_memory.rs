//! In-memory store and embedder doubles.
//!
//! Functional stand-ins for the HTTP-backed implementations, used by the
//! integration tests and available for local experimentation. They honor
//! the same contracts: upserts overwrite by identifier, vector queries
//! rank by cosine similarity, and keyword search mimics the field boosts
//! of the real lexical backend (`article^4`, `title^3`, body unboosted).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkMetadata, FusedHit, RetrievalHit};
use crate::traits::{
    Answer, Embedder, Generator, KeywordRecord, KeywordStore, Metric, Usage, VectorRecord,
    VectorStore,
};

/// Deterministic embedder that hashes words into dimension buckets.
///
/// Texts sharing words produce similar vectors, so cosine ranking behaves
/// plausibly without a model. Identical input always yields an identical
/// vector, which the idempotent re-ingestion contract depends on.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dims;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Brute-force cosine-similarity vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: Mutex<HashMap<String, VectorRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_index(&self, _dims: usize, _metric: Metric) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut map = self.records.lock().unwrap();
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>> {
        let map = self.records.lock().unwrap();
        let mut hits: Vec<RetrievalHit> = map
            .values()
            .map(|r| RetrievalHit {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.vector) as f64,
                metadata: r.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Term-frequency keyword store with the lexical backend's field boosts.
#[derive(Default)]
pub struct MemoryKeywordStore {
    records: Mutex<HashMap<String, KeywordRecord>>,
}

impl MemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn count_term(haystack: &str, term: &str) -> f64 {
    haystack
        .split_whitespace()
        .filter(|word| word.trim_matches(|c: char| !c.is_alphanumeric()) == term)
        .count() as f64
}

#[async_trait]
impl KeywordStore for MemoryKeywordStore {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk_upsert(&self, records: &[KeywordRecord]) -> Result<()> {
        let mut map = self.records.lock().unwrap();
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let map = self.records.lock().unwrap();
        let mut hits: Vec<RetrievalHit> = map
            .values()
            .filter_map(|record| {
                let article = record
                    .article
                    .as_deref()
                    .unwrap_or("")
                    .replace('_', " ");
                let mut score = 0.0;
                for term in &terms {
                    score += 4.0 * count_term(&article, term);
                    score += 3.0 * count_term(&record.title.to_lowercase(), term);
                    score += count_term(&record.text.to_lowercase(), term);
                }
                if score <= 0.0 {
                    return None;
                }
                Some(RetrievalHit {
                    id: record.id.clone(),
                    score,
                    metadata: ChunkMetadata {
                        source_id: record.source_id.clone(),
                        page: record.page,
                        part: record.part.clone(),
                        text: record.title.clone(),
                        token_count: record.token_count,
                    },
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Generator double that echoes a fixed template instead of calling a model.
///
/// The answer lists the page labels it was given, so tests can assert the
/// evidence actually reached the generator.
pub struct StaticGenerator;

#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(&self, _question: &str, evidence: &[FusedHit]) -> Result<Answer> {
        let pages: Vec<String> = evidence
            .iter()
            .map(|h| format!("[page {}]", h.metadata.page))
            .collect();
        Ok(Answer {
            text: format!("Based on {}.", pages.join(", ")),
            usage: Some(Usage {
                input_tokens: 0,
                output_tokens: 0,
                total_tokens: 0,
            }),
        })
    }
}
