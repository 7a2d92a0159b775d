//! Hybrid retrieval fusion engine.
//!
//! Issues parallel retrieval requests to the vector and keyword backends,
//! normalizes each result set's scores independently, linearly combines
//! them by chunk identifier, and returns the top-k merged evidence items.
//!
//! # Algorithm
//!
//! 1. Query both backends concurrently: vector top-N (embed the query
//!    first), keyword top-M. A failed backend degrades to an empty set;
//!    both failing is a hard error, so connectivity failure stays distinct
//!    from a legitimate "no evidence found" empty result.
//! 2. Term-boost vector hits whose text contains an extracted query term,
//!    before normalization. Exact-citation recall is what embeddings
//!    under-weight, so citation terms carry the larger bonus.
//! 3. Normalize each set by dividing by its maximum (anchored at zero).
//! 4. Merge over the union of identifiers:
//!    `fused = α × vector + (1 - α) × keyword`, absent backend = 0.
//! 5. Metadata precedence: vector hit preferred when both returned the id
//!    (it always carries the full chunk text; the keyword backend may
//!    carry a truncated title field).
//! 6. Sort by fused score descending, identifier ascending on ties.
//! 7. Truncate to `k`.
//!
//! The engine is stateless across calls: each [`FusionEngine::fuse`]
//! invocation is an independent transaction over two live backend queries,
//! with no caching and no carried-over ranking state.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::RetrievalConfig;
use crate::models::{FusedHit, HitSource, RetrievalHit};
use crate::terms::{extract_terms, QueryTerms};
use crate::traits::{Embedder, KeywordStore, VectorStore};

/// Fuses vector and keyword retrieval into one ranked evidence list.
///
/// Explicitly constructed with its capabilities rather than reaching for
/// process-wide singletons, so tests can substitute in-memory doubles.
pub struct FusionEngine {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    params: RetrievalConfig,
}

impl FusionEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorStore>,
        keyword: Arc<dyn KeywordStore>,
        params: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vector,
            keyword,
            params,
        }
    }

    /// The retrieval parameters this engine was built with.
    pub fn params(&self) -> &RetrievalConfig {
        &self.params
    }

    /// Run a fused retrieval for `query`, returning at most
    /// `params.final_k` evidence items, best first.
    ///
    /// An empty result means no backend surfaced any evidence; a backend
    /// connectivity failure on both sides is an error instead.
    pub async fn fuse(&self, query: &str) -> Result<Vec<FusedHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let (vector_result, keyword_result) = tokio::join!(
            self.vector_hits(query),
            self.keyword.search(query, self.params.candidate_k_keyword),
        );

        // Partial-failure tolerance: one backend failing degrades to an
        // empty contribution. Both failing is a connectivity error.
        let (vector_hits, keyword_hits) = match (vector_result, keyword_result) {
            (Err(v), Err(k)) => {
                return Err(v
                    .context(format!("keyword backend also failed: {k:#}"))
                    .context("both retrieval backends failed"));
            }
            (Ok(v), Err(_)) => (v, Vec::new()),
            (Err(_), Ok(k)) => (Vec::new(), k),
            (Ok(v), Ok(k)) => (v, k),
        };

        let terms = extract_terms(query);
        let mut vector_hits = vector_hits;
        apply_term_boost(
            &mut vector_hits,
            &terms,
            self.params.citation_boost,
            self.params.content_word_boost,
        );

        let fused = merge(vector_hits, keyword_hits, self.params.alpha);
        Ok(fused.into_iter().take(self.params.final_k).collect())
    }

    async fn vector_hits(&self, query: &str) -> Result<Vec<RetrievalHit>> {
        let query_vec = self
            .embedder
            .embed(query)
            .await
            .context("failed to embed query")?;
        self.vector
            .query(&query_vec, self.params.candidate_k_vector)
            .await
    }
}

/// Add a raw-score bonus to vector hits whose text contains an extracted
/// query term. Applied before normalization so the bonus participates in
/// the in-set scale.
pub fn apply_term_boost(
    hits: &mut [RetrievalHit],
    terms: &QueryTerms,
    citation_boost: f64,
    content_word_boost: f64,
) {
    if terms.is_empty() {
        return;
    }
    for hit in hits.iter_mut() {
        for term in &terms.citations {
            if hit.metadata.text.contains(term.as_str()) {
                hit.score += citation_boost;
            }
        }
        for word in &terms.content_words {
            if hit.metadata.text.contains(word.as_str()) {
                hit.score += content_word_boost;
            }
        }
    }
}

/// Normalize a score set in place by dividing by its maximum, so scores
/// are comparable in-set on a `[0, 1]` scale.
///
/// Anchored at zero rather than true min-max. When the set is empty or the
/// maximum is not positive, normalization is a no-op (no division by zero).
pub fn normalize_by_max(scores: &mut HashMap<String, f64>) {
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return;
    }
    for v in scores.values_mut() {
        *v /= max;
    }
}

/// Merge two normalized hit sets over the union of their identifiers.
///
/// An identifier present in only one backend is not penalized beyond the
/// implicit 0 from the missing side — either backend alone can surface
/// evidence the other missed. Results are sorted by fused score
/// descending, identifier ascending on ties (deterministic secondary key).
pub fn merge(
    vector_hits: Vec<RetrievalHit>,
    keyword_hits: Vec<RetrievalHit>,
    alpha: f64,
) -> Vec<FusedHit> {
    let mut vector_scores: HashMap<String, f64> = vector_hits
        .iter()
        .map(|h| (h.id.clone(), h.score))
        .collect();
    let mut keyword_scores: HashMap<String, f64> = keyword_hits
        .iter()
        .map(|h| (h.id.clone(), h.score))
        .collect();

    normalize_by_max(&mut vector_scores);
    normalize_by_max(&mut keyword_scores);

    let vector_map: HashMap<&str, &RetrievalHit> =
        vector_hits.iter().map(|h| (h.id.as_str(), h)).collect();
    let keyword_map: HashMap<&str, &RetrievalHit> =
        keyword_hits.iter().map(|h| (h.id.as_str(), h)).collect();

    let mut all_ids: Vec<&String> = vector_scores.keys().collect();
    for id in keyword_scores.keys() {
        if !vector_scores.contains_key(id) {
            all_ids.push(id);
        }
    }

    let mut fused: Vec<FusedHit> = all_ids
        .into_iter()
        .map(|id| {
            let v = vector_scores.get(id).copied().unwrap_or(0.0);
            let k = keyword_scores.get(id).copied().unwrap_or(0.0);
            let fused_score = alpha * v + (1.0 - alpha) * k;

            let (hit, source) = match vector_map.get(id.as_str()) {
                Some(hit) => (*hit, HitSource::Vector),
                None => (
                    *keyword_map
                        .get(id.as_str())
                        .expect("id came from one of the two maps"),
                    HitSource::Keyword,
                ),
            };

            FusedHit {
                id: id.clone(),
                fused_score,
                source,
                metadata: hit.metadata.clone(),
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(id: &str, score: f64, text: &str) -> RetrievalHit {
        RetrievalHit {
            id: id.to_string(),
            score,
            metadata: ChunkMetadata {
                source_id: "doc".to_string(),
                page: 1,
                part: "batch_0".to_string(),
                text: text.to_string(),
                token_count: text.split_whitespace().count(),
            },
        }
    }

    fn scores(ids_scores: &[(&str, f64)]) -> HashMap<String, f64> {
        ids_scores
            .iter()
            .map(|(id, s)| (id.to_string(), *s))
            .collect()
    }

    #[test]
    fn test_normalize_divides_by_max() {
        let mut s = scores(&[("a", 10.0), ("b", 5.0), ("c", 0.0)]);
        normalize_by_max(&mut s);
        assert!((s["a"] - 1.0).abs() < 1e-12);
        assert!((s["b"] - 0.5).abs() < 1e-12);
        assert!((s["c"] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_max_is_noop() {
        let mut s = scores(&[("a", 0.0), ("b", 0.0)]);
        normalize_by_max(&mut s);
        assert_eq!(s["a"], 0.0);
        assert_eq!(s["b"], 0.0);
    }

    #[test]
    fn test_normalize_empty_is_noop() {
        let mut s: HashMap<String, f64> = HashMap::new();
        normalize_by_max(&mut s);
        assert!(s.is_empty());
    }

    #[test]
    fn test_merge_alpha_one_matches_vector_order() {
        let vector = vec![hit("v1", 0.9, "alpha"), hit("v2", 0.4, "beta")];
        let keyword = vec![hit("v2", 12.0, "beta"), hit("k1", 8.0, "gamma")];
        let fused = merge(vector, keyword, 1.0);
        // Keyword-only ids collapse to score 0 and sort last.
        assert_eq!(fused[0].id, "v1");
        assert_eq!(fused[1].id, "v2");
        assert_eq!(fused[2].id, "k1");
        assert_eq!(fused[2].fused_score, 0.0);
    }

    #[test]
    fn test_merge_alpha_zero_matches_keyword_order() {
        let vector = vec![hit("v1", 0.9, "alpha"), hit("v2", 0.4, "beta")];
        let keyword = vec![hit("v2", 12.0, "beta"), hit("k1", 8.0, "gamma")];
        let fused = merge(vector, keyword, 0.0);
        assert_eq!(fused[0].id, "v2");
        assert_eq!(fused[1].id, "k1");
        assert_eq!(fused[2].id, "v1");
    }

    #[test]
    fn test_merge_union_keeps_keyword_only_ids() {
        let vector = vec![hit("v1", 0.9, "alpha")];
        let keyword = vec![hit("k1", 7.0, "gamma")];
        let fused = merge(vector, keyword, 0.6);
        let ids: Vec<&str> = fused.iter().map(|h| h.id.as_str()).collect();
        assert!(ids.contains(&"k1"));
        // k1: 0.6*0 + 0.4*1.0 = 0.4
        let k1 = fused.iter().find(|h| h.id == "k1").unwrap();
        assert!((k1.fused_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_merge_metadata_prefers_vector() {
        let vector = vec![hit("x", 0.9, "full chunk text from the vector store")];
        let keyword = vec![hit("x", 7.0, "truncated title")];
        let fused = merge(vector, keyword, 0.5);
        assert_eq!(fused[0].source, HitSource::Vector);
        assert_eq!(
            fused[0].metadata.text,
            "full chunk text from the vector store"
        );
    }

    #[test]
    fn test_merge_tie_breaks_by_id_ascending() {
        let vector = vec![hit("bbb", 0.5, "x"), hit("aaa", 0.5, "y")];
        let fused = merge(vector, Vec::new(), 1.0);
        assert_eq!(fused[0].id, "aaa");
        assert_eq!(fused[1].id, "bbb");
    }

    #[test]
    fn test_term_boost_citation_larger_than_content_word() {
        let terms = extract_terms("what does article 14 say about termination");
        let mut hits = vec![
            hit("cited", 0.5, "article 14 governs termination of the lease"),
            hit("plain", 0.5, "general provisions on rent"),
        ];
        apply_term_boost(&mut hits, &terms, 0.25, 0.05);
        // cited: +0.25 for "article 14", +0.05 each for matching content words
        assert!(hits[0].score > 0.75);
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn test_term_boost_no_terms_is_noop() {
        let terms = extract_terms("");
        let mut hits = vec![hit("a", 0.5, "anything")];
        apply_term_boost(&mut hits, &terms, 0.25, 0.05);
        assert_eq!(hits[0].score, 0.5);
    }
}
