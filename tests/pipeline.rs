//! End-to-end pipeline tests over the in-memory backends.
//!
//! Exercises the full flow — extraction shape, segmentation, dual
//! indexing, fused retrieval — the way the CLI wires it, with the
//! HTTP-backed stores replaced by their in-memory doubles.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use lexfuse::answer::{AnswerPipeline, NO_EVIDENCE_ANSWER};
use lexfuse::config::{RetrievalConfig, SegmenterConfig, VectorStoreConfig};
use lexfuse::extract::DocumentText;
use lexfuse::fusion::FusionEngine;
use lexfuse::ingest::{keyword_record, DualIndexer};
use lexfuse::models::{Chunk, HitSource, RetrievalHit};
use lexfuse::store_memory::{HashEmbedder, MemoryKeywordStore, MemoryVectorStore, StaticGenerator};
use lexfuse::traits::{Embedder, KeywordRecord, KeywordStore, Metric, VectorRecord, VectorStore};

fn segmenter() -> SegmenterConfig {
    SegmenterConfig {
        window_words: 300,
        overlap_words: 50,
        skip_pages: 0,
    }
}

fn retrieval(alpha: f64) -> RetrievalConfig {
    RetrievalConfig {
        alpha,
        ..RetrievalConfig::default()
    }
}

struct Fixture {
    embedder: Arc<HashEmbedder>,
    vector: Arc<MemoryVectorStore>,
    keyword: Arc<MemoryKeywordStore>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            embedder: Arc::new(HashEmbedder::new(64)),
            vector: Arc::new(MemoryVectorStore::new()),
            keyword: Arc::new(MemoryKeywordStore::new()),
        }
    }

    fn indexer(&self) -> DualIndexer {
        DualIndexer::new(
            self.embedder.clone(),
            self.vector.clone(),
            self.keyword.clone(),
            &VectorStoreConfig::default(),
            40,
        )
    }

    fn engine(&self, params: RetrievalConfig) -> FusionEngine {
        FusionEngine::new(
            self.embedder.clone(),
            self.vector.clone(),
            self.keyword.clone(),
            params,
        )
    }
}

fn lease_document() -> DocumentText {
    // Page 1 carries the citation; page 2 is topically adjacent filler.
    DocumentText::Paged(vec![
        "Article 14 Termination. Either party may terminate this lease agreement by giving \
         written notice at least sixty days before the end of the current term. Failure to \
         deliver notice renews the lease for another term of equal length."
            .to_string(),
        "General provisions. The tenant shall pay rent monthly in advance. The landlord \
         maintains the premises in habitable condition and may inspect the premises with \
         reasonable advance notice to the tenant during the lease term."
            .to_string(),
    ])
}

#[tokio::test]
async fn test_ingest_then_fused_search_ranks_cited_chunk_first() {
    let fx = Fixture::new();
    let report = fx
        .indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    assert!(report.fully_indexed());
    assert_eq!(report.chunks, 2);
    assert_eq!(fx.vector.len(), 2);
    assert_eq!(fx.keyword.len(), 2);

    let engine = fx.engine(retrieval(0.6));
    let hits = engine
        .fuse("what does article 14 say about termination notice")
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "lease.pdf_p1_batch_0");
    // The winner was present on the vector side, so its metadata carries
    // the full chunk text rather than the keyword index's truncated title.
    assert_eq!(hits[0].source, HitSource::Vector);
    assert!(hits[0].metadata.text.contains("sixty days"));
    assert!(hits[0].metadata.text.chars().count() > 120);
}

#[tokio::test]
async fn test_cited_chunk_outranks_higher_cosine_uncited_chunk() {
    // The adversarial case hybrid fusion exists for: one chunk is closer
    // in embedding space to the query but never names the citation, the
    // other contains the literal "article 14" twice. At default weights
    // the cited chunk must win.
    let fx = Fixture::new();
    let query = "what does article 14 say";

    let cited = Chunk {
        source_id: "lease.pdf".to_string(),
        page: 2,
        part: "batch_0".to_string(),
        text: "article 14 appears twice in this clause article 14 termination provisions"
            .to_string(),
        token_count: 11,
    };
    let uncited = Chunk {
        source_id: "lease.pdf".to_string(),
        page: 1,
        part: "batch_0".to_string(),
        text: "general interpretive provisions of the act".to_string(),
        token_count: 6,
    };

    // Give the uncited chunk a vector identical to the query's embedding
    // (cosine 1.0); the cited chunk gets its own text's embedding.
    let records = vec![
        VectorRecord {
            id: uncited.id(),
            vector: fx.embedder.embed(query).await.unwrap(),
            metadata: uncited.metadata(),
        },
        VectorRecord {
            id: cited.id(),
            vector: fx.embedder.embed(&cited.text).await.unwrap(),
            metadata: cited.metadata(),
        },
    ];
    fx.vector.upsert(&records).await.unwrap();
    fx.keyword
        .bulk_upsert(&[keyword_record(&cited), keyword_record(&uncited)])
        .await
        .unwrap();

    let engine = fx.engine(retrieval(0.6));
    let hits = engine.fuse(query).await.unwrap();

    assert_eq!(hits[0].id, "lease.pdf_p2_batch_0");
    assert!(hits.iter().any(|h| h.id == "lease.pdf_p1_batch_0"));
}

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let fx = Fixture::new();
    let indexer = fx.indexer();

    let first = indexer
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();
    let second = indexer
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    assert_eq!(first.chunks, second.chunks);
    assert_eq!(fx.vector.len(), first.chunks);
    assert_eq!(fx.keyword.len(), first.chunks);
}

#[tokio::test]
async fn test_skip_pages_drops_front_matter() {
    let fx = Fixture::new();
    let pages: Vec<String> = (0..7)
        .map(|i| format!("page {} body text about the agreement terms", i + 1))
        .collect();
    let segmenter = SegmenterConfig {
        window_words: 300,
        overlap_words: 50,
        skip_pages: 5,
    };

    let report = fx
        .indexer()
        .ingest("act.pdf", &DocumentText::Paged(pages), &segmenter)
        .await
        .unwrap();

    assert_eq!(report.pages_seen, 7);
    assert_eq!(report.pages_skipped, 5);
    // Pages 6 and 7 survive, with their real page numbers.
    assert_eq!(report.chunks, 2);
    let engine = fx.engine(retrieval(0.6));
    let hits = engine.fuse("agreement terms").await.unwrap();
    assert!(hits.iter().all(|h| h.metadata.page >= 6));
}

#[tokio::test]
async fn test_alpha_one_is_vector_only_ranking() {
    let fx = Fixture::new();
    fx.indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    let engine = fx.engine(retrieval(1.0));
    let hits = engine.fuse("habitable premises inspection").await.unwrap();

    // Pure semantic weighting: the rent/premises chunk wins on shared words.
    assert_eq!(hits[0].id, "lease.pdf_p2_batch_0");
}

#[tokio::test]
async fn test_alpha_zero_is_keyword_only_ranking() {
    let fx = Fixture::new();
    fx.indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    let engine = fx.engine(retrieval(0.0));
    let hits = engine.fuse("article 14").await.unwrap();

    assert_eq!(hits[0].id, "lease.pdf_p1_batch_0");
}

#[tokio::test]
async fn test_empty_query_returns_no_evidence() {
    let fx = Fixture::new();
    fx.indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    let engine = fx.engine(retrieval(0.6));
    assert!(engine.fuse("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unindexed_corpus_returns_no_evidence() {
    let fx = Fixture::new();
    let engine = fx.engine(retrieval(0.6));
    let hits = engine.fuse("article 14 termination").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_ask_cites_retrieved_pages() {
    let fx = Fixture::new();
    fx.indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    let engine = fx.engine(retrieval(0.6));
    let pipeline = AnswerPipeline::new(Arc::new(StaticGenerator));

    let evidence = engine
        .fuse("what does article 14 say about termination notice")
        .await
        .unwrap();
    let answer = pipeline.answer("termination notice?", &evidence).await.unwrap();

    assert!(answer.text.contains("[page 1]"));
    assert!(answer.usage.is_some());
}

#[tokio::test]
async fn test_ask_without_evidence_skips_generation() {
    let fx = Fixture::new();
    let engine = fx.engine(retrieval(0.6));
    let pipeline = AnswerPipeline::new(Arc::new(StaticGenerator));

    let evidence = engine.fuse("article 99 force majeure").await.unwrap();
    let answer = pipeline.answer("force majeure?", &evidence).await.unwrap();

    assert_eq!(answer.text, NO_EVIDENCE_ANSWER);
    assert!(answer.usage.is_none());
}

struct FailingVectorStore;

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn ensure_index(&self, _dims: usize, _metric: Metric) -> Result<()> {
        anyhow::bail!("vector backend unreachable")
    }
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
        anyhow::bail!("vector backend unreachable")
    }
    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<RetrievalHit>> {
        anyhow::bail!("vector backend unreachable")
    }
}

struct FailingKeywordStore;

#[async_trait]
impl KeywordStore for FailingKeywordStore {
    async fn ensure_index(&self) -> Result<()> {
        anyhow::bail!("keyword backend unreachable")
    }
    async fn bulk_upsert(&self, _records: &[KeywordRecord]) -> Result<()> {
        anyhow::bail!("keyword backend unreachable")
    }
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievalHit>> {
        anyhow::bail!("keyword backend unreachable")
    }
}

#[tokio::test]
async fn test_one_failed_backend_degrades_to_other() {
    let fx = Fixture::new();
    fx.indexer()
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    // Keyword search keeps working when the vector backend is down.
    let engine = FusionEngine::new(
        fx.embedder.clone(),
        Arc::new(FailingVectorStore),
        fx.keyword.clone(),
        retrieval(0.6),
    );
    let hits = engine.fuse("article 14 termination").await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.source == HitSource::Keyword));
}

#[tokio::test]
async fn test_both_failed_backends_is_an_error() {
    let fx = Fixture::new();
    let engine = FusionEngine::new(
        fx.embedder.clone(),
        Arc::new(FailingVectorStore),
        Arc::new(FailingKeywordStore),
        retrieval(0.6),
    );
    let err = engine.fuse("article 14").await.unwrap_err();
    assert!(format!("{err:#}").contains("both retrieval backends failed"));
}

#[tokio::test]
async fn test_failed_ingest_batches_are_counted_not_fatal() {
    let fx = Fixture::new();
    let indexer = DualIndexer::new(
        fx.embedder.clone(),
        Arc::new(FailingVectorStore),
        fx.keyword.clone(),
        &VectorStoreConfig::default(),
        40,
    );

    let report = indexer
        .ingest("lease.pdf", &lease_document(), &segmenter())
        .await
        .unwrap();

    assert!(!report.fully_indexed());
    assert_eq!(report.vector_batches_failed, report.vector_batches);
    assert_eq!(report.keyword_batches_failed, 0);
    // The keyword side was still indexed in full.
    assert_eq!(fx.keyword.len(), report.chunks);
}
