//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: extraction → normalization → segmentation →
//! embedding → dual upsert (vector store + keyword store). Upserts are
//! chunked into bounded-size batches to respect backend payload limits;
//! a failed batch aborts only that batch, never the whole ingestion.
//!
//! Chunk identifiers are deterministic, so re-ingesting the same document
//! overwrites prior entries via upsert rather than appending duplicates —
//! no locking is needed for concurrent re-ingestion.

use std::sync::Arc;

use anyhow::Result;

use crate::config::{SegmenterConfig, VectorStoreConfig};
use crate::extract::DocumentText;
use crate::models::Chunk;
use crate::normalize::normalize;
use crate::segment::chunk_page;
use crate::terms::extract_article;
use crate::traits::{Embedder, KeywordRecord, KeywordStore, VectorRecord, VectorStore};

/// Counters reported after an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub pages_seen: usize,
    pub pages_skipped: usize,
    pub chunks: usize,
    pub vector_batches: usize,
    pub vector_batches_failed: usize,
    pub keyword_batches: usize,
    pub keyword_batches_failed: usize,
    /// Per-batch error messages, for caller-side retry or reporting.
    pub batch_errors: Vec<String>,
}

impl IngestReport {
    pub fn fully_indexed(&self) -> bool {
        self.vector_batches_failed == 0 && self.keyword_batches_failed == 0
    }
}

/// Routes chunks into both retrieval backends.
pub struct DualIndexer {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    vector_batch_size: usize,
    keyword_batch_size: usize,
}

impl DualIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorStore>,
        keyword: Arc<dyn KeywordStore>,
        vector_cfg: &VectorStoreConfig,
        keyword_batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            vector,
            keyword,
            vector_batch_size: vector_cfg.batch_size,
            keyword_batch_size,
        }
    }

    /// Ingest one extracted document under `source_id`.
    ///
    /// Paged input keeps 1-based page numbers and drops front-matter pages
    /// below `segmenter.skip_pages`; whole-document input is labeled
    /// page 1 with no skip. The two modes are preserved as distinct
    /// behaviors, matching their different labeling conventions.
    pub async fn ingest(
        &self,
        source_id: &str,
        text: &DocumentText,
        segmenter: &SegmenterConfig,
    ) -> Result<IngestReport> {
        let chunks = self.build_chunks(source_id, text, segmenter)?;

        let mut report = IngestReport {
            chunks: chunks.len(),
            ..Default::default()
        };
        match text {
            DocumentText::Paged(pages) => {
                report.pages_seen = pages.len();
                report.pages_skipped = pages.len().min(segmenter.skip_pages);
            }
            DocumentText::Whole(_) => {
                report.pages_seen = 1;
            }
        }

        if chunks.is_empty() {
            return Ok(report);
        }

        self.index_vectors(&chunks, &mut report).await;
        self.index_keywords(&chunks, &mut report).await;

        Ok(report)
    }

    /// Normalize and segment into labeled chunks, without touching the stores.
    pub fn build_chunks(
        &self,
        source_id: &str,
        text: &DocumentText,
        segmenter: &SegmenterConfig,
    ) -> Result<Vec<Chunk>> {
        let token_len = |t: &str| self.embedder.token_count(t);
        let mut chunks = Vec::new();

        match text {
            DocumentText::Paged(pages) => {
                for (i, raw) in pages.iter().enumerate() {
                    if i < segmenter.skip_pages {
                        continue;
                    }
                    let cleaned = normalize(raw);
                    chunks.extend(chunk_page(
                        source_id,
                        i + 1,
                        &cleaned,
                        segmenter.window_words,
                        segmenter.overlap_words,
                        token_len,
                    )?);
                }
            }
            DocumentText::Whole(body) => {
                let cleaned = normalize(body);
                chunks.extend(chunk_page(
                    source_id,
                    1,
                    &cleaned,
                    segmenter.window_words,
                    segmenter.overlap_words,
                    token_len,
                )?);
            }
        }

        Ok(chunks)
    }

    /// Embed chunks and upsert into the vector store in bounded batches.
    async fn index_vectors(&self, chunks: &[Chunk], report: &mut IngestReport) {
        for batch in chunks.chunks(self.vector_batch_size) {
            report.vector_batches += 1;
            match self.embed_and_upsert(batch).await {
                Ok(()) => {}
                Err(e) => {
                    report.vector_batches_failed += 1;
                    report.batch_errors.push(format!("vector batch: {e:#}"));
                }
            }
        }
    }

    async fn embed_and_upsert(&self, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk.id(),
                vector,
                metadata: chunk.metadata(),
            })
            .collect();

        self.vector.upsert(&records).await
    }

    /// Upsert chunks verbatim into the keyword store in bounded batches,
    /// tagged with the derived article label and truncated title.
    async fn index_keywords(&self, chunks: &[Chunk], report: &mut IngestReport) {
        for batch in chunks.chunks(self.keyword_batch_size) {
            report.keyword_batches += 1;
            let records: Vec<KeywordRecord> = batch.iter().map(keyword_record).collect();
            match self.keyword.bulk_upsert(&records).await {
                Ok(()) => {}
                Err(e) => {
                    report.keyword_batches_failed += 1;
                    report.batch_errors.push(format!("keyword batch: {e:#}"));
                }
            }
        }
    }
}

/// Build the keyword-store fields for a chunk.
pub fn keyword_record(chunk: &Chunk) -> KeywordRecord {
    KeywordRecord {
        id: chunk.id(),
        text: chunk.text.clone(),
        source_id: chunk.source_id.clone(),
        page: chunk.page,
        part: chunk.part.clone(),
        token_count: chunk.token_count,
        article: extract_article(&chunk.text),
        title: chunk.text.chars().take(120).collect(),
    }
}
