//! Elasticsearch keyword store client.
//!
//! Lexical backend over the Elasticsearch REST API: explicit index
//! mappings, `_bulk` upserts keyed on chunk identifier, and a
//! `multi_match` query with field boosts (`article^4`, `title^3`, body
//! text unboosted) so structural citations outrank body mentions.
//!
//! Authenticates with the `ELASTIC_API_KEY` environment variable when it
//! is set; otherwise connects unauthenticated (local development).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::KeywordStoreConfig;
use crate::models::{ChunkMetadata, RetrievalHit};
use crate::traits::{KeywordRecord, KeywordStore};

pub struct ElasticStore {
    client: reqwest::Client,
    url: String,
    index: String,
    api_key: Option<String>,
}

impl ElasticStore {
    pub fn new(config: &KeywordStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key: std::env::var("ELASTIC_API_KEY").ok(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{}", self.url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("ApiKey {}", key));
        }
        builder
    }
}

#[async_trait]
impl KeywordStore for ElasticStore {
    async fn ensure_index(&self) -> Result<()> {
        let exists = self
            .request(reqwest::Method::HEAD, &format!("/{}", self.index))
            .send()
            .await
            .context("Failed to reach Elasticsearch")?;

        if exists.status().is_success() {
            return Ok(());
        }

        let mappings = serde_json::json!({
            "mappings": {
                "properties": {
                    "text":        { "type": "text" },
                    "title":       { "type": "text" },
                    "article":     { "type": "text" },
                    "source_id":   { "type": "keyword" },
                    "page":        { "type": "integer" },
                    "part":        { "type": "keyword" },
                    "token_count": { "type": "integer" }
                }
            }
        });

        let resp = self
            .request(reqwest::Method::PUT, &format!("/{}", self.index))
            .json(&mappings)
            .send()
            .await
            .context("Failed to reach Elasticsearch")?;

        if resp.status().is_success() {
            return Ok(());
        }

        // Lost a create race: another caller made the index first.
        let body = resp.text().await.unwrap_or_default();
        if body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        bail!("Elasticsearch create index failed: {}", body);
    }

    async fn bulk_upsert(&self, records: &[KeywordRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for record in records {
            let action = serde_json::json!({
                "index": { "_index": self.index, "_id": record.id }
            });
            let doc = serde_json::json!({
                "text": record.text,
                "title": record.title,
                "article": record.article,
                "source_id": record.source_id,
                "page": record.page,
                "part": record.part,
                "token_count": record.token_count,
            });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&doc.to_string());
            body.push('\n');
        }

        let resp = self
            .request(reqwest::Method::POST, "/_bulk")
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("Failed to reach Elasticsearch")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Elasticsearch bulk upsert failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        if json.get("errors").and_then(|e| e.as_bool()).unwrap_or(false) {
            bail!("Elasticsearch bulk upsert reported per-item errors");
        }

        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        let body = serde_json::json!({
            "size": top_k,
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title^3", "article^4", "text"]
                }
            }
        });

        let resp = self
            .request(reqwest::Method::POST, &format!("/{}/_search", self.index))
            .json(&body)
            .send()
            .await
            .context("Failed to reach Elasticsearch")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Elasticsearch search failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        parse_search_response(&json)
    }
}

/// Parse `hits.hits[]` of a search response.
///
/// The lexical path carries back the truncated title as its text excerpt;
/// fusion prefers vector-side metadata (full chunk text) when both
/// backends return the same identifier.
fn parse_search_response(json: &serde_json::Value) -> Result<Vec<RetrievalHit>> {
    let raw_hits = json
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch response: missing hits"))?;

    let mut hits = Vec::with_capacity(raw_hits.len());
    for hit in raw_hits {
        let id = hit
            .get("_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch hit: missing _id"))?
            .to_string();
        let score = hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let source = hit
            .get("_source")
            .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch hit: missing _source"))?;

        let metadata = ChunkMetadata {
            source_id: source
                .get("source_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            page: source.get("page").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            part: source
                .get("part")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            text: source
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            token_count: source
                .get("token_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
        };

        hits.push(RetrievalHit {
            id,
            score,
            metadata,
        });
    }

    Ok(hits)
}
