//! Pinecone vector store client.
//!
//! Talks to the Pinecone REST API directly: the control plane for index
//! provisioning, the index's data-plane host for upsert and query.
//! Requires the `PINECONE_API_KEY` environment variable.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::VectorStoreConfig;
use crate::models::{ChunkMetadata, RetrievalHit};
use crate::traits::{Metric, VectorRecord, VectorStore};

const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    index: String,
    host: String,
    region: String,
}

impl PineconeStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let host = config
            .host
            .clone()
            .ok_or_else(|| anyhow::anyhow!("vector_store.host required for Pinecone backend"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            index: config.index.clone(),
            host: host.trim_end_matches('/').to_string(),
            region: config.region.clone(),
        })
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn ensure_index(&self, dims: usize, metric: Metric) -> Result<()> {
        let describe = self
            .client
            .get(format!("{}/indexes/{}", CONTROL_PLANE, self.index))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .context("Failed to reach Pinecone control plane")?;

        if describe.status().is_success() {
            return Ok(());
        }
        if describe.status().as_u16() != 404 {
            let body = describe.text().await.unwrap_or_default();
            bail!("Pinecone describe index failed: {}", body);
        }

        let body = serde_json::json!({
            "name": self.index,
            "dimension": dims,
            "metric": metric.as_str(),
            "spec": {
                "serverless": { "cloud": "aws", "region": self.region }
            }
        });

        let resp = self
            .client
            .post(format!("{}/indexes", CONTROL_PLANE))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Pinecone control plane")?;

        // 409 means another caller created it first, which is fine.
        if !resp.status().is_success() && resp.status().as_u16() != 409 {
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone create index failed: {}", body);
        }

        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "values": r.vector,
                    "metadata": r.metadata,
                })
            })
            .collect();

        let resp = self
            .client
            .post(self.data_url("vectors/upsert"))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&serde_json::json!({ "vectors": vectors }))
            .send()
            .await
            .context("Failed to reach Pinecone index")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone upsert failed ({}): {}", status, body);
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });

        let resp = self
            .client
            .post(self.data_url("query"))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Pinecone index")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone query failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        parse_query_response(&json)
    }
}

/// Parse the `matches` array of a Pinecone query response.
fn parse_query_response(json: &serde_json::Value) -> Result<Vec<RetrievalHit>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: missing matches array"))?;

    let mut hits = Vec::with_capacity(matches.len());
    for m in matches {
        let id = m
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone match: missing id"))?
            .to_string();
        let score = m.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let metadata: ChunkMetadata = m
            .get("metadata")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .context("Invalid Pinecone match metadata")?
            .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone match: missing metadata"))?;

        hits.push(RetrievalHit {
            id,
            score,
            metadata,
        });
    }

    Ok(hits)
}
