//! Answer generation backed by a chat-completion API.
//!
//! The generator receives the fused evidence as page-labeled context
//! blocks and is instructed to answer only from that context, citing
//! pages. Uses the same retry/backoff policy as the embedding client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::answer::format_evidence;
use crate::config::GenerationConfig;
use crate::models::FusedHit;
use crate::traits::{Answer, Generator, Usage};

const SYSTEM_PROMPT: &str = "You are a legal research assistant. Answer the question using only \
the provided context. Cite the page labels (e.g. [page 6]) that support each statement. If the \
context does not contain the answer, say so explicitly.";

const MAX_RETRIES: u32 = 5;

/// Build the generator named by the configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(ChatGenerator::new(config)?)),
        "disabled" => bail!(
            "Generation provider is disabled. Set generation.provider = \"openai\" to enable \
             question answering."
        ),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Generator backed by the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct ChatGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ChatGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn request(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, question: &str, evidence: &[FusedHit]) -> Result<Answer> {
        let context = format_evidence(evidence);
        let user_message = format!("Context:\n{}\n\nQuestion: {}", context, question);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_message },
            ],
            "temperature": 0.0,
        });

        let json = self.request(&body).await?;
        parse_chat_response(&json)
    }
}

/// Extract the answer text and token usage from a chat completion response.
fn parse_chat_response(json: &serde_json::Value) -> Result<Answer> {
    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))?
        .to_string();

    let usage = json.get("usage").map(|u| Usage {
        input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        output_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
    });

    Ok(Answer { text, usage })
}
