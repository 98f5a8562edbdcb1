//! OpenAI-compatible [`ModelService`] backend.
//!
//! Talks to the `/chat/completions`, `/embeddings`, and
//! `/audio/transcriptions` endpoints of an OpenAI-compatible API. Any
//! service exposing that surface (OpenAI itself, a local gateway) works —
//! the base URL and model names come from configuration.
//!
//! # Retry Strategy
//!
//! Non-streaming requests use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Streaming chat requests are not retried: a broken stream surfaces as an
//! error on the chunk sequence and the turn is aborted.

use std::pin::Pin;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;

use recall_core::models::ChatMessage;

use crate::config::{EmbeddingConfig, ModelConfig};

use super::{ChunkStream, ModelService};

/// Environment variable holding the API key.
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible backend for all model operations.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model: ModelConfig,
    embedding: EmbeddingConfig,
}

impl OpenAiModel {
    /// Create a backend from configuration.
    ///
    /// Fails when `OPENAI_API_KEY` is not set — every operation needs it.
    pub fn new(model: &ModelConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", API_KEY_ENV))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(model.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.clone(),
            embedding: embedding.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.model.base_url.trim_end_matches('/'), endpoint)
    }

    /// POST a JSON body with the shared retry/backoff policy.
    async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        max_retries: u32,
    ) -> Result<serde_json::Value> {
        let url = self.url(endpoint);
        let mut last_err = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(endpoint, attempt, "retrying model request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
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
                            Some(anyhow::anyhow!("model API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("model API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("model request failed after retries")))
    }
}

/// Pull `choices[0].message.content` out of a chat completion reply.
fn extract_message_content(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid model response: missing message content"))
}

/// Pull `data[0].embedding` out of an embeddings reply.
fn extract_embedding(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|e| e.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Pull the text delta out of one SSE `data:` payload, if it carries one.
fn extract_stream_delta(data: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(data).ok()?;
    json.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[async_trait]
impl ModelService for OpenAiModel {
    async fn describe_image(
        &self,
        image: &[u8],
        mime: &str,
        system: &str,
        user: &str,
    ) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{};base64,{}", mime, encoded);

        let body = serde_json::json!({
            "model": self.model.vision_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": [
                    {"type": "text", "text": user},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]}
            ],
        });

        tracing::debug!(model = %self.model.vision_model, bytes = image.len(), "describing image");
        let json = self
            .post_json("chat/completions", &body, self.model.max_retries)
            .await?;
        extract_message_content(&json)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.embedding.model,
            "input": text,
        });

        let json = self
            .post_json("embeddings", &body, self.embedding.max_retries)
            .await?;
        let vector = extract_embedding(&json)?;

        if vector.len() != self.embedding.dims {
            bail!(
                "embedding dims mismatch: model '{}' returned {}, config says {}",
                self.embedding.model,
                vector.len(),
                self.embedding.dims
            );
        }

        Ok(vector)
    }

    async fn transcribe_audio(&self, audio: &[u8], filename: &str) -> Result<String> {
        let url = self.url("audio/transcriptions");
        let mut last_err = None;

        for attempt in 0..=self.model.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, "retrying transcription request");
                tokio::time::sleep(delay).await;
            }

            // Multipart forms are consumed on send, so rebuild per attempt.
            let part = reqwest::multipart::Part::bytes(audio.to_vec())
                .file_name(filename.to_string());
            let form = reqwest::multipart::Form::new()
                .text("model", self.model.transcription_model.clone())
                .part("file", part);

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .multipart(form)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return json
                            .get("text")
                            .and_then(|t| t.as_str())
                            .map(|s| s.to_string())
                            .context("Invalid transcription response: missing text");
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("model API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("model API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("transcription failed after retries")))
    }

    async fn run_task(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
        });

        let json = self
            .post_json("chat/completions", &body, self.model.max_retries)
            .await?;
        extract_message_content(&json)
    }

    async fn chat_stream(&self, system: &str, messages: &[ChatMessage]) -> Result<ChunkStream> {
        let mut wire_messages = vec![serde_json::json!({"role": "system", "content": system})];
        for m in messages {
            wire_messages.push(serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model.chat_model,
            "messages": wire_messages,
            "stream": true,
        });

        tracing::debug!(model = %self.model.chat_model, turns = messages.len(), "starting chat stream");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            bail!("model API error {}: {}", status, body_text);
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }
}

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    done: bool,
}

/// Convert an SSE byte stream into a stream of text deltas.
///
/// Lines look like `data: {json}` with a final `data: [DONE]`. Deltas are
/// yielded in arrival order; a transport error ends the stream with one
/// `Err` item.
fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> ChunkStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: String::new(),
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                while let Some(line_end) = state.buffer.find('\n') {
                    let line = state.buffer[..line_end].trim().to_string();
                    state.buffer = state.buffer[line_end + 1..].to_string();

                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            return None;
                        }
                        if let Some(delta) = extract_stream_delta(data) {
                            return Some((Ok(delta), state));
                        }
                    }
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(anyhow::anyhow!("chat stream failed: {}", e)),
                            state,
                        ));
                    }
                    None => return None,
                }
            }
        },
    ))
}
