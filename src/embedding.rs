//! Query embedding providers.
//!
//! Defines the [`Embedder`] trait and two implementations:
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with
//!   retry and exponential backoff.
//! - **[`HashEmbedder`]** — a deterministic offline fallback that
//!   derives a pseudo-vector from a SHA-256 digest of the text. It has
//!   no semantic quality; it exists so the pipeline stays usable (and
//!   testable) without network access, where metadata filtering does
//!   the real work.
//!
//! [`embed_query`] runs the configured chain: the API embedder when
//! available, the hash fallback when it fails. [`pad_or_truncate`]
//! reconciles a provider's dimensionality with the index's.
//!
//! # Retry Strategy
//!
//! The OpenAI embedder retries transient errors with exponential
//! backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

/// A source of query embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier used in logs (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed a query through the chain, padding or truncating the result to
/// the index dimensionality. The hash fallback is infallible, so this
/// only errors when no fallback is configured.
pub async fn embed_query(
    primary: Option<&dyn Embedder>,
    fallback: Option<&dyn Embedder>,
    text: &str,
    index_dims: usize,
) -> Result<Vec<f32>> {
    if let Some(embedder) = primary {
        match embedder.embed(text).await {
            Ok(vec) => return Ok(pad_or_truncate(vec, index_dims)),
            Err(e) => {
                warn!(model = embedder.model_name(), error = %e, "embedding failed, using fallback");
            }
        }
    }

    let fallback = fallback.ok_or_else(|| anyhow!("No embedding provider available"))?;
    let vec = fallback.embed(text).await?;
    Ok(pad_or_truncate(vec, index_dims))
}

/// Reconcile an embedding's dimensionality with the index's: truncate a
/// longer vector, zero-pad a shorter one.
pub fn pad_or_truncate(mut vec: Vec<f32>, dims: usize) -> Vec<f32> {
    vec.resize(dims, 0.0);
    vec
}

// ============ OpenAI Embedder ============

/// Embedding provider using the OpenAI API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embedding_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Hash Embedder ============

/// Deterministic offline embedding derived from a SHA-256 digest.
///
/// The digest seeds a repeating byte pattern mapped into `[-0.5, 0.5)`,
/// so equal texts always produce equal vectors.
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
    fn model_name(&self) -> &str {
        "hash-fallback"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let digest = Sha256::digest(text.as_bytes());
        let vec = (0..self.dims)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Perturb repeats so the vector isn't periodic.
                let mixed = byte.wrapping_add((i / digest.len()) as u8);
                (mixed as f32 / 256.0) - 0.5
            })
            .collect();
        Ok(vec)
    }
}
