//! Pinecone [`VectorStore`] backend.
//!
//! Talks to a serverless index over its data-plane REST API:
//! `POST {host}/query` and `POST {host}/vectors/upsert`, authenticated
//! with the `Api-Key` header. Native filters render to Pinecone's
//! metadata-filter JSON via [`FilterExpr::to_value`].
//!
//! Transient errors (HTTP 429, 5xx, network) retry with the same
//! exponential backoff schedule the embedding client uses; other client
//! errors fail immediately.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::FilterExpr;

use super::{ScoredMatch, VectorRecord, VectorStore};

pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    api_key: String,
    max_retries: u32,
}

impl PineconeStore {
    /// `host` is the index's data-plane URL, e.g.
    /// `https://my-index-abc123.svc.aped-4627-b74a.pinecone.io`.
    pub fn new(host: String, api_key: String, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.host, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
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
                            Some(anyhow!("Pinecone API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Pinecone API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Pinecone request failed after retries")))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<ScoredMatch>> {
        let mut body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(expr) = filter {
            body["filter"] = expr.to_value();
        }

        let json = self.post_json("/query", &body).await?;
        parse_query_response(&json)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let vectors: Vec<Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "values": r.vector,
                    "metadata": r.metadata,
                })
            })
            .collect();

        self.post_json("/vectors/upsert", &serde_json::json!({ "vectors": vectors }))
            .await?;
        Ok(())
    }
}

fn parse_query_response(json: &Value) -> Result<Vec<ScoredMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow!("Invalid Pinecone response: missing matches array"))?;

    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        let id = m
            .get("id")
            .and_then(|i| i.as_str())
            .ok_or_else(|| anyhow!("Invalid Pinecone response: match missing id"))?;
        let score = m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
        let metadata = m
            .get("metadata")
            .and_then(|md| md.as_object())
            .cloned()
            .unwrap_or_else(Map::new);
        out.push(ScoredMatch {
            id: id.to_string(),
            score,
            metadata,
        });
    }
    Ok(out)
}
