//! Natural-language to filter translation via chat-completion providers.
//!
//! Defines the [`TranslationProvider`] trait and concrete implementations:
//! - **[`OpenRouterProvider`]** — calls the OpenRouter chat completions
//!   API, usable with the free-tier model pool.
//! - **[`OpenAiChatProvider`]** — calls the OpenAI chat completions API.
//!
//! [`FilterTranslator`] runs a sequential provider chain: each provider
//! gets one bounded attempt, the first response that yields a non-empty
//! validated filter wins, and when the whole chain fails the rule-based
//! extractor produces the answer. Translation as a whole never errors —
//! provider failures are logged and absorbed.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::RuleExtractor;
use crate::filter::FilterExpr;
use crate::schema::FilterSchema;
use crate::validate::validate;

/// A chat-completion backend that can attempt a translation.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Identifier used in logs (e.g. `"openrouter/mistral-7b"`).
    fn name(&self) -> String;

    /// Send the prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============ OpenRouter Provider ============

/// Translation provider using the OpenRouter chat completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TranslationProvider for OpenRouterProvider {
    fn name(&self) -> String {
        format!("openrouter/{}", self.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        chat_completion(
            &self.client,
            "https://openrouter.ai/api/v1/chat/completions",
            &self.api_key,
            &self.model,
            prompt,
        )
        .await
    }
}

// ============ OpenAI Provider ============

/// Translation provider using the OpenAI chat completions API.
pub struct OpenAiChatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChatProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TranslationProvider for OpenAiChatProvider {
    fn name(&self) -> String {
        format!("openai/{}", self.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        chat_completion(
            &self.client,
            "https://api.openai.com/v1/chat/completions",
            &self.api_key,
            &self.model,
            prompt,
        )
        .await
    }
}

/// One chat-completion request against an OpenAI-compatible endpoint.
///
/// Low temperature keeps the structured output stable; the token cap is
/// generous for a filter object. Non-2xx responses are errors — the
/// provider chain is the retry mechanism, so there is no backoff here.
async fn chat_completion(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let body = serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.1,
        "max_tokens": 500,
    });

    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("chat API error {}: {}", status, body_text);
    }

    let json: Value = response.json().await?;
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

// ============ Translator ============

/// Sequential translation chain with a deterministic fallback.
pub struct FilterTranslator {
    providers: Vec<Box<dyn TranslationProvider>>,
    extractor: RuleExtractor,
    schema: FilterSchema,
    attempt_timeout: Duration,
}

impl FilterTranslator {
    pub fn new(
        providers: Vec<Box<dyn TranslationProvider>>,
        extractor: RuleExtractor,
        schema: FilterSchema,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            extractor,
            schema,
            attempt_timeout,
        }
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    /// Translate a query into a validated filter. Total: provider
    /// failures fall through to the rule-based extractor, and `None`
    /// means the query carries no filterable constraints.
    pub async fn translate(&self, query: &str) -> Option<FilterExpr> {
        let prompt = build_prompt(query, &self.schema);

        for provider in &self.providers {
            match tokio::time::timeout(self.attempt_timeout, provider.complete(&prompt)).await {
                Ok(Ok(completion)) => {
                    if let Some(expr) = self.parse_completion(&completion) {
                        debug!(provider = %provider.name(), "translation accepted");
                        return Some(expr);
                    }
                    warn!(
                        provider = %provider.name(),
                        "completion produced no usable filter, trying next provider"
                    );
                }
                Ok(Err(e)) => {
                    warn!(provider = %provider.name(), error = %e, "translation attempt failed");
                }
                Err(_) => {
                    warn!(
                        provider = %provider.name(),
                        timeout_secs = self.attempt_timeout.as_secs(),
                        "translation attempt timed out"
                    );
                }
            }
        }

        debug!("all providers exhausted, using rule-based extraction");
        self.extractor.extract(query)
    }

    /// Extract and validate a filter object from completion text.
    fn parse_completion(&self, completion: &str) -> Option<FilterExpr> {
        let raw = extract_json(completion)?;
        validate(&raw, &self.schema)
    }
}

/// Pull a JSON object out of completion text: a fenced ```json block if
/// present, otherwise brace-balanced object spans. Models frequently
/// wrap the object in prose despite instructions, and some emit several
/// separate objects; those merge key-wise into one (first occurrence of
/// a key wins), which the validator then AND-combines.
fn extract_json(text: &str) -> Option<Value> {
    if let Some(fence_start) = text.find("```json") {
        let after = &text[fence_start + 7..];
        if let Some(fence_end) = after.find("```") {
            if let Ok(v) = serde_json::from_str(after[..fence_end].trim()) {
                return Some(v);
            }
        }
    }

    let mut merged = serde_json::Map::new();
    let mut found = false;
    for span in object_spans(text) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(span) {
            found = true;
            for (key, value) in map {
                merged.entry(key).or_insert(value);
            }
        }
    }
    if found {
        Some(Value::Object(merged))
    } else {
        None
    }
}

/// Top-level brace-balanced spans in the text, skipping braces inside
/// JSON string literals.
fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            spans.push(&text[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// Build the translation prompt: schema, operator vocabulary, boolean
/// logic rules, and a few worked examples.
fn build_prompt(query: &str, schema: &FilterSchema) -> String {
    format!(
        r##"Convert the user query into a JSON metadata filter for a vector database.

Filterable fields:
{schema_desc}
Operators: $eq, $ne, $gt, $gte, $lt, $lte (scalar), $in, $nin (array).
Combine conditions with {{"$and": [...]}} or {{"$or": [...]}}.

Rules:
- Output ONLY the JSON filter object, nothing else.
- Output {{}} when the query has no filterable constraints.
- Dates become half-open ranges on published_timestamp: $gte at the
  start instant and $lt at the end instant, both Unix epoch seconds.
- Topics and names map to hashtag tokens in tags (e.g. "#RohitSharma").
- Several topics mentioned together mean ANY of them ($in) unless the
  query explicitly requires all, e.g. "containing both".

Examples:
Query: articles by Jane Doe
Filter: {{"author": {{"$eq": "Jane Doe"}}}}

Query: posts about Rohit Sharma or Shubman Gill
Filter: {{"tags": {{"$in": ["#RohitSharma", "#ShubmanGill"]}}}}

Query: posts containing both Rohit Sharma and Shubman Gill
Filter: {{"$and": [{{"tags": {{"$eq": "#RohitSharma"}}}}, {{"tags": {{"$eq": "#ShubmanGill"}}}}]}}

Query: articles from May 2025
Filter: {{"published_timestamp": {{"$gte": 1746057600, "$lt": 1748736000}}}}

Query: {query}
Filter:"##,
        schema_desc = schema.prompt_description(),
        query = query,
    )
}
