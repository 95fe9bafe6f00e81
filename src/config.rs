use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::extract::{Gazetteer, Topic};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub gazetteer: GazetteerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    /// OpenRouter model ids tried in order before the OpenAI model.
    #[serde(default = "default_openrouter_models")]
    pub openrouter_models: Vec<String>,
    /// OpenAI chat model used as the last provider in the chain.
    #[serde(default = "default_openai_chat_model")]
    pub openai_model: String,
    /// Per-provider attempt budget in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            openrouter_models: default_openrouter_models(),
            openai_model: default_openai_chat_model(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

fn default_openrouter_models() -> Vec<String> {
    vec![
        "mistralai/mistral-7b-instruct:free".to_string(),
        "meta-llama/llama-3.2-3b-instruct:free".to_string(),
    ]
}
fn default_openai_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_attempt_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Data-plane URL of the Pinecone index. Empty means offline mode
    /// with the in-memory store.
    #[serde(default)]
    pub host: String,
    /// Index vector dimensionality; embeddings are padded or truncated
    /// to this. Unset means the embedding dims.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StoreConfig {
    /// The pad/truncate target for query embeddings.
    pub fn index_dims(&self, embedding_dims: usize) -> usize {
        self.dims.unwrap_or(embedding_dims)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_overfetch_factor() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GazetteerConfig {
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub topics: Vec<TopicEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicEntry {
    pub patterns: Vec<String>,
    pub tag: String,
}

impl GazetteerConfig {
    /// Build the extraction gazetteer; an unconfigured section uses the
    /// built-in vocabulary.
    pub fn to_gazetteer(&self) -> Gazetteer {
        if self.authors.is_empty() && self.topics.is_empty() {
            return Gazetteer::default();
        }
        Gazetteer {
            authors: self.authors.clone(),
            topics: self
                .topics
                .iter()
                .map(|t| Topic {
                    patterns: t.patterns.clone(),
                    tag: t.tag.clone(),
                })
                .collect(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.search.top_k == 0 {
        anyhow::bail!("search.top_k must be >= 1");
    }
    if config.search.overfetch_factor == 0 {
        anyhow::bail!("search.overfetch_factor must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.store.dims == Some(0) {
        anyhow::bail!("store.dims must be > 0 when set");
    }
    for topic in &config.gazetteer.topics {
        if topic.patterns.is_empty() {
            anyhow::bail!("gazetteer topic '{}' has no patterns", topic.tag);
        }
    }

    Ok(config)
}
