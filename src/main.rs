//! # nlquery CLI (`nlq`)
//!
//! Command-line interface for natural-language filtered vector search.
//!
//! ## Usage
//!
//! ```bash
//! nlq --config ./config/nlq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nlq filter "<query>"` | Translate a query to a metadata filter and print it |
//! | `nlq search "<query>"` | Run the full filtered similarity search |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect the filter a query produces
//! nlq filter "posts about Rohit Sharma from May 2025"
//!
//! # Search with a result cap
//! nlq search "cricket articles by Jane Doe" --top-k 3
//! ```
//!
//! API keys come from the environment: `OPENROUTER_API_KEY` and
//! `OPENAI_API_KEY` enable the translation chain, `OPENAI_API_KEY` the
//! embedding provider, `PINECONE_API_KEY` the store. Whatever is absent
//! degrades gracefully: rule-based extraction, hash embeddings, the
//! in-memory store.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nlquery::adapter::split;
use nlquery::config::{load_config, Config};
use nlquery::embedding::{Embedder, HashEmbedder, OpenAiEmbedder};
use nlquery::extract::RuleExtractor;
use nlquery::schema::FilterSchema;
use nlquery::search::{SearchOptions, SearchPipeline};
use nlquery::store::{InMemoryStore, PineconeStore, VectorStore};
use nlquery::translate::{
    FilterTranslator, OpenAiChatProvider, OpenRouterProvider, TranslationProvider,
};

/// nlquery — natural-language queries over a filtered vector index.
#[derive(Parser)]
#[command(
    name = "nlq",
    about = "Translate natural-language queries into vector-store metadata filters and search with them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/nlq.toml`; missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/nlq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a query into a metadata filter and print it as JSON.
    ///
    /// Prints `{}` when the query carries no filterable constraints.
    Filter {
        /// The natural-language query.
        query: String,
    },

    /// Run the full pipeline: translate, embed, search, post-filter.
    Search {
        /// The natural-language query.
        query: String,

        /// Maximum number of results to return (overrides config).
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Filter { query } => {
            let pipeline = build_pipeline(&cfg, None)?;
            match pipeline.filter_only(&query).await {
                Some(expr) => {
                    println!("{}", serde_json::to_string_pretty(&expr.to_value())?);
                    let parts = split(&expr, &FilterSchema::default());
                    match &parts.native {
                        Some(native) => {
                            println!("native:   {}", serde_json::to_string(&native.to_value())?)
                        }
                        None => println!("native:   (none)"),
                    }
                    match &parts.residual {
                        Some(residual) => println!(
                            "residual: {}",
                            serde_json::to_string(&residual.expr().to_value())?
                        ),
                        None => println!("residual: (none)"),
                    }
                }
                None => println!("{{}}"),
            }
        }
        Commands::Search { query, top_k } => {
            let pipeline = build_pipeline(&cfg, top_k)?;
            let results = pipeline.search(&query).await?;
            if results.is_empty() {
                println!("No matches.");
            }
            for (rank, m) in results.iter().enumerate() {
                println!(
                    "{}. {} (score {:.4})",
                    rank + 1,
                    m.id,
                    m.score
                );
                for (key, value) in &m.metadata {
                    println!("   {}: {}", key, value);
                }
            }
        }
    }

    Ok(())
}

/// Assemble the pipeline from config and whatever credentials the
/// environment provides.
fn build_pipeline(cfg: &Config, top_k_override: Option<usize>) -> Result<SearchPipeline> {
    let schema = FilterSchema::default();
    let attempt_timeout = Duration::from_secs(cfg.translation.attempt_timeout_secs);

    let mut providers: Vec<Box<dyn TranslationProvider>> = Vec::new();
    if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
        for model in &cfg.translation.openrouter_models {
            providers.push(Box::new(OpenRouterProvider::new(
                key.clone(),
                model.clone(),
                attempt_timeout,
            )?));
        }
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        providers.push(Box::new(OpenAiChatProvider::new(
            key,
            cfg.translation.openai_model.clone(),
            attempt_timeout,
        )?));
    }

    let translator = FilterTranslator::new(
        providers,
        RuleExtractor::new(cfg.gazetteer.to_gazetteer()),
        schema,
        attempt_timeout,
    );

    let primary_embedder: Option<Box<dyn Embedder>> = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => Some(Box::new(OpenAiEmbedder::new(
            key,
            cfg.embedding.model.clone(),
            Duration::from_secs(cfg.embedding.timeout_secs),
            cfg.embedding.max_retries,
        )?)),
        Err(_) => None,
    };
    let fallback_embedder: Box<dyn Embedder> = Box::new(HashEmbedder::new(cfg.embedding.dims));

    let store: Box<dyn VectorStore> = if cfg.store.host.is_empty() {
        Box::new(InMemoryStore::new())
    } else {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY not set but store.host is configured"))?;
        Box::new(PineconeStore::new(
            cfg.store.host.clone(),
            api_key,
            Duration::from_secs(cfg.store.timeout_secs),
            cfg.store.max_retries,
        )?)
    };

    Ok(SearchPipeline::new(
        translator,
        primary_embedder,
        Some(fallback_embedder),
        store,
        SearchOptions {
            top_k: top_k_override.unwrap_or(cfg.search.top_k),
            overfetch_factor: cfg.search.overfetch_factor,
            index_dims: cfg.store.index_dims(cfg.embedding.dims),
        },
    ))
}
