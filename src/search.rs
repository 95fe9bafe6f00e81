//! The end-to-end search pipeline.
//!
//! [`SearchPipeline`] wires the stages together: translate the query
//! into a filter, split it into native and residual parts, embed the
//! query text, run the filtered vector query, apply the residual
//! predicate in-process, and truncate to the requested size.
//!
//! When a residual predicate exists the store is over-fetched by a
//! configurable factor, since an unknown share of the candidates will
//! be rejected in-process. Residual filtering preserves the store's
//! score order, so the final list is always descending by similarity.

use anyhow::Result;
use tracing::debug;

use crate::adapter::split;
use crate::embedding::{embed_query, Embedder};
use crate::filter::FilterExpr;
use crate::store::{ScoredMatch, VectorStore};
use crate::translate::FilterTranslator;

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of results to return.
    pub top_k: usize,
    /// Multiplier applied to `top_k` when a residual predicate will
    /// reject an unknown share of candidates.
    pub overfetch_factor: usize,
    /// Index vector dimensionality; embeddings are padded or truncated
    /// to match.
    pub index_dims: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            overfetch_factor: 4,
            index_dims: 1536,
        }
    }
}

pub struct SearchPipeline {
    translator: FilterTranslator,
    primary_embedder: Option<Box<dyn Embedder>>,
    fallback_embedder: Option<Box<dyn Embedder>>,
    store: Box<dyn VectorStore>,
    options: SearchOptions,
}

impl SearchPipeline {
    pub fn new(
        translator: FilterTranslator,
        primary_embedder: Option<Box<dyn Embedder>>,
        fallback_embedder: Option<Box<dyn Embedder>>,
        store: Box<dyn VectorStore>,
        options: SearchOptions,
    ) -> Self {
        Self {
            translator,
            primary_embedder,
            fallback_embedder,
            store,
            options,
        }
    }

    /// Translate the query into a filter without searching.
    pub async fn filter_only(&self, query: &str) -> Option<FilterExpr> {
        self.translator.translate(query).await
    }

    /// Run the full pipeline and return at most `top_k` matches in
    /// descending score order.
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredMatch>> {
        let filter = self.translator.translate(query).await;
        debug!(filter = ?filter.as_ref().map(|f| f.to_value()), "translated filter");

        let (native, residual) = match &filter {
            Some(expr) => {
                let parts = split(expr, self.translator.schema());
                (parts.native, parts.residual)
            }
            None => (None, None),
        };

        let vector = embed_query(
            self.primary_embedder.as_deref(),
            self.fallback_embedder.as_deref(),
            query,
            self.options.index_dims,
        )
        .await?;

        let fetch_k = if residual.is_some() {
            self.options.top_k * self.options.overfetch_factor.max(1)
        } else {
            self.options.top_k
        };

        let matches = self
            .store
            .query(&vector, fetch_k, native.as_ref())
            .await?;
        debug!(
            fetched = matches.len(),
            residual = residual.is_some(),
            "store query complete"
        );

        let mut results: Vec<ScoredMatch> = match &residual {
            Some(pred) => matches
                .into_iter()
                .filter(|m| pred.matches(&m.metadata))
                .collect(),
            None => matches,
        };
        results.truncate(self.options.top_k);
        Ok(results)
    }
}
