//! Vector store abstraction.
//!
//! [`VectorStore`] is the seam between the search pipeline and the
//! backing index. The production implementation is
//! [`pinecone::PineconeStore`]; [`memory::InMemoryStore`] backs tests
//! and offline runs with brute-force cosine search over the same query
//! semantics.

pub mod memory;
pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::FilterExpr;

pub use memory::InMemoryStore;
pub use pinecone::PineconeStore;

/// One scored search result from the store.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// A record to insert or overwrite in the index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// A vector index supporting filtered similarity queries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Query for the `top_k` nearest vectors, constrained by the native
    /// filter when present. Results come back in descending score order
    /// with metadata attached.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<ScoredMatch>>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;
}
