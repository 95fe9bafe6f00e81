//! In-memory [`VectorStore`] implementation for testing and offline use.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored records, and
//! native filters are evaluated exactly over record metadata, matching
//! the semantics the production backend applies server-side.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::{FilterExpr, FilterValue, Scalar};
use crate::schema::Operator;

use super::{ScoredMatch, VectorRecord, VectorStore};

/// In-memory store for tests and offline environments.
pub struct InMemoryStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Exact native-filter evaluation over a metadata map. Index-side
/// semantics: equality is exact value match, not containment.
fn matches_filter(expr: &FilterExpr, metadata: &Map<String, Value>) -> bool {
    match expr {
        FilterExpr::And(ops) => ops.iter().all(|o| matches_filter(o, metadata)),
        FilterExpr::Or(ops) => ops.iter().any(|o| matches_filter(o, metadata)),
        FilterExpr::Comparison { field, op, value } => {
            let Some(actual) = metadata.get(field) else {
                return false;
            };
            match (op, value) {
                (Operator::Eq, FilterValue::Scalar(s)) => value_eq(actual, s),
                (Operator::Ne, FilterValue::Scalar(s)) => !value_eq(actual, s),
                (Operator::In, FilterValue::List(items)) => {
                    items.iter().any(|s| value_eq(actual, s))
                }
                (Operator::Nin, FilterValue::List(items)) => {
                    !items.iter().any(|s| value_eq(actual, s))
                }
                (Operator::Gt, FilterValue::Scalar(Scalar::Int(i))) => {
                    actual.as_i64().is_some_and(|a| a > *i)
                }
                (Operator::Gte, FilterValue::Scalar(Scalar::Int(i))) => {
                    actual.as_i64().is_some_and(|a| a >= *i)
                }
                (Operator::Lt, FilterValue::Scalar(Scalar::Int(i))) => {
                    actual.as_i64().is_some_and(|a| a < *i)
                }
                (Operator::Lte, FilterValue::Scalar(Scalar::Int(i))) => {
                    actual.as_i64().is_some_and(|a| a <= *i)
                }
                _ => false,
            }
        }
    }
}

fn value_eq(actual: &Value, expected: &Scalar) -> bool {
    match expected {
        Scalar::Str(s) => actual.as_str() == Some(s.as_str()),
        Scalar::Int(i) => actual.as_i64() == Some(*i),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<ScoredMatch>> {
        let records = self.records.read().unwrap();

        let mut scored: Vec<ScoredMatch> = records
            .iter()
            .filter(|r| filter.map_or(true, |f| matches_filter(f, &r.metadata)))
            .map(|r| ScoredMatch {
                id: r.id.clone(),
                score: cosine_sim(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            if let Some(existing) = stored.iter_mut().find(|r| r.id == record.id) {
                *existing = record.clone();
            } else {
                stored.push(record.clone());
            }
        }
        Ok(())
    }
}
