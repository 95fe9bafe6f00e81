//! Query adapter: split a filter into the part the store can evaluate
//! natively and the part that must run in-process.
//!
//! The store indexes most metadata fields, but `tags` is stored as a
//! single concatenated text blob, so tag comparisons cannot be pushed
//! down. [`split`] decomposes a validated filter into a native filter
//! (sent with the vector query) and a [`ResidualPredicate`] (applied to
//! returned matches), such that the conjunction of the two is
//! equivalent to the original filter.
//!
//! The split is structural:
//!
//! - a comparison is native iff its field is `native_filterable`;
//! - an AND node partitions its operands between the two sides;
//! - an OR node with any non-native operand goes residual *whole* —
//!   splitting a disjunction would narrow it, so the residual side
//!   re-evaluates even the native operands against match metadata.

use serde_json::{Map, Value};

use crate::filter::{FilterExpr, FilterValue, LogicalKind, Scalar};
use crate::schema::{FilterSchema, Operator};

/// Result of decomposing a filter for a particular store.
#[derive(Debug, Clone, Default)]
pub struct SplitFilter {
    /// Pushed down to the store's indexed query, if anything survives.
    pub native: Option<FilterExpr>,
    /// Evaluated in-process against each match's metadata.
    pub residual: Option<ResidualPredicate>,
}

impl SplitFilter {
    pub fn is_empty(&self) -> bool {
        self.native.is_none() && self.residual.is_none()
    }
}

/// Decompose `expr` into native and residual parts against `schema`.
pub fn split(expr: &FilterExpr, schema: &FilterSchema) -> SplitFilter {
    let (native, residual) = split_expr(expr, schema);
    SplitFilter {
        native,
        residual: residual.map(ResidualPredicate),
    }
}

fn split_expr(
    expr: &FilterExpr,
    schema: &FilterSchema,
) -> (Option<FilterExpr>, Option<FilterExpr>) {
    match expr {
        FilterExpr::Comparison { field, .. } => {
            if is_native_field(field, schema) {
                (Some(expr.clone()), None)
            } else {
                (None, Some(expr.clone()))
            }
        }
        FilterExpr::And(operands) => {
            let mut native = Vec::new();
            let mut residual = Vec::new();
            for op in operands {
                let (n, r) = split_expr(op, schema);
                native.extend(n);
                residual.extend(r);
            }
            (
                FilterExpr::combine(LogicalKind::And, native),
                FilterExpr::combine(LogicalKind::And, residual),
            )
        }
        FilterExpr::Or(_) => {
            if is_fully_native(expr, schema) {
                (Some(expr.clone()), None)
            } else {
                (None, Some(expr.clone()))
            }
        }
    }
}

fn is_native_field(field: &str, schema: &FilterSchema) -> bool {
    schema.field(field).is_some_and(|f| f.native_filterable)
}

fn is_fully_native(expr: &FilterExpr, schema: &FilterSchema) -> bool {
    expr.comparisons()
        .iter()
        .all(|(field, _, _)| is_native_field(field, schema))
}

/// An in-process filter evaluated against a match's metadata map.
///
/// Comparisons on the `tags` blob use substring containment; every
/// other field compares against the metadata value directly, which lets
/// the predicate faithfully evaluate mixed disjunctions.
#[derive(Debug, Clone)]
pub struct ResidualPredicate(FilterExpr);

impl ResidualPredicate {
    pub fn expr(&self) -> &FilterExpr {
        &self.0
    }

    /// Whether the metadata map satisfies the predicate.
    ///
    /// A comparison on a missing metadata key is false, so documents
    /// lacking the field are excluded rather than passed through.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        eval(&self.0, metadata)
    }
}

fn eval(expr: &FilterExpr, metadata: &Map<String, Value>) -> bool {
    match expr {
        FilterExpr::Comparison { field, op, value } => {
            eval_comparison(field, *op, value, metadata)
        }
        FilterExpr::And(ops) => ops.iter().all(|o| eval(o, metadata)),
        FilterExpr::Or(ops) => ops.iter().any(|o| eval(o, metadata)),
    }
}

fn eval_comparison(
    field: &str,
    op: Operator,
    value: &FilterValue,
    metadata: &Map<String, Value>,
) -> bool {
    let Some(actual) = metadata.get(field) else {
        return false;
    };

    if field == "tags" {
        return eval_tags(actual, op, value);
    }

    match (op, value) {
        (Operator::Eq, FilterValue::Scalar(s)) => scalar_eq(actual, s),
        (Operator::Ne, FilterValue::Scalar(s)) => !scalar_eq(actual, s),
        (Operator::In, FilterValue::List(items)) => items.iter().any(|s| scalar_eq(actual, s)),
        (Operator::Nin, FilterValue::List(items)) => !items.iter().any(|s| scalar_eq(actual, s)),
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

/// Tag comparisons run as substring containment over the stored blob.
fn eval_tags(actual: &Value, op: Operator, value: &FilterValue) -> bool {
    let Some(blob) = actual.as_str() else {
        return false;
    };
    let contains = |s: &Scalar| match s {
        Scalar::Str(tag) => blob.contains(tag.as_str()),
        Scalar::Int(_) => false,
    };
    match (op, value) {
        (Operator::Eq, FilterValue::Scalar(s)) => contains(s),
        (Operator::Ne, FilterValue::Scalar(s)) => !contains(s),
        (Operator::In, FilterValue::List(items)) => items.iter().any(contains),
        (Operator::Nin, FilterValue::List(items)) => !items.iter().any(contains),
        _ => false,
    }
}

fn scalar_eq(actual: &Value, expected: &Scalar) -> bool {
    match expected {
        Scalar::Str(s) => actual.as_str() == Some(s.as_str()),
        Scalar::Int(i) => actual.as_i64() == Some(*i),
    }
}
