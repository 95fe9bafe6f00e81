//! The validated filter expression tree and its wire rendering.
//!
//! A [`FilterExpr`] is built fresh per query — by the rule-based
//! extractor or by validating a translation provider's output — passed
//! once through the query adapter, and discarded. It is never mutated
//! after validation; the adapter derives the native/residual pair by
//! structural copy.
//!
//! The "empty filter" (no constraints, pure similarity search) is
//! represented as `Option<FilterExpr>` = `None` throughout the crate.

use serde_json::{json, Value};

use crate::schema::Operator;

/// A scalar filter value: hashtag/author strings or epoch integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Str(String),
    Int(i64),
}

impl Scalar {
    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Str(s) => Value::String(s.clone()),
            Scalar::Int(i) => json!(i),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

/// Right-hand side of a comparison: a scalar for eq/ne/gt/gte/lt/lte,
/// an ordered list for in/nin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FilterValue {
    pub fn to_value(&self) -> Value {
        match self {
            FilterValue::Scalar(s) => s.to_value(),
            FilterValue::List(items) => {
                Value::Array(items.iter().map(Scalar::to_value).collect())
            }
        }
    }
}

/// A validated, schema-conformant filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison {
        field: String,
        op: Operator,
        value: FilterValue,
    },
    /// All operands must hold. Non-empty by construction.
    And(Vec<FilterExpr>),
    /// At least one operand must hold. Non-empty by construction.
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn comparison(field: &str, op: Operator, value: FilterValue) -> Self {
        FilterExpr::Comparison {
            field: field.to_string(),
            op,
            value,
        }
    }

    pub fn eq(field: &str, value: Scalar) -> Self {
        Self::comparison(field, Operator::Eq, FilterValue::Scalar(value))
    }

    /// Wrap operands in a logical node, collapsing the degenerate cases:
    /// zero operands is `None`, one operand is the operand itself.
    pub fn combine(kind: LogicalKind, mut operands: Vec<FilterExpr>) -> Option<FilterExpr> {
        match operands.len() {
            0 => None,
            1 => Some(operands.remove(0)),
            _ => Some(match kind {
                LogicalKind::And => FilterExpr::And(operands),
                LogicalKind::Or => FilterExpr::Or(operands),
            }),
        }
    }

    /// Render the canonical Pinecone metadata-filter wire shape.
    ///
    /// Comparisons always render in the explicit operator form
    /// (`{"field": {"$eq": v}}`, never the bare-value sugar), so a
    /// rendered expression re-validates to an identical tree.
    pub fn to_value(&self) -> Value {
        match self {
            FilterExpr::Comparison { field, op, value } => {
                json!({ field.clone(): { op.wire_token(): value.to_value() } })
            }
            FilterExpr::And(operands) => {
                json!({ "$and": operands.iter().map(FilterExpr::to_value).collect::<Vec<_>>() })
            }
            FilterExpr::Or(operands) => {
                json!({ "$or": operands.iter().map(FilterExpr::to_value).collect::<Vec<_>>() })
            }
        }
    }

    /// Iterate every comparison in the tree.
    pub fn comparisons(&self) -> Vec<(&str, Operator, &FilterValue)> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<(&'a str, Operator, &'a FilterValue)>) {
        match self {
            FilterExpr::Comparison { field, op, value } => out.push((field, *op, value)),
            FilterExpr::And(ops) | FilterExpr::Or(ops) => {
                for o in ops {
                    o.collect_comparisons(out);
                }
            }
        }
    }
}

/// Kind tag for [`FilterExpr::combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKind {
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_renders_explicit_operator_form() {
        let expr = FilterExpr::eq("author", Scalar::from("Jane Doe"));
        assert_eq!(expr.to_value(), json!({"author": {"$eq": "Jane Doe"}}));
    }

    #[test]
    fn test_in_renders_list() {
        let expr = FilterExpr::comparison(
            "tags",
            Operator::In,
            FilterValue::List(vec![Scalar::from("#RohitSharma"), Scalar::from("#ShubmanGill")]),
        );
        assert_eq!(
            expr.to_value(),
            json!({"tags": {"$in": ["#RohitSharma", "#ShubmanGill"]}})
        );
    }

    #[test]
    fn test_and_renders_operand_array() {
        let expr = FilterExpr::And(vec![
            FilterExpr::eq("author", Scalar::from("Jane Doe")),
            FilterExpr::eq("tags", Scalar::from("#Cricket")),
        ]);
        assert_eq!(
            expr.to_value(),
            json!({"$and": [
                {"author": {"$eq": "Jane Doe"}},
                {"tags": {"$eq": "#Cricket"}},
            ]})
        );
    }

    #[test]
    fn test_combine_collapses_degenerate_cases() {
        assert_eq!(FilterExpr::combine(LogicalKind::And, vec![]), None);

        let single = FilterExpr::eq("author", Scalar::from("Akainu"));
        assert_eq!(
            FilterExpr::combine(LogicalKind::Or, vec![single.clone()]),
            Some(single)
        );

        let two = vec![
            FilterExpr::eq("tags", Scalar::from("#A")),
            FilterExpr::eq("tags", Scalar::from("#B")),
        ];
        match FilterExpr::combine(LogicalKind::And, two).unwrap() {
            FilterExpr::And(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_comparisons_walks_nested_tree() {
        let expr = FilterExpr::And(vec![
            FilterExpr::eq("author", Scalar::from("Jane Doe")),
            FilterExpr::Or(vec![
                FilterExpr::eq("tags", Scalar::from("#A")),
                FilterExpr::eq("tags", Scalar::from("#B")),
            ]),
        ]);
        let fields: Vec<&str> = expr.comparisons().iter().map(|(f, _, _)| *f).collect();
        assert_eq!(fields, vec!["author", "tags", "tags"]);
    }
}
