//! Filter validation and normalization.
//!
//! [`validate`] is the single point where untyped filter literals — from
//! a translation provider or any other source — become typed
//! [`FilterExpr`] trees. It is a total function: it never errors or
//! panics, and unrecoverable garbage collapses to `None` (no filter).
//! Offending fragments are dropped individually so one bad key never
//! discards an otherwise usable filter.
//!
//! Accepted wire shapes:
//!
//! ```text
//! {"field": scalar}                          // implicit $eq
//! {"field": {"$eq"|"$ne"|...: scalar}}
//! {"field": {"$in"|"$nin": [scalar, ...]}}
//! {"field": [scalar, ...]}                   // sugar for $in
//! {"$and"|"$or": [filter, ...]}
//! ```
//!
//! Equivalent shapes normalize to identical trees: `{"f": v}` and
//! `{"f": {"$eq": v}}` produce the same `Comparison` node, so no other
//! component needs to special-case the sugar forms. Validation is a
//! projection — re-validating a rendered expression is a no-op.

use serde_json::Value;

use crate::filter::{FilterExpr, FilterValue, LogicalKind, Scalar};
use crate::schema::{FieldType, FilterSchema, Operator, SchemaField};

/// Validate an untyped filter literal against the schema.
///
/// Returns `None` when nothing schema-conformant survives.
pub fn validate(raw: &Value, schema: &FilterSchema) -> Option<FilterExpr> {
    let obj = raw.as_object()?;

    // serde_json objects iterate in sorted key order, which makes the
    // implicit AND combination below deterministic.
    let mut parts: Vec<FilterExpr> = Vec::new();

    for (key, value) in obj {
        match key.as_str() {
            "$and" => {
                if let Some(node) = validate_logical(LogicalKind::And, value, schema) {
                    parts.push(node);
                }
            }
            "$or" => {
                if let Some(node) = validate_logical(LogicalKind::Or, value, schema) {
                    parts.push(node);
                }
            }
            name => {
                if let Some(field) = schema.field(name) {
                    parts.extend(validate_field(field, value));
                }
                // Unknown field: dropped, not an error.
            }
        }
    }

    FilterExpr::combine(LogicalKind::And, parts)
}

/// Validate a `$and`/`$or` operand array, dropping operands that reduce
/// to empty. A node left with zero operands is itself dropped; a single
/// survivor collapses to the bare operand.
fn validate_logical(kind: LogicalKind, value: &Value, schema: &FilterSchema) -> Option<FilterExpr> {
    let operands = value.as_array()?;
    let validated: Vec<FilterExpr> = operands.iter().filter_map(|o| validate(o, schema)).collect();
    FilterExpr::combine(kind, validated)
}

/// Validate one field entry, emitting zero or more comparisons.
fn validate_field(field: &SchemaField, value: &Value) -> Vec<FilterExpr> {
    match value {
        // Bare scalar is sugar for $eq.
        Value::String(_) | Value::Number(_) => coerce_scalar(value, field.field_type)
            .map(|s| FilterExpr::comparison(&field.name, Operator::Eq, FilterValue::Scalar(s)))
            .into_iter()
            .collect(),

        // Bare array is sugar for $in.
        Value::Array(_) => coerce_list(value, field.field_type)
            .map(|list| FilterExpr::comparison(&field.name, Operator::In, FilterValue::List(list)))
            .into_iter()
            .collect(),

        // Operator mapping: one comparison per recognized operator key;
        // unrecognized keys are dropped individually.
        Value::Object(ops) => {
            let mut out = Vec::new();
            for (token, operand) in ops {
                // Some models emit {"$or": [tags]} inside a field; for a
                // scalar list that is equivalent to $in.
                let op = match Operator::parse(token) {
                    Some(op) => op,
                    None if token == "$or" && operand.is_array() => Operator::In,
                    None => continue,
                };
                if !field.supports(op) {
                    continue;
                }
                if op.takes_list() {
                    if let Some(list) = coerce_list(operand, field.field_type) {
                        out.push(FilterExpr::comparison(
                            &field.name,
                            op,
                            FilterValue::List(list),
                        ));
                    }
                } else if let Some(s) = coerce_scalar(operand, field.field_type) {
                    out.push(FilterExpr::comparison(&field.name, op, FilterValue::Scalar(s)));
                }
            }
            out
        }

        _ => Vec::new(),
    }
}

/// Coerce a JSON scalar to the field's declared type.
fn coerce_scalar(value: &Value, ty: FieldType) -> Option<Scalar> {
    match ty {
        FieldType::Str => match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Number(n) => Some(Scalar::Str(n.to_string())),
            _ => None,
        },
        FieldType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Scalar::Int),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Scalar::Int),
            _ => None,
        },
    }
}

/// Coerce a JSON array to a scalar list, dropping elements that fail
/// coercion. An empty surviving list drops the whole comparison.
fn coerce_list(value: &Value, ty: FieldType) -> Option<Vec<Scalar>> {
    let items = value.as_array()?;
    let coerced: Vec<Scalar> = items.iter().filter_map(|v| coerce_scalar(v, ty)).collect();
    if coerced.is_empty() {
        None
    } else {
        Some(coerced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FilterSchema {
        FilterSchema::default()
    }

    #[test]
    fn test_bare_scalar_equals_explicit_eq() {
        let a = validate(&json!({"author": "Jane Doe"}), &schema());
        let b = validate(&json!({"author": {"$eq": "Jane Doe"}}), &schema());
        assert_eq!(a, b);
        assert_eq!(
            a,
            Some(FilterExpr::eq("author", Scalar::from("Jane Doe")))
        );
    }

    #[test]
    fn test_unknown_field_dropped_not_fatal() {
        let result = validate(
            &json!({"bogus_field": "x", "author": "Jane Doe"}),
            &schema(),
        );
        assert_eq!(
            result,
            Some(FilterExpr::eq("author", Scalar::from("Jane Doe")))
        );
    }

    #[test]
    fn test_garbage_collapses_to_none() {
        assert_eq!(validate(&json!("not a filter"), &schema()), None);
        assert_eq!(validate(&json!(42), &schema()), None);
        assert_eq!(validate(&json!({}), &schema()), None);
        assert_eq!(validate(&json!({"bogus": {"$eq": "x"}}), &schema()), None);
    }

    #[test]
    fn test_zero_operand_logical_dropped() {
        assert_eq!(validate(&json!({"$and": []}), &schema()), None);
        assert_eq!(
            validate(&json!({"$or": [{"unknown": 1}, {"also_unknown": 2}]}), &schema()),
            None
        );
    }

    #[test]
    fn test_single_operand_logical_collapses() {
        let result = validate(&json!({"$or": [{"tags": "#IPL2025"}]}), &schema());
        assert_eq!(result, Some(FilterExpr::eq("tags", Scalar::from("#IPL2025"))));
    }

    #[test]
    fn test_unsupported_operator_dropped_partial_recovery() {
        // $gt makes no sense on a string field; $eq survives.
        let result = validate(
            &json!({"author": {"$gt": "A", "$eq": "Jane Doe"}}),
            &schema(),
        );
        assert_eq!(
            result,
            Some(FilterExpr::eq("author", Scalar::from("Jane Doe")))
        );
    }

    #[test]
    fn test_unrecognized_operator_key_dropped_individually() {
        let result = validate(
            &json!({"published_timestamp": {"$gte": 1735689600, "$regex": "x", "$lt": 1767225600}}),
            &schema(),
        );
        let expected = FilterExpr::And(vec![
            FilterExpr::comparison(
                "published_timestamp",
                Operator::Gte,
                FilterValue::Scalar(Scalar::Int(1735689600)),
            ),
            FilterExpr::comparison(
                "published_timestamp",
                Operator::Lt,
                FilterValue::Scalar(Scalar::Int(1767225600)),
            ),
        ]);
        assert_eq!(result, Some(expected));
    }

    #[test]
    fn test_int_field_coercion() {
        // Numeric strings and whole floats coerce; garbage drops the key.
        let a = validate(&json!({"published_year": "2025"}), &schema());
        let b = validate(&json!({"published_year": 2025.0}), &schema());
        let expected = Some(FilterExpr::eq("published_year", Scalar::Int(2025)));
        assert_eq!(a, expected);
        assert_eq!(b, expected);

        assert_eq!(validate(&json!({"published_year": true}), &schema()), None);
        assert_eq!(
            validate(&json!({"published_year": "next year"}), &schema()),
            None
        );
    }

    #[test]
    fn test_list_elements_coerced_individually() {
        let result = validate(
            &json!({"tags": {"$in": ["#RohitSharma", true, "#ShubmanGill"]}}),
            &schema(),
        );
        assert_eq!(
            result,
            Some(FilterExpr::comparison(
                "tags",
                Operator::In,
                FilterValue::List(vec![
                    Scalar::from("#RohitSharma"),
                    Scalar::from("#ShubmanGill")
                ]),
            ))
        );

        // All elements failing drops the comparison.
        assert_eq!(validate(&json!({"tags": {"$in": [true, null]}}), &schema()), None);
    }

    #[test]
    fn test_bare_array_is_in_sugar() {
        let a = validate(&json!({"tags": ["#A", "#B"]}), &schema());
        let b = validate(&json!({"tags": {"$in": ["#A", "#B"]}}), &schema());
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_level_or_normalizes_to_in() {
        let a = validate(&json!({"tags": {"$or": ["#A", "#B"]}}), &schema());
        let b = validate(&json!({"tags": {"$in": ["#A", "#B"]}}), &schema());
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiple_fields_and_combined() {
        let result = validate(
            &json!({"author": "Mary Poppins", "tags": "#IPL2025"}),
            &schema(),
        )
        .unwrap();
        match result {
            FilterExpr::And(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_logical_structure_preserved() {
        let raw = json!({"$and": [
            {"author": "Jane Doe"},
            {"$or": [{"tags": "#A"}, {"tags": "#B"}]},
        ]});
        let result = validate(&raw, &schema()).unwrap();
        match &result {
            FilterExpr::And(ops) => {
                assert_eq!(ops.len(), 2);
                assert!(matches!(ops[1], FilterExpr::Or(_)));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_is_idempotent() {
        let raws = vec![
            json!({"author": "Jane Doe"}),
            json!({"tags": {"$in": ["#RohitSharma", "#ShubmanGill"]}}),
            json!({"author": "Mary Poppins", "tags": "#IPL2025"}),
            json!({"$and": [
                {"author": {"$ne": "Akainu"}},
                {"published_timestamp": {"$gte": 1735689600, "$lt": 1767225600}},
            ]}),
            json!({"$or": [{"tags": "#A"}, {"author": "Jane Doe"}]}),
        ];
        for raw in raws {
            let once = validate(&raw, &schema()).unwrap();
            let twice = validate(&once.to_value(), &schema()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }
}
