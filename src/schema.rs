//! Static description of the filterable metadata schema.
//!
//! The schema is pure data: field names, value types, the operator
//! vocabulary each type supports, and a per-field capability flag that
//! records whether the backing store can evaluate the field natively.
//! The `tags` field is *not* native-filterable because the store holds
//! tags as a single concatenated text blob rather than a structured
//! list; the query adapter uses this flag to decide what must be
//! evaluated in-process after retrieval.

use std::fmt;

/// Canonical name of the unified Unix-epoch timestamp field.
pub const TIMESTAMP_FIELD: &str = "published_timestamp";

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Int,
}

/// A comparison operator in the filter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Operator {
    /// Parse a wire token (`"$eq"`, `"$in"`, ...) into an operator.
    pub fn parse(token: &str) -> Option<Operator> {
        match token {
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            _ => None,
        }
    }

    /// The wire token for this operator.
    pub fn wire_token(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
        }
    }

    /// Whether this operator takes a list value rather than a scalar.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_token())
    }
}

/// A single filterable field.
#[derive(Debug, Clone)]
pub struct SchemaField {
    /// Metadata key as stored in the index.
    pub name: String,
    pub field_type: FieldType,
    /// False when the store cannot evaluate this field as part of its
    /// indexed query and the adapter must post-filter instead.
    pub native_filterable: bool,
}

impl SchemaField {
    /// Whether `op` is in this field's supported operator set.
    ///
    /// Ordering comparisons only make sense on integer fields; string
    /// fields keep the equality and membership operators.
    pub fn supports(&self, op: Operator) -> bool {
        match self.field_type {
            FieldType::Int => true,
            FieldType::Str => matches!(
                op,
                Operator::Eq | Operator::Ne | Operator::In | Operator::Nin
            ),
        }
    }
}

/// The full filterable-field contract for one index.
#[derive(Debug, Clone)]
pub struct FilterSchema {
    fields: Vec<SchemaField>,
}

impl FilterSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Look up a field by its metadata key.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Render a plain-text schema description for the translation prompt.
    pub fn prompt_description(&self) -> String {
        let mut out = String::new();
        for f in &self.fields {
            let ty = match f.field_type {
                FieldType::Str => "string",
                FieldType::Int => "integer",
            };
            let note = if f.name == "tags" {
                " (a string holding hashtag tokens like \"['#RohitSharma', '#DRS']\")"
            } else if f.name == TIMESTAMP_FIELD {
                " (Unix epoch seconds; the only date field to use for comparisons)"
            } else {
                ""
            };
            out.push_str(&format!("- {}: {}{}\n", f.name, ty, note));
        }
        out
    }
}

impl Default for FilterSchema {
    /// The article-index schema: author, tag blob, unified timestamp,
    /// and the split year/month/day subfields.
    fn default() -> Self {
        fn string_field(name: &str, native: bool) -> SchemaField {
            SchemaField {
                name: name.to_string(),
                field_type: FieldType::Str,
                native_filterable: native,
            }
        }
        fn int_field(name: &str) -> SchemaField {
            SchemaField {
                name: name.to_string(),
                field_type: FieldType::Int,
                native_filterable: true,
            }
        }

        Self::new(vec![
            string_field("author", true),
            string_field("tags", false),
            int_field(TIMESTAMP_FIELD),
            int_field("published_year"),
            int_field("published_month"),
            int_field("published_day"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse_roundtrip() {
        for token in ["$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin"] {
            let op = Operator::parse(token).unwrap();
            assert_eq!(op.wire_token(), token);
        }
        assert!(Operator::parse("$regex").is_none());
        assert!(Operator::parse("eq").is_none());
    }

    #[test]
    fn test_default_schema_fields() {
        let schema = FilterSchema::default();
        assert!(schema.field("author").unwrap().native_filterable);
        assert!(!schema.field("tags").unwrap().native_filterable);
        assert!(schema.field(TIMESTAMP_FIELD).unwrap().native_filterable);
        assert!(schema.field("bogus").is_none());
    }

    #[test]
    fn test_string_fields_reject_ordering_operators() {
        let schema = FilterSchema::default();
        let author = schema.field("author").unwrap();
        assert!(author.supports(Operator::Eq));
        assert!(author.supports(Operator::Nin));
        assert!(!author.supports(Operator::Gte));

        let ts = schema.field(TIMESTAMP_FIELD).unwrap();
        assert!(ts.supports(Operator::Gte));
        assert!(ts.supports(Operator::Lt));
    }

    #[test]
    fn test_prompt_description_mentions_every_field() {
        let schema = FilterSchema::default();
        let desc = schema.prompt_description();
        for f in schema.fields() {
            assert!(desc.contains(&f.name), "missing field: {}", f.name);
        }
    }
}
