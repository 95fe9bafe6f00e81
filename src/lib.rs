//! Natural-language search queries over a filtered vector index.
//!
//! The crate turns free-text queries like "cricket articles by Jane Doe
//! from May 2025" into structured metadata filters and runs them as
//! filtered similarity searches:
//!
//! 1. [`translate`] — a chain of chat-completion providers attempts the
//!    translation; the rule-based extractor in [`extract`] guarantees an
//!    answer when every provider fails.
//! 2. [`validate`] — untyped provider output is projected onto the
//!    [`schema`] as a typed [`filter::FilterExpr`], never an error.
//! 3. [`adapter`] — the filter splits into the part the store evaluates
//!    natively and a residual predicate applied in-process.
//! 4. [`search`] — embeds the query ([`embedding`]), runs the store
//!    query ([`store`]), and applies the residual predicate.

pub mod adapter;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod filter;
pub mod schema;
pub mod search;
pub mod store;
pub mod translate;
pub mod validate;
