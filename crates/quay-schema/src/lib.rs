//! # quay-schema — Schema Normalization & Validation
//!
//! Every schema entering Quay passes through [`normalize`], whichever of the
//! three accepted forms it arrives in:
//!
//! - [`SchemaInput::Raw`] — Avro schema JSON as text.
//! - [`SchemaInput::Document`] — an already-parsed JSON document.
//! - [`SchemaInput::Compiled`] — a schema compiled by `apache-avro`, accepted
//!   as-is without recompilation.
//!
//! All three normalize to [`CompiledSchema`], so downstream code never cares
//! which form a caller used. A compiled schema always carries a non-empty
//! fully-qualified name.
//!
//! ## Values
//!
//! Messages are `serde_json::Value`s. [`CompiledSchema::conform`] checks a
//! value against the schema and converts it to an Avro value in the same
//! pass, collecting every violation rather than stopping at the first.
//! [`to_json`] is the inverse used after decoding.
//!
//! ## Context Inference
//!
//! [`infer_schema_document`] derives an Avro schema from an arbitrary JSON
//! value. Nested records get synthetic names (`Context1`, `Context2`, …)
//! from a counter owned by the single inference call.

pub mod conform;
pub mod convert;
pub mod infer;
pub mod normalize;

pub use conform::{conform, type_label};
pub use convert::{to_json, UnrepresentableValue};
pub use infer::{
    infer_context_schema, infer_schema_document, infer_schema_document_with,
    CONTEXT_NAMESPACE,
};
pub use normalize::{normalize, CompiledSchema, SchemaError, SchemaInput};

/// Re-exported so callers can build [`SchemaInput::Compiled`] without a
/// direct `apache-avro` dependency.
pub use apache_avro::Schema as AvroSchema;
