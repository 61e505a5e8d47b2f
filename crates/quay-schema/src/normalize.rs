//! # Schema Normalization
//!
//! Resolves the three accepted schema forms into one [`CompiledSchema`].
//! Normalization is a pure transform: it never touches shared state.

use std::fmt;
use std::sync::Arc;

use apache_avro::schema::{EnumSchema, FixedSchema, RecordSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use quay_core::{ErrorKind, NameError, SchemaName, ValidationError, ValidationViolations};
use serde_json::Value;
use thiserror::Error;

use crate::conform::conform;

/// A schema in any of its accepted forms.
#[derive(Debug, Clone)]
pub enum SchemaInput {
    /// Avro schema JSON as text.
    Raw(String),
    /// Avro schema as a parsed JSON document.
    Document(Value),
    /// A schema already compiled by the Avro engine.
    Compiled(Schema),
}

impl From<&str> for SchemaInput {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for SchemaInput {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<Value> for SchemaInput {
    fn from(document: Value) -> Self {
        Self::Document(document)
    }
}

impl From<Schema> for SchemaInput {
    fn from(schema: Schema) -> Self {
        Self::Compiled(schema)
    }
}

impl From<&CompiledSchema> for SchemaInput {
    fn from(schema: &CompiledSchema) -> Self {
        Self::Compiled(schema.avro().clone())
    }
}

impl From<CompiledSchema> for SchemaInput {
    fn from(schema: CompiledSchema) -> Self {
        Self::from(&schema)
    }
}

/// Error normalizing a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No schema was supplied.
    #[error("missing parameter: schema")]
    MissingParameter,

    /// Raw schema text is not valid JSON.
    #[error("malformed schema document: {0}")]
    MalformedDocument(String),

    /// The document is valid JSON but not a valid Avro schema.
    #[error("schema compile error: {0}")]
    Compile(String),

    /// The schema is not a named type (record, enum or fixed).
    #[error("schema has no name; only named types (record, enum, fixed) can address messages")]
    MissingName,

    /// The schema's name cannot be split into namespace and short name.
    #[error("invalid schema name: {0}")]
    InvalidName(#[from] NameError),
}

impl SchemaError {
    /// Taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParameter => ErrorKind::MissingParameter,
            Self::MalformedDocument(_) | Self::Compile(_) => ErrorKind::SchemaCompile,
            Self::MissingName | Self::InvalidName(_) => ErrorKind::InvalidParameter,
        }
    }
}

/// Normalize a schema supplied in any accepted form.
///
/// # Errors
///
/// - [`SchemaError::MissingParameter`] when `input` is `None`.
/// - [`SchemaError::MalformedDocument`] when raw text is not JSON.
/// - [`SchemaError::Compile`] when the document is not a valid Avro schema.
/// - [`SchemaError::MissingName`] when the schema is not a named type.
pub fn normalize(input: Option<SchemaInput>) -> Result<CompiledSchema, SchemaError> {
    let schema = match input.ok_or(SchemaError::MissingParameter)? {
        SchemaInput::Raw(raw) => {
            let document: Value = serde_json::from_str(&raw)
                .map_err(|e| SchemaError::MalformedDocument(e.to_string()))?;
            compile(&document)?
        }
        SchemaInput::Document(document) => compile(&document)?,
        SchemaInput::Compiled(schema) => schema,
    };
    CompiledSchema::from_avro(schema)
}

fn compile(document: &Value) -> Result<Schema, SchemaError> {
    Schema::parse(document).map_err(|e| SchemaError::Compile(e.to_string()))
}

/// Fully-qualified name of a named Avro type.
pub(crate) fn avro_full_name(schema: &Schema) -> Option<String> {
    match schema {
        Schema::Record(RecordSchema { name, .. })
        | Schema::Enum(EnumSchema { name, .. })
        | Schema::Fixed(FixedSchema { name, .. })
        | Schema::Ref { name } => Some(name.fullname(None)),
        _ => None,
    }
}

/// An Avro schema that has passed normalization.
///
/// Immutable and cheap to clone. Equality compares the serialized document.
#[derive(Clone)]
pub struct CompiledSchema {
    inner: Arc<Schema>,
    name: SchemaName,
    document: Arc<str>,
}

impl CompiledSchema {
    /// Normalize any accepted form. Equivalent to `normalize(Some(input))`.
    pub fn new(input: impl Into<SchemaInput>) -> Result<Self, SchemaError> {
        normalize(Some(input.into()))
    }

    fn from_avro(schema: Schema) -> Result<Self, SchemaError> {
        let full = avro_full_name(&schema)
            .filter(|n| !n.is_empty())
            .ok_or(SchemaError::MissingName)?;
        let name = SchemaName::parse(&full)?;
        let document = serde_json::to_string(&schema)
            .map_err(|e| SchemaError::Compile(format!("cannot serialize schema: {e}")))?;
        Ok(Self {
            inner: Arc::new(schema),
            name,
            document: Arc::from(document),
        })
    }

    /// The schema's name.
    pub fn name(&self) -> &SchemaName {
        &self.name
    }

    /// The fully-qualified name, e.g. `com.example.FullName`.
    pub fn full_name(&self) -> String {
        self.name.full()
    }

    /// The underlying Avro schema.
    pub fn avro(&self) -> &Schema {
        &self.inner
    }

    /// The schema serialized back to a JSON document string.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Check `value` against the schema and convert it to an Avro value.
    ///
    /// # Errors
    ///
    /// Returns every violation found when the value does not conform.
    pub fn conform(&self, value: &Value) -> Result<AvroValue, ValidationViolations> {
        conform(&self.inner, value)
    }

    /// All violations of `value` against the schema; empty when valid.
    pub fn violations(&self, value: &Value) -> ValidationViolations {
        match self.conform(value) {
            Ok(_) => ValidationViolations::new(),
            Err(violations) => violations,
        }
    }

    /// Validate `value`, naming this schema in the error. On success the
    /// converted Avro value is returned so it can be encoded directly.
    pub fn validate(&self, value: &Value) -> Result<AvroValue, ValidationError> {
        self.conform(value).map_err(|violations| ValidationError {
            schema: self.full_name(),
            violations,
        })
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("name", &self.name.full())
            .field("document", &self.document)
            .finish()
    }
}

impl PartialEq for CompiledSchema {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
    }
}

impl Eq for CompiledSchema {}

impl TryFrom<SchemaInput> for CompiledSchema {
    type Error = SchemaError;

    fn try_from(input: SchemaInput) -> Result<Self, Self::Error> {
        normalize(Some(input))
    }
}
