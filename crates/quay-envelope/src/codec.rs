//! # Envelope Codec
//!
//! Encodes `{message, context}` into an [`Envelope`] and decodes it back,
//! resolving the writer's message schema against the reader's.

use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema};
use parking_lot::RwLock;
use quay_schema::{conform, infer_schema_document, to_json, CompiledSchema};
use serde::Serialize;
use serde_json::{json, Value};

use crate::envelope::Envelope;
use crate::error::EnvelopeError;

/// Writer schemas kept before the cache is cleared and refilled.
pub const DEFAULT_WRITER_CACHE_CAPACITY: usize = 512;

/// What a producer puts into an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeContent {
    pub message: Value,
    /// Free-form side payload; `{}` when absent.
    pub context: Option<Value>,
}

impl EnvelopeContent {
    pub fn new(message: Value) -> Self {
        Self {
            message,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// A decoded envelope: plain values, never schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    pub message: Value,
    pub context: Value,
}

/// Encodes and decodes envelopes.
///
/// Cloning is cheap and clones share the writer-schema cache. The cache is
/// keyed by document text and only saves re-parsing; decode results never
/// depend on it.
#[derive(Clone)]
pub struct EnvelopeCodec {
    writers: Arc<RwLock<HashMap<String, Arc<Schema>>>>,
    capacity: usize,
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("cached_writer_schemas", &self.cached_writer_schemas())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_WRITER_CACHE_CAPACITY)
    }

    /// A codec whose writer cache holds at most `capacity` documents.
    /// A capacity of zero disables caching.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            writers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Number of writer schemas currently cached.
    pub fn cached_writer_schemas(&self) -> usize {
        self.writers.read().len()
    }

    /// Encode `content` with `schema` as the message's writer schema.
    ///
    /// The context schema is inferred from the context value.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::Validation`] when the message does not conform.
    /// - [`EnvelopeError::Encode`] when serialization fails.
    pub fn encode(
        &self,
        schema: &CompiledSchema,
        content: &EnvelopeContent,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let message = schema.validate(&content.message)?;
        self.encode_conformed(schema, message, content.context.as_ref())
    }

    /// Encode a message already converted by [`CompiledSchema::validate`].
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Encode`] when serialization fails.
    pub fn encode_conformed(
        &self,
        schema: &CompiledSchema,
        message: AvroValue,
        context: Option<&Value>,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let message_buffer = to_avro_datum(schema.avro(), message)
            .map_err(|e| EnvelopeError::Encode(format!("message: {e}")))?;

        let default_context = json!({});
        let context = context.unwrap_or(&default_context);
        let context_document = infer_schema_document(context);
        let context_schema = Schema::parse(&context_document)
            .map_err(|e| EnvelopeError::Encode(format!("context schema: {e}")))?;
        let context_value = conform(&context_schema, context).map_err(|violations| {
            EnvelopeError::Encode(format!("context does not match its schema: {violations}"))
        })?;
        let context_buffer = to_avro_datum(&context_schema, context_value)
            .map_err(|e| EnvelopeError::Encode(format!("context: {e}")))?;

        Envelope {
            context_schema: context_document.to_string(),
            context_buffer,
            message_schema: schema.document().to_string(),
            message_buffer,
        }
        .to_bytes()
    }

    /// Decode `bytes`, reading the message with `schema` as reader schema.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Decode`] when the envelope is malformed, an embedded
    /// schema does not compile, or the writer's message cannot be resolved
    /// against `schema`.
    pub fn decode(&self, schema: &CompiledSchema, bytes: &[u8]) -> Result<Decoded, EnvelopeError> {
        let envelope = Envelope::from_bytes(bytes)?;

        let context_schema = self.writer_schema(&envelope.context_schema)?;
        let context = read_datum(&context_schema, &envelope.context_buffer, None)
            .map_err(|e| EnvelopeError::Decode(format!("context: {e}")))?;

        let writer = self.writer_schema(&envelope.message_schema)?;
        let message = read_datum(&writer, &envelope.message_buffer, Some(schema.avro()))
            .map_err(|e| {
                EnvelopeError::Decode(format!(
                    "message cannot be read as '{}': {e}",
                    schema.full_name()
                ))
            })?;

        Ok(Decoded { message, context })
    }

    /// Parse an embedded writer document, consulting the cache first.
    fn writer_schema(&self, document: &str) -> Result<Arc<Schema>, EnvelopeError> {
        if let Some(schema) = self.writers.read().get(document) {
            return Ok(Arc::clone(schema));
        }
        let schema = Schema::parse_str(document)
            .map(Arc::new)
            .map_err(|e| EnvelopeError::Decode(format!("embedded schema does not compile: {e}")))?;
        if self.capacity > 0 {
            let mut writers = self.writers.write();
            if writers.len() >= self.capacity {
                tracing::debug!(
                    capacity = self.capacity,
                    "writer schema cache full, clearing"
                );
                writers.clear();
            }
            writers.insert(document.to_string(), Arc::clone(&schema));
        }
        Ok(schema)
    }
}

/// Decode one datum, rejecting unread bytes.
fn read_datum(writer: &Schema, bytes: &[u8], reader: Option<&Schema>) -> Result<Value, String> {
    let mut input = bytes;
    let value = from_avro_datum(writer, &mut input, reader).map_err(|e| e.to_string())?;
    if !input.is_empty() {
        return Err(format!("{} trailing bytes", input.len()));
    }
    to_json(value).map_err(|e| e.to_string())
}
