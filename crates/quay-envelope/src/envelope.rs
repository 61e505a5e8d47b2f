//! # Outer Envelope Framing
//!
//! The fixed `quay.Envelope` record. Both sides compile the same constant
//! document, so the framing never depends on a per-message schema.

use std::sync::OnceLock;

use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema};

use crate::error::EnvelopeError;

/// Avro document of the outer envelope record.
pub const ENVELOPE_SCHEMA: &str = r#"{
  "type": "record",
  "name": "Envelope",
  "namespace": "quay",
  "fields": [
    {"name": "contextSchema", "type": "string"},
    {"name": "contextBuffer", "type": "bytes"},
    {"name": "messageSchema", "type": "string"},
    {"name": "messageBuffer", "type": "bytes"}
  ]
}"#;

/// The compiled outer schema, parsed once per process.
pub fn envelope_schema() -> Result<&'static Schema, String> {
    static SCHEMA: OnceLock<Result<Schema, String>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| Schema::parse_str(ENVELOPE_SCHEMA).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| format!("envelope schema does not compile: {e}"))
}

/// The four framed fields of one message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Schema document of the context payload.
    pub context_schema: String,
    /// Context encoded with `context_schema`.
    pub context_buffer: Vec<u8>,
    /// The writer's message schema document.
    pub message_schema: String,
    /// Message encoded with `message_schema`.
    pub message_buffer: Vec<u8>,
}

impl Envelope {
    /// Frame the envelope into its outer buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let schema = envelope_schema().map_err(EnvelopeError::Encode)?;
        let record = AvroValue::Record(vec![
            (
                "contextSchema".into(),
                AvroValue::String(self.context_schema.clone()),
            ),
            (
                "contextBuffer".into(),
                AvroValue::Bytes(self.context_buffer.clone()),
            ),
            (
                "messageSchema".into(),
                AvroValue::String(self.message_schema.clone()),
            ),
            (
                "messageBuffer".into(),
                AvroValue::Bytes(self.message_buffer.clone()),
            ),
        ]);
        to_avro_datum(schema, record).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Parse an outer buffer. Bytes left over after the last field are an
    /// error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let schema = envelope_schema().map_err(EnvelopeError::Decode)?;
        let mut reader = bytes;
        let value = from_avro_datum(schema, &mut reader, None)
            .map_err(|e| EnvelopeError::Decode(format!("malformed envelope: {e}")))?;
        if !reader.is_empty() {
            return Err(EnvelopeError::Decode(format!(
                "{} trailing bytes after envelope",
                reader.len()
            )));
        }

        let AvroValue::Record(fields) = value else {
            return Err(EnvelopeError::Decode("envelope is not a record".into()));
        };
        let mut context_schema = None;
        let mut context_buffer = None;
        let mut message_schema = None;
        let mut message_buffer = None;
        for (name, field) in fields {
            match (name.as_str(), field) {
                ("contextSchema", AvroValue::String(s)) => context_schema = Some(s),
                ("contextBuffer", AvroValue::Bytes(b)) => context_buffer = Some(b),
                ("messageSchema", AvroValue::String(s)) => message_schema = Some(s),
                ("messageBuffer", AvroValue::Bytes(b)) => message_buffer = Some(b),
                (other, _) => {
                    return Err(EnvelopeError::Decode(format!(
                        "unexpected envelope field '{other}'"
                    )))
                }
            }
        }

        let missing = |field: &str| EnvelopeError::Decode(format!("envelope lacks '{field}'"));
        Ok(Self {
            context_schema: context_schema.ok_or_else(|| missing("contextSchema"))?,
            context_buffer: context_buffer.ok_or_else(|| missing("contextBuffer"))?,
            message_schema: message_schema.ok_or_else(|| missing("messageSchema"))?,
            message_buffer: message_buffer.ok_or_else(|| missing("messageBuffer"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            context_schema: "a".into(),
            context_buffer: vec![1],
            message_schema: "b".into(),
            message_buffer: vec![2],
        }
    }

    #[test]
    fn fields_framed_in_order() {
        // Each field is a zig-zag length (1 → 0x02) followed by its bytes.
        assert_eq!(
            sample().to_bytes().unwrap(),
            vec![0x02, b'a', 0x02, 0x01, 0x02, b'b', 0x02, 0x02]
        );
    }

    #[test]
    fn parses_framed_bytes() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.push(0);
        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::Decode("1 trailing bytes after envelope".into())
        );
    }

    #[test]
    fn truncated_bytes_rejected() {
        let bytes = sample().to_bytes().unwrap();
        let err = Envelope::from_bytes(&bytes[..5]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode(_)), "{err}");
        assert!(Envelope::from_bytes(&[]).is_err());
    }

    #[test]
    fn schema_compiles() {
        let schema = envelope_schema().unwrap();
        assert!(matches!(schema, Schema::Record(_)));
    }
}
