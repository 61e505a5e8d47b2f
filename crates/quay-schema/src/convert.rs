//! Avro value → JSON conversion, used after decoding.

use apache_avro::types::Value as AvroValue;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// An Avro value with no JSON representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("avro value has no JSON representation: {0}")]
pub struct UnrepresentableValue(pub String);

fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Convert a decoded Avro value to JSON.
///
/// `bytes` and `fixed` become ISO-8859-1 strings, enums become their symbol
/// and unions are unwrapped to the selected branch. Non-finite floats map to
/// `null`.
pub fn to_json(value: AvroValue) -> Result<Value, UnrepresentableValue> {
    Ok(match value {
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(b) => Value::Bool(b),
        AvroValue::Int(n) | AvroValue::Date(n) | AvroValue::TimeMillis(n) => Value::from(n),
        AvroValue::Long(n)
        | AvroValue::TimeMicros(n)
        | AvroValue::TimestampMillis(n)
        | AvroValue::TimestampMicros(n) => Value::from(n),
        AvroValue::Float(f) => float(f64::from(f)),
        AvroValue::Double(f) => float(f),
        AvroValue::String(s) => Value::String(s),
        AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => Value::String(latin1_string(&b)),
        AvroValue::Enum(_, symbol) => Value::String(symbol),
        AvroValue::Uuid(id) => Value::String(id.to_string()),
        AvroValue::Union(_, inner) => to_json(*inner)?,
        AvroValue::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AvroValue::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, entry) in entries {
                object.insert(key, to_json(entry)?);
            }
            Value::Object(object)
        }
        AvroValue::Record(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (name, field) in fields {
                object.insert(name, to_json(field)?);
            }
            Value::Object(object)
        }
        other => return Err(UnrepresentableValue(format!("{other:?}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn record_with_nested_values() {
        let value = AvroValue::Record(vec![
            ("id".into(), AvroValue::String("abc".into())),
            ("age".into(), AvroValue::Int(3)),
            (
                "email".into(),
                AvroValue::Union(0, Box::new(AvroValue::Null)),
            ),
            (
                "tags".into(),
                AvroValue::Array(vec![AvroValue::String("a".into())]),
            ),
            ("suit".into(), AvroValue::Enum(1, "SPADES".into())),
        ]);
        assert_eq!(
            to_json(value).unwrap(),
            json!({"id": "abc", "age": 3, "email": null, "tags": ["a"], "suit": "SPADES"})
        );
    }

    #[test]
    fn bytes_become_latin1() {
        let value = AvroValue::Bytes(vec![0xff, b'a']);
        assert_eq!(to_json(value).unwrap(), json!("\u{00ff}a"));
        let value = AvroValue::Fixed(2, vec![b'o', b'k']);
        assert_eq!(to_json(value).unwrap(), json!("ok"));
    }

    #[test]
    fn maps_and_floats() {
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), AvroValue::Double(1.5));
        entries.insert("b".to_string(), AvroValue::Float(f32::NAN));
        assert_eq!(
            to_json(AvroValue::Map(entries)).unwrap(),
            json!({"a": 1.5, "b": null})
        );
    }
}
