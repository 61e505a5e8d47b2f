//! # Value Conformance
//!
//! Checks a JSON value against an Avro schema and builds the matching Avro
//! value in one walk. The walk never stops early: every offending location
//! produces its own [`Violation`] with the field path and the expected type.
//!
//! ## Mapping
//!
//! - `int` / `long` accept integral JSON numbers in range; `float` /
//!   `double` accept any number.
//! - `bytes` / `fixed` accept strings whose characters are all ≤ U+00FF
//!   (the Avro JSON encoding).
//! - Records take missing fields from the field default. A missing field
//!   whose type admits `null` is read as `null`. Undeclared fields are
//!   ignored.
//! - Unions pick the first branch the value conforms to. A JSON float tries
//!   `int`/`long` branches last.

use std::collections::HashMap;

use apache_avro::schema::{EnumSchema, FixedSchema, RecordSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use quay_core::{ValidationViolations, Violation};
use serde_json::Value;

/// Check `value` against `schema` and convert it to an Avro value.
///
/// # Errors
///
/// Returns every violation found when the value does not conform.
pub fn conform(schema: &Schema, value: &Value) -> Result<AvroValue, ValidationViolations> {
    let conformer = Conformer::new(schema);
    let mut violations = ValidationViolations::new();
    match conformer.convert(value, schema, "", &mut violations) {
        Some(converted) if violations.is_empty() => Ok(converted),
        _ => Err(violations),
    }
}

/// Human-readable label for the type a schema expects.
pub fn type_label(schema: &Schema) -> String {
    match schema {
        Schema::Null => "null".into(),
        Schema::Boolean => "boolean".into(),
        Schema::Int => "int".into(),
        Schema::Long => "long".into(),
        Schema::Float => "float".into(),
        Schema::Double => "double".into(),
        Schema::Bytes => "bytes".into(),
        Schema::String => "string".into(),
        Schema::Array(items) => format!("array<{}>", type_label(items)),
        Schema::Map(values) => format!("map<{}>", type_label(values)),
        Schema::Union(union) => {
            let labels: Vec<String> = union.variants().iter().map(type_label).collect();
            format!("union [{}]", labels.join(", "))
        }
        Schema::Record(RecordSchema { name, .. }) => format!("record {}", name.fullname(None)),
        Schema::Enum(EnumSchema { name, .. }) => format!("enum {}", name.fullname(None)),
        Schema::Fixed(FixedSchema { name, .. }) => format!("fixed {}", name.fullname(None)),
        Schema::Ref { name } => name.fullname(None),
        Schema::Date => "date".into(),
        Schema::TimeMillis => "time-millis".into(),
        Schema::TimeMicros => "time-micros".into(),
        Schema::TimestampMillis => "timestamp-millis".into(),
        Schema::TimestampMicros => "timestamp-micros".into(),
        Schema::Uuid => "uuid".into(),
        _ => "unsupported logical type".into(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn field_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Integral value of a JSON number, accepting floats with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Bytes of an ISO-8859-1 string; `None` if any char is above U+00FF.
pub(crate) fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

fn accepts_null(schema: &Schema) -> bool {
    match schema {
        Schema::Null => true,
        Schema::Union(union) => union.variants().iter().any(|v| matches!(v, Schema::Null)),
        _ => false,
    }
}

fn collect_names<'s>(schema: &'s Schema, names: &mut HashMap<String, &'s Schema>) {
    match schema {
        Schema::Record(RecordSchema { name, fields, .. }) => {
            names.insert(name.fullname(None), schema);
            for field in fields {
                collect_names(&field.schema, names);
            }
        }
        Schema::Enum(EnumSchema { name, .. }) | Schema::Fixed(FixedSchema { name, .. }) => {
            names.insert(name.fullname(None), schema);
        }
        Schema::Array(items) => collect_names(items, names),
        Schema::Map(values) => collect_names(values, names),
        Schema::Union(union) => {
            for variant in union.variants() {
                collect_names(variant, names);
            }
        }
        _ => {}
    }
}

struct Conformer<'s> {
    names: HashMap<String, &'s Schema>,
}

impl<'s> Conformer<'s> {
    fn new(root: &'s Schema) -> Self {
        let mut names = HashMap::new();
        collect_names(root, &mut names);
        Self { names }
    }

    fn mismatch(
        &self,
        value: &Value,
        schema: &Schema,
        path: &str,
        out: &mut ValidationViolations,
    ) -> Option<AvroValue> {
        let expected = type_label(schema);
        let message = format!("expected {expected}, got {}", json_kind(value));
        out.push(Violation::new(path, expected, message));
        None
    }

    fn convert(
        &self,
        value: &Value,
        schema: &'s Schema,
        path: &str,
        out: &mut ValidationViolations,
    ) -> Option<AvroValue> {
        let converted = match schema {
            Schema::Null => value.is_null().then_some(AvroValue::Null),
            Schema::Boolean => value.as_bool().map(AvroValue::Boolean),
            Schema::Int => as_integer(value)
                .and_then(|n| i32::try_from(n).ok())
                .map(AvroValue::Int),
            Schema::Long => as_integer(value).map(AvroValue::Long),
            Schema::Float => value.as_f64().map(|f| AvroValue::Float(f as f32)),
            Schema::Double => value.as_f64().map(AvroValue::Double),
            Schema::String => value.as_str().map(|s| AvroValue::String(s.to_string())),
            Schema::Bytes => value.as_str().and_then(latin1_bytes).map(AvroValue::Bytes),
            Schema::Date => as_integer(value)
                .and_then(|n| i32::try_from(n).ok())
                .map(AvroValue::Date),
            Schema::TimeMillis => as_integer(value)
                .and_then(|n| i32::try_from(n).ok())
                .map(AvroValue::TimeMillis),
            Schema::TimeMicros => as_integer(value).map(AvroValue::TimeMicros),
            Schema::TimestampMillis => as_integer(value).map(AvroValue::TimestampMillis),
            Schema::TimestampMicros => as_integer(value).map(AvroValue::TimestampMicros),
            Schema::Uuid => value
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .map(AvroValue::Uuid),
            Schema::Fixed(FixedSchema { size, .. }) => {
                let Some(bytes) = value.as_str().and_then(latin1_bytes) else {
                    return self.mismatch(value, schema, path, out);
                };
                if bytes.len() != *size {
                    out.push(Violation::new(
                        path,
                        type_label(schema),
                        format!("expected {size} bytes, got {}", bytes.len()),
                    ));
                    return None;
                }
                Some(AvroValue::Fixed(*size, bytes))
            }
            Schema::Enum(EnumSchema { symbols, .. }) => {
                let Some(symbol) = value.as_str() else {
                    return self.mismatch(value, schema, path, out);
                };
                match symbols.iter().position(|s| s == symbol) {
                    Some(index) => Some(AvroValue::Enum(index as u32, symbol.to_string())),
                    None => {
                        out.push(Violation::new(
                            path,
                            type_label(schema),
                            format!(
                                "'{symbol}' is not one of [{}]",
                                symbols.join(", ")
                            ),
                        ));
                        return None;
                    }
                }
            }
            Schema::Array(items) => {
                let Some(elements) = value.as_array() else {
                    return self.mismatch(value, schema, path, out);
                };
                let mut converted = Vec::with_capacity(elements.len());
                let mut ok = true;
                for (i, element) in elements.iter().enumerate() {
                    match self.convert(element, items, &index_path(path, i), out) {
                        Some(v) => converted.push(v),
                        None => ok = false,
                    }
                }
                return ok.then_some(AvroValue::Array(converted));
            }
            Schema::Map(values) => {
                let Some(object) = value.as_object() else {
                    return self.mismatch(value, schema, path, out);
                };
                let mut converted = HashMap::with_capacity(object.len());
                let mut ok = true;
                for (key, entry) in object {
                    match self.convert(entry, values, &field_path(path, key), out) {
                        Some(v) => {
                            converted.insert(key.clone(), v);
                        }
                        None => ok = false,
                    }
                }
                return ok.then_some(AvroValue::Map(converted));
            }
            Schema::Record(RecordSchema { fields, .. }) => {
                let Some(object) = value.as_object() else {
                    return self.mismatch(value, schema, path, out);
                };
                let mut record = Vec::with_capacity(fields.len());
                let mut ok = true;
                for field in fields {
                    let child = field_path(path, &field.name);
                    let converted = match (object.get(&field.name), &field.default) {
                        (Some(v), _) => self.convert(v, &field.schema, &child, out),
                        (None, Some(default)) => self.convert(default, &field.schema, &child, out),
                        (None, None) if accepts_null(&field.schema) => {
                            self.convert(&Value::Null, &field.schema, &child, out)
                        }
                        (None, None) => {
                            out.push(Violation::new(
                                child,
                                type_label(&field.schema),
                                "missing required field",
                            ));
                            None
                        }
                    };
                    match converted {
                        Some(v) => record.push((field.name.clone(), v)),
                        None => ok = false,
                    }
                }
                return ok.then_some(AvroValue::Record(record));
            }
            Schema::Union(union) => {
                // A JSON float takes an integral branch only when nothing else fits.
                let float = value.is_f64();
                let integral = |s: &Schema| float && matches!(s, Schema::Int | Schema::Long);
                let variants = union.variants().iter().enumerate();
                let preferred = variants.clone().filter(|&(_, s)| !integral(s));
                let fallback = variants.filter(|&(_, s)| integral(s));
                for (index, variant) in preferred.chain(fallback) {
                    let mut scratch = ValidationViolations::new();
                    if let Some(v) = self.convert(value, variant, path, &mut scratch) {
                        if scratch.is_empty() {
                            return Some(AvroValue::Union(index as u32, Box::new(v)));
                        }
                    }
                }
                None
            }
            Schema::Ref { name } => {
                let full = name.fullname(None);
                match self.names.get(&full).copied() {
                    Some(target) => return self.convert(value, target, path, out),
                    None => {
                        out.push(Violation::new(
                            path,
                            full.clone(),
                            format!("unresolved type reference '{full}'"),
                        ));
                        return None;
                    }
                }
            }
            _ => {
                out.push(Violation::new(
                    path,
                    type_label(schema),
                    "schema type is not supported for JSON values",
                ));
                return None;
            }
        };

        match converted {
            Some(v) => Some(v),
            None => self.mismatch(value, schema, path, out),
        }
    }
}
