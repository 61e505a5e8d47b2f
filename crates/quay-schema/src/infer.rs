//! # Context Schema Inference
//!
//! A message context is free-form JSON, so the envelope codec derives its
//! schema from the value itself. Every record in the result is named, since
//! Avro rejects anonymous records. Names come from a caller-supplied
//! generator; [`infer_schema_document`] uses `Context1`, `Context2`, … in
//! depth-first encounter order with a counter local to the call, so
//! concurrent encodes never share naming state.

use apache_avro::Schema;
use serde_json::{json, Value};

use crate::normalize::SchemaError;

/// Namespace of every record produced by context inference.
pub const CONTEXT_NAMESPACE: &str = "quay.envelope.context";

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Null,
    Boolean,
    Int,
    Long,
    Double,
    String,
    Array(Box<Shape>),
    Map(Box<Shape>),
    Record(Vec<(String, Shape)>),
    Union(Vec<Shape>),
}

impl Shape {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Self::Int,
                Some(_) => Self::Long,
                None => Self::Double,
            },
            Value::String(_) => Self::String,
            Value::Array(items) => {
                Self::Array(Box::new(Self::merge_all(items.iter().map(Self::of))))
            }
            Value::Object(object) if object.keys().all(|k| is_avro_name(k)) => Self::Record(
                object
                    .iter()
                    .map(|(name, v)| (name.clone(), Self::of(v)))
                    .collect(),
            ),
            Value::Object(object) => {
                Self::Map(Box::new(Self::merge_all(object.values().map(Self::of))))
            }
        }
    }

    /// Merged shape of a sequence; `null` when empty.
    fn merge_all(shapes: impl Iterator<Item = Shape>) -> Self {
        shapes.reduce(Self::merge).unwrap_or(Self::Null)
    }

    /// Union branch kind. A union holds at most one branch per kind, ordered
    /// by kind with `null` first.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean => 1,
            Self::Int | Self::Long => 2,
            Self::Double => 3,
            Self::String => 4,
            Self::Array(_) => 5,
            Self::Map(_) | Self::Record(_) => 6,
            Self::Union(_) => 7,
        }
    }

    fn merge(self, other: Self) -> Self {
        if self == other {
            return self;
        }
        match (self, other) {
            (Self::Int | Self::Long, Self::Int | Self::Long) => Self::Long,
            (Self::Array(a), Self::Array(b)) => Self::Array(Box::new(a.merge(*b))),
            (Self::Record(a), Self::Record(b)) if same_keys(&a, &b) => {
                Self::Record(merge_fields(a, b))
            }
            (Self::Record(a), Self::Record(b)) => Self::Map(Box::new(Self::merge_all(
                a.into_iter().chain(b).map(|(_, shape)| shape),
            ))),
            (Self::Map(values), Self::Record(fields)) | (Self::Record(fields), Self::Map(values)) => {
                Self::Map(Box::new(Self::merge_all(
                    std::iter::once(*values).chain(fields.into_iter().map(|(_, shape)| shape)),
                )))
            }
            (Self::Map(a), Self::Map(b)) => Self::Map(Box::new(a.merge(*b))),
            (Self::Union(branches), other) => union_of(branches, other),
            (this, Self::Union(branches)) => union_of(branches, this),
            (a, b) => union_of(vec![a], b),
        }
    }

    fn render(&self, next_name: &mut dyn FnMut() -> String) -> Value {
        match self {
            Self::Null => json!("null"),
            Self::Boolean => json!("boolean"),
            Self::Int => json!("int"),
            Self::Long => json!("long"),
            Self::Double => json!("double"),
            Self::String => json!("string"),
            Self::Array(items) => json!({"type": "array", "items": items.render(next_name)}),
            Self::Map(values) => json!({"type": "map", "values": values.render(next_name)}),
            Self::Record(fields) => {
                let name = next_name();
                let fields: Vec<Value> = fields
                    .iter()
                    .map(|(field, shape)| json!({"name": field, "type": shape.render(next_name)}))
                    .collect();
                json!({
                    "type": "record",
                    "name": name,
                    "namespace": CONTEXT_NAMESPACE,
                    "fields": fields,
                })
            }
            Self::Union(branches) => {
                Value::Array(branches.iter().map(|b| b.render(next_name)).collect())
            }
        }
    }
}

/// Add `shape` to a union, merging it into the branch of the same kind.
///
/// Avro forbids nested unions and duplicate unnamed branch types.
fn union_of(mut branches: Vec<Shape>, shape: Shape) -> Shape {
    if let Shape::Union(inner) = shape {
        return inner.into_iter().fold(Shape::Union(branches), Shape::merge);
    }
    match branches.iter().position(|b| b.rank() == shape.rank()) {
        Some(i) => {
            let existing = branches.remove(i);
            branches.push(existing.merge(shape));
        }
        None => branches.push(shape),
    }
    branches.sort_by_key(Shape::rank);
    if branches.len() == 1 {
        branches.remove(0)
    } else {
        Shape::Union(branches)
    }
}

fn same_keys(left: &[(String, Shape)], right: &[(String, Shape)]) -> bool {
    left.len() == right.len() && left.iter().all(|(k, _)| right.iter().any(|(r, _)| r == k))
}

fn merge_fields(
    left: Vec<(String, Shape)>,
    mut right: Vec<(String, Shape)>,
) -> Vec<(String, Shape)> {
    left.into_iter()
        .map(|(name, shape)| {
            let partner = right
                .iter()
                .position(|(r, _)| *r == name)
                .map(|i| right.swap_remove(i).1);
            match partner {
                Some(other) => (name, shape.merge(other)),
                None => (name, shape),
            }
        })
        .collect()
}

/// Whether `key` is a valid Avro name: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_avro_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Infer an Avro schema document for `value`, naming records with
/// `next_name` in depth-first encounter order.
pub fn infer_schema_document_with(value: &Value, next_name: &mut dyn FnMut() -> String) -> Value {
    Shape::of(value).render(next_name)
}

/// Infer an Avro schema document for `value`, naming records `Context1`,
/// `Context2`, … under [`CONTEXT_NAMESPACE`].
pub fn infer_schema_document(value: &Value) -> Value {
    let mut counter = 0u32;
    let mut next_name = || {
        counter += 1;
        format!("Context{counter}")
    };
    infer_schema_document_with(value, &mut next_name)
}

/// Infer and compile a schema for `value`.
///
/// # Errors
///
/// [`SchemaError::Compile`] if the inferred document does not compile.
pub fn infer_context_schema(value: &Value) -> Result<Schema, SchemaError> {
    Schema::parse(&infer_schema_document(value)).map_err(|e| SchemaError::Compile(e.to_string()))
}
