//! Record conformance
//!
//! Projects a raw API record onto the declared schema: undeclared fields are
//! dropped, declared fields are coerced to their declared type. A value that
//! cannot be coerced becomes `null` rather than failing the record.

use super::types::{JsonSchema, JsonType, SchemaProperty};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Conform a top-level record to a stream schema
pub fn conform(record: &Value, schema: &JsonSchema) -> Value {
    match record {
        Value::Object(obj) => Value::Object(project(obj, &schema.properties)),
        _ => Value::Null,
    }
}

/// Conform one value to a property definition
pub fn conform_value(value: &Value, property: &SchemaProperty) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match property.json_type.primary_type() {
        Some(JsonType::Integer) => to_integer(value),
        Some(JsonType::Number) => to_number(value),
        Some(JsonType::String) => to_string(value),
        Some(JsonType::Boolean) => to_boolean(value),
        Some(JsonType::Object) => match (value, &property.properties) {
            (Value::Object(obj), Some(props)) => Value::Object(project(obj, props)),
            (Value::Object(_), None) => value.clone(),
            _ => Value::Null,
        },
        Some(JsonType::Array) => match (value, &property.items) {
            (Value::Array(items), Some(item_schema)) => Value::Array(
                items
                    .iter()
                    .map(|item| conform_value(item, item_schema))
                    .collect(),
            ),
            (Value::Array(_), None) => value.clone(),
            _ => Value::Null,
        },
        Some(JsonType::Null) | None => Value::Null,
    }
}

fn project(obj: &Map<String, Value>, properties: &BTreeMap<String, SchemaProperty>) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, property) in properties {
        if let Some(value) = obj.get(name) {
            out.insert(name.clone(), conform_value(value, property));
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    parsed.map_or(Value::Null, |n| Value::Number(n.into()))
}

fn to_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}

fn to_string(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        _ => Value::Null,
    }
}

fn to_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}
