//! Mapping between host values and JSON documents.
//!
//! Only JSON-shaped values cross: none, booleans, numbers, strings, lists,
//! string-keyed maps and records (written as objects). Numbers read back as
//! `Int` when they are integral and fit in an `i64`, `Float` otherwise.

use std::collections::BTreeMap;

use litengine::Error;
use litengine::FieldPath;
use litengine::PathSegment;
use litengine::Result;
use litengine::Value;
use serde_json::Map;
use serde_json::Number;

pub fn to_json(value: &Value, path: &FieldPath) -> Result<serde_json::Value> {
    let mismatch = || Error::TypeMismatch {
        path: path.clone(),
        expected: "JSON value".into(),
        found: value.describe(),
    };
    Ok(match value {
        Value::None => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Value::Number(Number::from_f64(*f).ok_or_else(mismatch)?),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_json(item, &path.child(PathSegment::Index(i))))
                .collect::<Result<_>>()?,
        ),
        Value::Map(entries) => object(entries, path, |k| PathSegment::Key(k.to_string()))?,
        Value::Record(record) => object(&record.fields, path, |k| PathSegment::Field(k.to_string()))?,
        _ => return Err(mismatch()),
    })
}

fn object(
    entries: &BTreeMap<String, Value>,
    path: &FieldPath,
    segment: impl Fn(&str) -> PathSegment,
) -> Result<serde_json::Value> {
    let mut out = Map::new();
    for (k, v) in entries {
        out.insert(k.clone(), to_json(v, &path.child(segment(k)))?);
    }
    Ok(serde_json::Value::Object(out))
}

pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => {
            Value::Map(entries.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}
