use std::collections::BTreeMap;

use litengine::Error;
use litengine::FieldPath;
use litengine::RecordValue;
use litengine::Value;
use serde_json::json;

use crate::json::from_json;
use crate::json::to_json;

#[test]
fn test_integral_numbers_read_as_int() {
    assert_eq!(from_json(json!(3)), Value::Int(3));
    assert_eq!(from_json(json!(-7)), Value::Int(-7));
    assert_eq!(from_json(json!(2.5)), Value::Float(2.5));
    assert_eq!(from_json(json!(u64::MAX)), Value::Float(u64::MAX as f64));
}

#[test]
fn test_nested_document() {
    let doc = json!({"name": "a", "tags": ["x", null], "ok": true});
    let mut expected = BTreeMap::new();
    expected.insert("name".to_string(), Value::str("a"));
    expected.insert("tags".to_string(), Value::list([Value::str("x"), Value::None]));
    expected.insert("ok".to_string(), Value::Bool(true));
    assert_eq!(from_json(doc.clone()), Value::Map(expected.clone()));
    assert_eq!(to_json(&Value::Map(expected), &FieldPath::root()).expect("json"), doc);
}

#[test]
fn test_record_written_as_object() -> litengine::Result<()> {
    let record = RecordValue::anonymous().with("x", 1).with("y", 2.0);
    let doc = to_json(&Value::Record(record), &FieldPath::root())?;
    assert_eq!(doc, json!({"x": 1, "y": 2.0}));
    Ok(())
}

#[test]
fn test_non_json_values_rejected() {
    let value = Value::list([Value::Int(1), Value::Bytes(vec![0, 1])]);
    match to_json(&value, &FieldPath::root()) {
        Err(Error::TypeMismatch { path, found, .. }) => {
            assert_eq!(path.to_string(), "$[1]");
            assert_eq!(found, "bytes");
        }
        other => panic!("expected a mismatch, got {:?}", other),
    }
}

#[test]
fn test_non_finite_float_rejected() {
    assert!(matches!(
        to_json(&Value::Float(f64::NAN), &FieldPath::root()),
        Err(Error::TypeMismatch { .. })
    ));
}
