//! Conversion for values with no declared host type, such as the extra
//! fields of an open record. The literal shape follows the value shape.

use litpack::Literal;
use litpack::Primitive;
use litpack::Scalar;

use crate::error::Error;
use crate::error::FieldPath;
use crate::error::PathSegment;
use crate::error::Result;
use crate::value::RecordValue;
use crate::value::Value;

pub fn literal_from_value(value: &Value, path: &FieldPath) -> Result<Literal> {
    Ok(match value {
        Value::None => Literal::none(),
        Value::Int(v) => Literal::integer(*v),
        Value::Float(v) => Literal::float(*v),
        Value::Str(v) => Literal::string(v.clone()),
        Value::Bool(v) => Literal::boolean(*v),
        Value::Datetime(v) => Literal::primitive(Primitive::Datetime(*v)),
        Value::Duration(v) => Literal::primitive(Primitive::Duration(*v)),
        Value::Bytes(v) => Literal::primitive(Primitive::Binary(v.clone())),
        Value::Blob(b) => Literal::blob(b.clone()),
        Value::List(items) => Literal::Collection(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| literal_from_value(item, &path.child(PathSegment::Index(i))))
                .collect::<Result<_>>()?,
        ),
        Value::Stream(stream) => {
            let items = stream.try_drain()?;
            if items.is_empty() {
                return Err(Error::EmptyStream { path: path.clone() });
            }
            Literal::Collection(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| literal_from_value(item, &path.child(PathSegment::Index(i))))
                    .collect::<Result<_>>()?,
            )
        }
        Value::Map(entries) => Literal::Mapping(
            entries
                .iter()
                .map(|(k, v)| {
                    literal_from_value(v, &path.child(PathSegment::Key(k.clone())))
                        .map(|lit| (k.clone(), lit))
                })
                .collect::<Result<_>>()?,
        ),
        Value::Record(r) => Literal::Record(
            r.fields
                .iter()
                .map(|(k, v)| {
                    literal_from_value(v, &path.child(PathSegment::Field(k.clone())))
                        .map(|lit| (k.clone(), lit))
                })
                .collect::<Result<_>>()?,
        ),
        Value::Opaque(o) => return Err(Error::UnsupportedType(o.key().to_string())),
    })
}

pub fn value_from_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Scalar(Scalar::None) => Value::None,
        Literal::Scalar(Scalar::Primitive(p)) => match p {
            Primitive::Integer(v) => Value::Int(*v),
            Primitive::Float(v) => Value::Float(*v),
            Primitive::String(v) => Value::Str(v.clone()),
            Primitive::Boolean(v) => Value::Bool(*v),
            Primitive::Datetime(v) => Value::Datetime(*v),
            Primitive::Duration(v) => Value::Duration(*v),
            Primitive::Binary(v) => Value::Bytes(v.clone()),
        },
        Literal::Scalar(Scalar::Blob(b)) => Value::Blob(b.clone()),
        Literal::Collection(items) => Value::List(items.iter().map(value_from_literal).collect()),
        Literal::Mapping(entries) => Value::Map(
            entries.iter().map(|(k, v)| (k.clone(), value_from_literal(v))).collect(),
        ),
        Literal::Record(fields) => Value::Record(RecordValue {
            type_name: None,
            fields: fields.iter().map(|(k, v)| (k.clone(), value_from_literal(v))).collect(),
        }),
        Literal::Union(uv) => value_from_literal(&uv.value),
    }
}
