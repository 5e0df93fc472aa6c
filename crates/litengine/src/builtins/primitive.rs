use litpack::Literal;
use litpack::Primitive;
use litpack::PrimitiveKind;
use litpack::Scalar;
use litpack::WireType;

use crate::builtins::primitive_key;
use crate::error::Error;
use crate::error::Result;
use crate::host::HostType;
use crate::host::TypeKey;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;
use crate::value::Value;

/// One transformer per primitive kind. Floats also take integers.
pub struct PrimitiveTransformer {
    kind: PrimitiveKind,
    key: TypeKey,
}

impl PrimitiveTransformer {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self { kind, key: TypeKey::new(primitive_key(kind)) }
    }

    fn to_literal(&self, value: &Value) -> Option<Literal> {
        let primitive = match (self.kind, value) {
            (PrimitiveKind::None, Value::None) => return Some(Literal::none()),
            (PrimitiveKind::Integer, Value::Int(v)) => Primitive::Integer(*v),
            (PrimitiveKind::Float, Value::Float(v)) => Primitive::Float(*v),
            (PrimitiveKind::Float, Value::Int(v)) => Primitive::Float(*v as f64),
            (PrimitiveKind::String, Value::Str(v)) => Primitive::String(v.clone()),
            (PrimitiveKind::Boolean, Value::Bool(v)) => Primitive::Boolean(*v),
            (PrimitiveKind::Datetime, Value::Datetime(v)) => Primitive::Datetime(*v),
            (PrimitiveKind::Duration, Value::Duration(v)) => Primitive::Duration(*v),
            (PrimitiveKind::Binary, Value::Bytes(v)) => Primitive::Binary(v.clone()),
            _ => return None,
        };
        Some(Literal::primitive(primitive))
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self.kind, value),
            (PrimitiveKind::None, Value::None)
                | (PrimitiveKind::Integer, Value::Int(_))
                | (PrimitiveKind::Float, Value::Float(_) | Value::Int(_))
                | (PrimitiveKind::String, Value::Str(_))
                | (PrimitiveKind::Boolean, Value::Bool(_))
                | (PrimitiveKind::Datetime, Value::Datetime(_))
                | (PrimitiveKind::Duration, Value::Duration(_))
                | (PrimitiveKind::Binary, Value::Bytes(_))
        )
    }
}

impl Transformer for PrimitiveTransformer {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn key(&self) -> HostKey {
        HostKey::Exact(self.key.clone())
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> Result<WireType> {
        Ok(WireType::Primitive(self.kind))
    }

    fn check_value(&self, cx: &Context, _ty: &HostType, value: &Value) -> Result<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(cx.mismatch(&self.key, value))
        }
    }

    fn encode(&self, cx: &Context, value: &Value, _ty: &HostType, _expected: &WireType) -> Result<Literal> {
        self.to_literal(value).ok_or_else(|| cx.mismatch(&self.key, value))
    }

    fn decode(&self, cx: &Context, literal: &Literal, _ty: &HostType) -> Result<Value> {
        let value = match (self.kind, literal) {
            (PrimitiveKind::None, Literal::Scalar(Scalar::None)) => Value::None,
            (kind, Literal::Scalar(Scalar::Primitive(p))) => match (kind, p) {
                (PrimitiveKind::Integer, Primitive::Integer(v)) => Value::Int(*v),
                (PrimitiveKind::Float, Primitive::Float(v)) => Value::Float(*v),
                (PrimitiveKind::Float, Primitive::Integer(v)) => Value::Float(*v as f64),
                (PrimitiveKind::String, Primitive::String(v)) => Value::Str(v.clone()),
                (PrimitiveKind::Boolean, Primitive::Boolean(v)) => Value::Bool(*v),
                (PrimitiveKind::Datetime, Primitive::Datetime(v)) => Value::Datetime(*v),
                (PrimitiveKind::Duration, Primitive::Duration(v)) => Value::Duration(*v),
                (PrimitiveKind::Binary, Primitive::Binary(v)) => Value::Bytes(v.clone()),
                _ => return Err(cx.decode_error(&self.key, literal)),
            },
            _ => return Err(cx.decode_error(&self.key, literal)),
        };
        Ok(value)
    }

    fn infer_host_type(&self, _cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Primitive(kind) if *kind == self.kind => Ok(HostType::Named(self.key.clone())),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn overridable(&self) -> bool {
        false
    }
}
