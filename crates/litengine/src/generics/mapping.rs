use std::collections::BTreeMap;

use litpack::Literal;
use litpack::WireType;

use crate::error::Error;
use crate::error::PathSegment;
use crate::error::Result;
use crate::host::GenericOrigin;
use crate::host::HostType;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;
use crate::value::Value;

/// String-keyed mappings.
pub struct MappingTransformer;

impl MappingTransformer {
    fn value_type(ty: &HostType) -> Result<&HostType> {
        match ty {
            HostType::Mapping(v) => Ok(v),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

impl Transformer for MappingTransformer {
    fn name(&self) -> &str {
        "mapping"
    }

    fn key(&self) -> HostKey {
        HostKey::Origin(GenericOrigin::Mapping)
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        Ok(WireType::mapping(cx.describe(Self::value_type(ty)?)?))
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        let vt = Self::value_type(ty)?;
        match value {
            Value::Map(entries) => {
                for (k, v) in entries {
                    cx.enter(PathSegment::Key(k.clone()))?.check(vt, v)?;
                }
                Ok(())
            }
            other => Err(cx.mismatch(ty, other)),
        }
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        let vt = Self::value_type(ty)?;
        let WireType::Mapping(v_wire) = expected else {
            return Err(Error::TypeMismatch {
                path: cx.path().clone(),
                expected: "mapping".into(),
                found: expected.to_string(),
            });
        };
        match value {
            Value::Map(entries) => {
                let mut out = BTreeMap::new();
                for (k, v) in entries {
                    let lit = cx.enter(PathSegment::Key(k.clone()))?.encode(v, vt, v_wire)?;
                    out.insert(k.clone(), lit);
                }
                Ok(Literal::Mapping(out))
            }
            other => Err(cx.mismatch(ty, other)),
        }
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        let vt = Self::value_type(ty)?;
        match literal {
            Literal::Mapping(entries) => {
                let mut out = BTreeMap::new();
                for (k, lit) in entries {
                    out.insert(k.clone(), cx.enter(PathSegment::Key(k.clone()))?.decode(lit, vt)?);
                }
                Ok(Value::Map(out))
            }
            other => Err(cx.decode_error(ty, other)),
        }
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Mapping(v) => Ok(HostType::mapping(cx.infer(v)?)),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}
