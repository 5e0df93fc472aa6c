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

/// Ordered sequences. A `List` may be empty; a `Stream` must yield at least
/// one item.
pub struct SequenceTransformer;

impl SequenceTransformer {
    fn element(ty: &HostType) -> Result<&HostType> {
        match ty {
            HostType::Sequence(el) => Ok(el),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn element_wire<'a>(cx: &Context, expected: &'a WireType) -> Result<&'a WireType> {
        match expected {
            WireType::Collection(el) => Ok(el),
            other => Err(Error::TypeMismatch {
                path: cx.path().clone(),
                expected: "collection".into(),
                found: other.to_string(),
            }),
        }
    }
}

impl Transformer for SequenceTransformer {
    fn name(&self) -> &str {
        "sequence"
    }

    fn key(&self) -> HostKey {
        HostKey::Origin(GenericOrigin::Sequence)
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        Ok(WireType::collection(cx.describe(Self::element(ty)?)?))
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        let el = Self::element(ty)?;
        match value {
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    cx.enter(PathSegment::Index(i))?.check(el, item)?;
                }
                Ok(())
            }
            // Items are only seen while encoding.
            Value::Stream(_) => Ok(()),
            other => Err(cx.mismatch(ty, other)),
        }
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        let el = Self::element(ty)?;
        let el_wire = Self::element_wire(cx, expected)?;
        match value {
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(cx.enter(PathSegment::Index(i))?.encode(item, el, el_wire)?);
                }
                Ok(Literal::Collection(out))
            }
            Value::Stream(stream) => {
                let mut out = Vec::new();
                while let Some(item) = stream.try_next()? {
                    let child = cx.enter(PathSegment::Index(out.len()))?;
                    out.push(child.encode(&item, el, el_wire)?);
                }
                if out.is_empty() {
                    return Err(Error::EmptyStream { path: cx.path().clone() });
                }
                Ok(Literal::Collection(out))
            }
            other => Err(cx.mismatch(ty, other)),
        }
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        let el = Self::element(ty)?;
        match literal {
            Literal::Collection(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(cx.enter(PathSegment::Index(i))?.decode(item, el)?);
                }
                Ok(Value::List(out))
            }
            other => Err(cx.decode_error(ty, other)),
        }
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Collection(el) => Ok(HostType::sequence(cx.infer(el)?)),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}
