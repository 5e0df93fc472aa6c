use litpack::BlobType;
use litpack::Dimensionality;
use litpack::Literal;
use litpack::WireType;

use crate::error::Error;
use crate::error::Result;
use crate::host::HostType;
use crate::host::TypeKey;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;
use crate::value::Value;

/// Generic file and directory references. The format is left open, so any
/// blob of the right dimensionality passes through untouched.
pub struct BlobTransformer {
    key: TypeKey,
    dimensionality: Dimensionality,
}

impl BlobTransformer {
    pub fn new(key: impl Into<TypeKey>, dimensionality: Dimensionality) -> Self {
        Self { key: key.into(), dimensionality }
    }

    fn blob_type(&self) -> BlobType {
        BlobType::new("", self.dimensionality)
    }
}

impl Transformer for BlobTransformer {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn key(&self) -> HostKey {
        HostKey::Exact(self.key.clone())
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> Result<WireType> {
        Ok(WireType::Blob(self.blob_type()))
    }

    fn check_value(&self, cx: &Context, _ty: &HostType, value: &Value) -> Result<()> {
        match value {
            Value::Blob(b) if b.dimensionality == self.dimensionality => Ok(()),
            other => Err(cx.mismatch(&self.key, other)),
        }
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, _expected: &WireType) -> Result<Literal> {
        self.check_value(cx, ty, value)?;
        match value {
            Value::Blob(b) => Ok(Literal::blob(b.clone())),
            other => Err(cx.mismatch(&self.key, other)),
        }
    }

    fn decode(&self, cx: &Context, literal: &Literal, _ty: &HostType) -> Result<Value> {
        match literal.as_blob() {
            Some(b) if b.dimensionality == self.dimensionality => Ok(Value::Blob(b.clone())),
            _ => Err(cx.decode_error(&self.key, literal)),
        }
    }

    fn infer_host_type(&self, _cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Blob(bt) if bt.dimensionality == self.dimensionality => {
                Ok(HostType::Named(self.key.clone()))
            }
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn blob_formats(&self) -> Vec<BlobType> {
        vec![self.blob_type()]
    }

    fn overridable(&self) -> bool {
        false
    }
}
