//! Protected transformers for the nominal types every binding understands.

mod blob;
mod primitive;

use std::sync::Arc;

use litpack::Dimensionality;
use litpack::PrimitiveKind;

use crate::error::Result;
use crate::host::keys;
use crate::registry::Registry;

pub use blob::BlobTransformer;
pub use primitive::PrimitiveTransformer;

const PRIMITIVES: [PrimitiveKind; 8] = [
    PrimitiveKind::None,
    PrimitiveKind::Integer,
    PrimitiveKind::Float,
    PrimitiveKind::String,
    PrimitiveKind::Boolean,
    PrimitiveKind::Datetime,
    PrimitiveKind::Duration,
    PrimitiveKind::Binary,
];

/// Built-in key for a primitive kind, used by reverse inference.
pub fn primitive_key(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::None => keys::NONE,
        PrimitiveKind::Integer => keys::INT,
        PrimitiveKind::Float => keys::FLOAT,
        PrimitiveKind::String => keys::STR,
        PrimitiveKind::Boolean => keys::BOOL,
        PrimitiveKind::Datetime => keys::DATETIME,
        PrimitiveKind::Duration => keys::TIMEDELTA,
        PrimitiveKind::Binary => keys::BYTES,
    }
}

pub(crate) fn install(registry: &Registry) -> Result<()> {
    for kind in PRIMITIVES {
        registry.register_default(Arc::new(PrimitiveTransformer::new(kind)))?;
    }
    registry.register_default(Arc::new(BlobTransformer::new(keys::FILE, Dimensionality::Single)))?;
    registry.register_default(Arc::new(BlobTransformer::new(
        keys::DIRECTORY,
        Dimensionality::Multipart,
    )))?;
    Ok(())
}
