//! Transformers for the generic shapes. Each one delegates its parameters
//! back through the context, so nesting is unbounded apart from the
//! configured depth limit.

mod mapping;
mod record;
mod sequence;
mod union;

use std::sync::Arc;

use crate::error::Result;
use crate::registry::Registry;

pub use mapping::MappingTransformer;
pub use record::RecordTransformer;
pub use sequence::SequenceTransformer;
pub use union::OptionalTransformer;
pub use union::UnionTransformer;

pub(crate) fn install(registry: &Registry) -> Result<()> {
    registry.register_default(Arc::new(SequenceTransformer))?;
    registry.register_default(Arc::new(MappingTransformer))?;
    registry.register_default(Arc::new(OptionalTransformer))?;
    registry.register_default(Arc::new(UnionTransformer))?;
    registry.register_default(Arc::new(RecordTransformer))?;
    Ok(())
}
