//! # Litpack
//!
//! The wire-level vocabulary of the workflow platform: type descriptors
//! (`WireType`), concrete values (`Literal`), and the binary interchange codec
//! that moves both across process and language boundaries.
//!
//! ## Philosophy
//!
//! - **Pure Data**: nothing here knows about host types or transformers.
//! - **Strict Codec**: the encoder refuses malformed structure, the decoder is a
//!   bounds-checked view that never allocates for scalars.
//! - **Stable Tags**: tag bytes and variant names are a compatibility surface.

pub mod codec;
pub mod types;
pub mod wire;

#[cfg(test)]
mod tests;

pub use codec::Decoder;
pub use codec::Encoder;
pub use codec::Error;
pub use codec::Result;
pub use codec::Tag;

pub use types::Blob;
pub use types::BlobType;
pub use types::DEFAULT_TAG_FIELD;
pub use types::Dimensionality;
pub use types::Field;
pub use types::Literal;
pub use types::Primitive;
pub use types::PrimitiveKind;
pub use types::RecordType;
pub use types::Scalar;
pub use types::UnionType;
pub use types::UnionValue;
pub use types::WireType;

pub use wire::decode_literal;
pub use wire::decode_wire_type;
pub use wire::encode_literal;
pub use wire::encode_wire_type;
