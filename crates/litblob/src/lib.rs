//! # Litblob
//!
//! Transformers whose values live in storage rather than inside the literal.
//! The literal carries a blob reference; the payload is written through the
//! engine's `Storage` on encode and read back on decode.
//!
//! Everything here goes through the public registration surface of
//! `litengine`, the same way any third-party plugin would.
//!
//! ## Transformers
//!
//! - `jsonl_iterator`: a stream of JSON documents stored one per line
//!   (`Blob{"JSONL", single}`).

pub mod json;
pub mod jsonl;

#[cfg(test)]
mod tests;

use litengine::HostType;
use litengine::TypeEngine;

pub use jsonl::JSONL_FORMAT;
pub use jsonl::JSONL_ITERATOR;
pub use jsonl::JsonLinesTransformer;

/// Installs every transformer in this crate on `engine`.
pub fn register(engine: &TypeEngine) -> litengine::Result<()> {
    engine.register_async(JsonLinesTransformer::new())?;
    Ok(())
}

/// The host type of a JSON-lines stream.
pub fn jsonl_iterator() -> HostType {
    HostType::named(JSONL_ITERATOR)
}
