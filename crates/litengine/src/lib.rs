//! # Litengine
//!
//! Converts host values and host type annotations to and from the platform's
//! wire literals, and guesses host types back from wire types when the
//! annotation that produced them is gone.
//!
//! ## Philosophy
//!
//! - **Open Registry**: every supported type, built-in or not, is a
//!   registered transformer. Plugins add types without touching the engine.
//! - **Explicit Types**: host types are values (`HostType`), so the same
//!   annotation always describes to the same wire type.
//! - **Sync Front, Async Inside**: callers convert synchronously; transformers
//!   that do I/O run on a dedicated bridge thread.
//!
//! ## Layout
//!
//! - `host`, `value`: the host side of the conversion.
//! - `transformer`: the capability and the per-call `Context`.
//! - `builtins`, `generics`: the default transformers.
//! - `registry`: resolution and reverse inference.
//! - `bridge`, `storage`: where suspendable work runs and writes.
//! - `engine`: the facade tying them together.

pub mod bridge;
pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod generics;
pub mod host;
pub mod native;
pub mod registry;
pub mod storage;
pub mod transformer;
pub mod untyped;
pub mod value;

#[cfg(test)]
mod tests;

pub use bridge::Bridge;
pub use config::EngineConfig;
pub use engine::EngineBuilder;
pub use engine::TypeEngine;
pub use error::Error;
pub use error::FieldPath;
pub use error::PathSegment;
pub use error::Result;
pub use host::FieldSpec;
pub use host::GenericOrigin;
pub use host::HostType;
pub use host::RecordSchema;
pub use host::TypeKey;
pub use host::keys;
pub use native::Native;
pub use registry::FormatConflict;
pub use registry::Registration;
pub use registry::Registry;
pub use storage::LocalStorage;
pub use storage::MemoryStorage;
pub use storage::Reader;
pub use storage::Storage;
pub use storage::StorageError;
pub use transformer::AsyncTransformer;
pub use transformer::Context;
pub use transformer::HostKey;
pub use transformer::Suspendable;
pub use transformer::Transformer;
pub use value::Opaque;
pub use value::RecordValue;
pub use value::Value;
pub use value::ValueStream;

pub use litpack;
