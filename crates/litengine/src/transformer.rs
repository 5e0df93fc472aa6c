//! # Transformers
//!
//! The capability every host-type converter implements. A transformer owns
//! one slice of the host type space (one key) and answers five questions
//! about it: what wire type it has, whether a value fits, how to encode, how
//! to decode, and which host type a wire type came from.
//!
//! ## Invariants
//!
//! - `describe` is pure: the same host type always yields the same wire type.
//! - `encode` validates as it goes and never produces a literal for a value
//!   that does not fit `ty`.
//! - `decode(encode(v))` equals `v` for every supported `v`.

use std::fmt;
use std::sync::Arc;

use litpack::BlobType;
use litpack::Literal;
use litpack::WireType;
use tokio_util::sync::CancellationToken;

use crate::engine::TypeEngine;
use crate::error::Error;
use crate::error::FieldPath;
use crate::error::PathSegment;
use crate::error::Result;
use crate::host::GenericOrigin;
use crate::host::HostType;
use crate::host::TypeKey;
use crate::storage::Storage;
use crate::value::Value;

/// The slice of host types a transformer is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostKey {
    /// One nominal type.
    Exact(TypeKey),
    /// Every parameterization of a generic shape.
    Origin(GenericOrigin),
    /// Anything nothing else claims.
    Wildcard,
}

impl HostKey {
    pub fn exact(key: impl Into<TypeKey>) -> Self {
        Self::Exact(key.into())
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "{}", key),
            Self::Origin(origin) => write!(f, "<{}>", origin),
            Self::Wildcard => write!(f, "*"),
        }
    }
}

pub trait Transformer: Send + Sync + 'static {
    /// Human-readable name for logs and diagnostics.
    fn name(&self) -> &str;

    fn key(&self) -> HostKey;

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType>;

    /// Checks that `value` fits `ty` without producing anything.
    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()>;

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal>;

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value>;

    fn infer_host_type(&self, _cx: &Context, wire: &WireType) -> Result<HostType> {
        Err(Error::UnsupportedType(wire.to_string()))
    }

    /// Blob formats this transformer claims for reverse inference.
    fn blob_formats(&self) -> Vec<BlobType> {
        Vec::new()
    }

    /// Built-ins answer `false` and cannot be replaced.
    fn overridable(&self) -> bool {
        true
    }
}

/// A transformer whose encode and decode may suspend on I/O.
///
/// Register it with `TypeEngine::register_async`; synchronous callers reach it
/// through the bridge.
#[async_trait::async_trait]
pub trait AsyncTransformer: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn key(&self) -> HostKey;

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType>;

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()>;

    async fn encode(&self, cx: &Context, value: Value, ty: &HostType, expected: &WireType) -> Result<Literal>;

    async fn decode(&self, cx: &Context, literal: Literal, ty: &HostType) -> Result<Value>;

    fn infer_host_type(&self, _cx: &Context, wire: &WireType) -> Result<HostType> {
        Err(Error::UnsupportedType(wire.to_string()))
    }

    fn blob_formats(&self) -> Vec<BlobType> {
        Vec::new()
    }
}

/// Presents an `AsyncTransformer` as a `Transformer` by running its
/// suspendable halves on the bridge.
pub struct Suspendable<T> {
    inner: Arc<T>,
}

impl<T: AsyncTransformer> Suspendable<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncTransformer> Transformer for Suspendable<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn key(&self) -> HostKey {
        self.inner.key()
    }

    fn describe(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        self.inner.describe(cx, ty)
    }

    fn check_value(&self, cx: &Context, ty: &HostType, value: &Value) -> Result<()> {
        self.inner.check_value(cx, ty, value)
    }

    fn encode(&self, cx: &Context, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        let inner = self.inner.clone();
        let task_cx = cx.clone();
        let value = value.clone();
        let ty = ty.clone();
        let expected = expected.clone();
        cx.engine().bridge()?.run_sync(
            async move { inner.encode(&task_cx, value, &ty, &expected).await },
            cx.cancel_token(),
        )
    }

    fn decode(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        let inner = self.inner.clone();
        let task_cx = cx.clone();
        let literal = literal.clone();
        let ty = ty.clone();
        cx.engine().bridge()?.run_sync(
            async move { inner.decode(&task_cx, literal, &ty).await },
            cx.cancel_token(),
        )
    }

    fn infer_host_type(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        self.inner.infer_host_type(cx, wire)
    }

    fn blob_formats(&self) -> Vec<BlobType> {
        self.inner.blob_formats()
    }
}

// ============================================================================
//  CONTEXT
// ============================================================================

/// Per-conversion state handed to every transformer call.
///
/// Generic transformers descend with `enter`, which extends the value path
/// and enforces the nesting limit.
#[derive(Clone)]
pub struct Context {
    engine: TypeEngine,
    cancel: CancellationToken,
    path: FieldPath,
    depth: usize,
}

impl Context {
    pub(crate) fn new(engine: TypeEngine) -> Self {
        Self {
            engine,
            cancel: CancellationToken::new(),
            path: FieldPath::root(),
            depth: 0,
        }
    }

    /// Replaces the cancellation token observed by suspended work.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn engine(&self) -> &TypeEngine {
        &self.engine
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.engine.storage()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the context for a child value.
    pub fn enter(&self, segment: PathSegment) -> Result<Context> {
        let path = self.path.child(segment);
        if self.depth + 1 > self.engine.config().max_depth {
            return Err(Error::RecursionLimitExceeded { path });
        }
        Ok(Self {
            engine: self.engine.clone(),
            cancel: self.cancel.clone(),
            path,
            depth: self.depth + 1,
        })
    }

    // --- Dispatch through the engine ---

    pub fn describe(&self, ty: &HostType) -> Result<WireType> {
        self.engine.describe_in(self, ty)
    }

    pub fn check(&self, ty: &HostType, value: &Value) -> Result<()> {
        self.engine.resolve(ty)?.check_value(self, ty, value)
    }

    pub fn encode(&self, value: &Value, ty: &HostType, expected: &WireType) -> Result<Literal> {
        self.engine.resolve(ty)?.encode(self, value, ty, expected)
    }

    pub fn decode(&self, literal: &Literal, ty: &HostType) -> Result<Value> {
        self.engine.resolve(ty)?.decode(self, literal, ty)
    }

    pub fn infer(&self, wire: &WireType) -> Result<HostType> {
        self.engine.registry().infer(self, wire)
    }

    // --- Error helpers ---

    pub fn mismatch(&self, expected: impl fmt::Display, value: &Value) -> Error {
        Error::TypeMismatch {
            path: self.path.clone(),
            expected: expected.to_string(),
            found: value.describe(),
        }
    }

    pub fn decode_error(&self, expected: impl fmt::Display, literal: &Literal) -> Error {
        Error::Decode {
            path: self.path.clone(),
            expected: expected.to_string(),
            found: literal.kind().to_string(),
        }
    }
}
