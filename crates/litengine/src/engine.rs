//! # Type Engine
//!
//! The front door: one handle owning a registry, a storage collaborator and
//! a bridge. Cheap to clone; every clone sees the same registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::OnceLock;

use litpack::Literal;
use litpack::WireType;
use tracing::debug;
use tracing::error;

use crate::bridge::Bridge;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::FieldPath;
use crate::error::PathSegment;
use crate::error::Result;
use crate::host::HostType;
use crate::host::RecordSchema;
use crate::host::TypeKey;
use crate::native::Native;
use crate::registry::Registry;
use crate::storage::MemoryStorage;
use crate::storage::Storage;
use crate::transformer::AsyncTransformer;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Suspendable;
use crate::transformer::Transformer;
use crate::value::Value;

static GLOBAL: OnceLock<TypeEngine> = OnceLock::new();

struct Inner {
    config: EngineConfig,
    registry: Registry,
    storage: Arc<dyn Storage>,
    bridge: OnceLock<Arc<Bridge>>,
}

#[derive(Clone)]
pub struct TypeEngine {
    inner: Arc<Inner>,
}

impl TypeEngine {
    /// The process-wide engine, built from the environment on first use.
    pub fn global() -> &'static TypeEngine {
        GLOBAL.get_or_init(|| {
            debug!("initializing global type engine");
            TypeEngine::builder().config(EngineConfig::from_env()).build()
        })
    }

    /// Makes `engine` the process-wide engine. Fails, handing it back, once
    /// `global` has been used.
    pub fn install_global(engine: TypeEngine) -> std::result::Result<(), TypeEngine> {
        GLOBAL.set(engine)
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// An isolated engine with defaults and in-memory storage.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// The bridge suspendable transformers run on.
    pub fn bridge(&self) -> Result<Arc<Bridge>> {
        if let Some(bridge) = self.inner.bridge.get() {
            return Ok(bridge.clone());
        }
        let bridge = Bridge::global()?;
        Ok(self.inner.bridge.get_or_init(|| bridge).clone())
    }

    /// A fresh conversion context rooted at `$`.
    pub fn context(&self) -> Context {
        Context::new(self.clone())
    }

    // ========================================================================
    //  REGISTRATION
    // ========================================================================

    pub fn register<T: Transformer>(&self, transformer: T) -> Result<Option<Arc<dyn Transformer>>> {
        self.registry().register(Arc::new(transformer))
    }

    pub fn register_async<T: AsyncTransformer>(&self, transformer: T) -> Result<Option<Arc<dyn Transformer>>> {
        self.registry().register(Arc::new(Suspendable::new(transformer)))
    }

    pub fn register_as<T: Transformer>(&self, key: HostKey, transformer: T) -> Result<Option<Arc<dyn Transformer>>> {
        self.registry().register_as(key, Arc::new(transformer))
    }

    pub fn unregister(&self, key: &HostKey) -> Result<Option<Arc<dyn Transformer>>> {
        self.registry().unregister(key)
    }

    pub fn declare_parents(&self, child: impl Into<TypeKey>, parents: impl IntoIterator<Item = TypeKey>) {
        self.registry().declare_parents(child, parents)
    }

    pub fn declare_record(&self, schema: RecordSchema) -> HostType {
        let schema = self.registry().declare_record(schema);
        HostType::Named(schema.name.clone())
    }

    pub fn resolve(&self, ty: &HostType) -> Result<Arc<dyn Transformer>> {
        self.registry().resolve(ty)
    }

    // ========================================================================
    //  CONVERSION
    // ========================================================================

    pub(crate) fn describe_in(&self, cx: &Context, ty: &HostType) -> Result<WireType> {
        let registry = self.registry();
        if let Some(wire) = registry.cached_wire(ty) {
            return Ok(wire);
        }
        let generation = registry.generation();
        let wire = registry.resolve(ty)?.describe(cx, ty)?;
        registry.store_wire(ty, &wire, generation);
        Ok(wire)
    }

    pub fn to_wire_type(&self, ty: &HostType) -> Result<WireType> {
        self.context().describe(ty)
    }

    pub fn to_literal(&self, value: &Value, ty: &HostType) -> Result<Literal> {
        self.to_literal_in(&self.context(), value, ty)
    }

    /// `to_literal` under a caller-supplied context, e.g. one carrying a
    /// cancellation token.
    pub fn to_literal_in(&self, cx: &Context, value: &Value, ty: &HostType) -> Result<Literal> {
        let expected = cx.describe(ty)?;
        let literal = cx.encode(value, ty, &expected)?;
        if self.config().verify_literals && !literal.conforms_to(&expected) {
            return Err(Error::TypeMismatch {
                path: cx.path().clone(),
                expected: expected.to_string(),
                found: format!("{} literal", literal.kind()),
            });
        }
        Ok(literal)
    }

    pub fn to_value(&self, literal: &Literal, ty: &HostType) -> Result<Value> {
        self.to_value_in(&self.context(), literal, ty)
    }

    pub fn to_value_in(&self, cx: &Context, literal: &Literal, ty: &HostType) -> Result<Value> {
        cx.decode(literal, ty)
    }

    pub fn guess_host_type(&self, wire: &WireType) -> Result<HostType> {
        self.context().infer(wire)
    }

    /// Wire types of named inputs or outputs.
    pub fn literal_types_for(&self, types: &BTreeMap<String, HostType>) -> Result<BTreeMap<String, WireType>> {
        let cx = self.context();
        types
            .iter()
            .map(|(name, ty)| {
                let child = cx.enter(PathSegment::Field(name.clone()))?;
                child.describe(ty).map(|wire| (name.clone(), wire))
            })
            .collect()
    }

    /// Encodes named values. Every declared name must be present and no
    /// undeclared name may appear.
    pub fn to_literal_map(
        &self,
        values: &BTreeMap<String, Value>,
        types: &BTreeMap<String, HostType>,
    ) -> Result<BTreeMap<String, Literal>> {
        let cx = self.context();
        if let Some(extra) = values.keys().find(|k| !types.contains_key(*k)) {
            return Err(Error::UnexpectedField { path: FieldPath::root(), field: extra.clone() });
        }
        let mut out = BTreeMap::new();
        for (name, ty) in types {
            let value = values
                .get(name)
                .ok_or_else(|| Error::MissingField { path: FieldPath::root(), field: name.clone() })?;
            let child = cx.enter(PathSegment::Field(name.clone()))?;
            out.insert(name.clone(), self.to_literal_in(&child, value, ty)?);
        }
        Ok(out)
    }

    /// Decodes named literals; every declared name must be present.
    pub fn to_value_map(
        &self,
        literals: &BTreeMap<String, Literal>,
        types: &BTreeMap<String, HostType>,
    ) -> Result<BTreeMap<String, Value>> {
        let cx = self.context();
        let mut out = BTreeMap::new();
        for (name, ty) in types {
            let child = cx.enter(PathSegment::Field(name.clone()))?;
            let literal = literals.get(name).ok_or_else(|| Error::Decode {
                path: child.path().clone(),
                expected: ty.to_string(),
                found: "nothing".into(),
            })?;
            out.insert(name.clone(), child.decode(literal, ty)?);
        }
        Ok(out)
    }

    pub fn to_literal_native<T: Native>(&self, value: T) -> Result<Literal> {
        self.to_literal(&value.into_value(), &T::host_type())
    }

    pub fn to_native<T: Native>(&self, literal: &Literal) -> Result<T> {
        T::from_value(self.to_value(literal, &T::host_type())?)
    }
}

impl Default for TypeEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  BUILDER
// ============================================================================

/// Fluent construction of an isolated engine.
pub struct EngineBuilder {
    config: EngineConfig,
    storage: Option<Arc<dyn Storage>>,
    bridge: Option<Arc<Bridge>>,
    defaults: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { config: EngineConfig::default(), storage: None, bridge: None, defaults: true }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn verify_literals(mut self, verify: bool) -> Self {
        self.config.verify_literals = verify;
        self
    }

    pub fn storage<S: Storage>(mut self, storage: S) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    pub fn shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn bridge(mut self, bridge: Arc<Bridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Runs suspendable work on a bridge of this engine's own, named by the config.
    pub fn dedicated_bridge(mut self) -> Result<Self> {
        self.bridge = Some(Arc::new(Bridge::new(self.config.bridge_thread_name.clone())?));
        Ok(self)
    }

    /// Leaves out the built-in and generic transformers.
    pub fn without_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn build(self) -> TypeEngine {
        let registry = if self.defaults { Self::default_registry() } else { Registry::new() };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new(self.config.output_prefix.clone())));
        let bridge = OnceLock::new();
        if let Some(b) = self.bridge {
            let _ = bridge.set(b);
        }
        TypeEngine { inner: Arc::new(Inner { config: self.config, registry, storage, bridge }) }
    }

    fn default_registry() -> Registry {
        let registry = Registry::new();
        if let Err(e) = registry.install_defaults() {
            error!(error = %e, "failed to install default transformers");
        }
        registry
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
