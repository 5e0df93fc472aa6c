//! # Transformer Registry
//!
//! Maps host types to transformers and wire types back to host types.
//!
//! ## Resolution
//!
//! 1. Exact nominal key.
//! 2. Generic origin (named types with a declared record schema count as
//!    records).
//! 3. Declared ancestors, depth-first and left to right. An ancestor with a
//!    declared record schema makes the type a record of that schema.
//! 4. The wildcard slot.
//!
//! ## Invariants
//!
//! - A registration is published by one map insert; readers see the old
//!   transformer or the new one, never a partial entry.
//! - Built-ins (`overridable() == false`) cannot be replaced.
//! - Every mutation invalidates the wire type cache.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use litpack::BlobType;
use litpack::WireType;
use parking_lot::RwLock;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::builtins;
use crate::builtins::primitive_key;
use crate::error::Error;
use crate::error::Result;
use crate::generics;
use crate::host::GenericOrigin;
use crate::host::HostType;
use crate::host::RecordSchema;
use crate::host::TypeKey;
use crate::transformer::Context;
use crate::transformer::HostKey;
use crate::transformer::Transformer;

/// A published registry entry.
#[derive(Clone)]
pub struct Registration {
    pub key: HostKey,
    pub transformer: Arc<dyn Transformer>,
    pub is_default: bool,
}

struct FormatClaim {
    blob: BlobType,
    host: TypeKey,
    transformer: Arc<dyn Transformer>,
}

/// Two host types claimed the same blob format; `current` won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConflict {
    pub blob: BlobType,
    pub previous: TypeKey,
    pub current: TypeKey,
}

pub struct Registry {
    exact: DashMap<TypeKey, Registration>,
    origins: DashMap<GenericOrigin, Registration>,
    wildcard: RwLock<Option<Registration>>,
    parents: DashMap<TypeKey, Vec<TypeKey>>,
    records: DashMap<TypeKey, (u64, Arc<RecordSchema>)>,
    formats: RwLock<Vec<FormatClaim>>,
    conflicts: RwLock<Vec<FormatConflict>>,
    wire_cache: DashMap<HostType, (u64, WireType)>,
    generation: AtomicU64,
    record_seq: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry with no built-ins.
    pub fn new() -> Self {
        Self {
            exact: DashMap::new(),
            origins: DashMap::new(),
            wildcard: RwLock::new(None),
            parents: DashMap::new(),
            records: DashMap::new(),
            formats: RwLock::new(Vec::new()),
            conflicts: RwLock::new(Vec::new()),
            wire_cache: DashMap::new(),
            generation: AtomicU64::new(0),
            record_seq: AtomicU64::new(0),
        }
    }

    /// A registry holding the built-in and generic transformers.
    pub fn with_defaults() -> Result<Self> {
        let registry = Self::new();
        registry.install_defaults()?;
        Ok(registry)
    }

    pub(crate) fn install_defaults(&self) -> Result<()> {
        builtins::install(self)?;
        generics::install(self)
    }

    // ========================================================================
    //  MUTATION
    // ========================================================================

    /// Registers `transformer` under its own key, returning the one it replaced.
    pub fn register(&self, transformer: Arc<dyn Transformer>) -> Result<Option<Arc<dyn Transformer>>> {
        let key = transformer.key();
        self.insert(key, transformer, false)
    }

    /// Registers `transformer` under `key`, which may differ from its own.
    pub fn register_as(
        &self,
        key: HostKey,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Option<Arc<dyn Transformer>>> {
        self.insert(key, transformer, false)
    }

    pub(crate) fn register_default(&self, transformer: Arc<dyn Transformer>) -> Result<()> {
        let key = transformer.key();
        self.insert(key, transformer, true).map(|_| ())
    }

    fn insert(
        &self,
        key: HostKey,
        transformer: Arc<dyn Transformer>,
        is_default: bool,
    ) -> Result<Option<Arc<dyn Transformer>>> {
        let registration = Registration { key: key.clone(), transformer: transformer.clone(), is_default };

        let previous = match &key {
            HostKey::Exact(k) => match self.exact.entry(k.clone()) {
                Entry::Occupied(mut slot) => {
                    Self::ensure_replaceable(slot.get(), &key)?;
                    Some(slot.insert(registration))
                }
                Entry::Vacant(slot) => {
                    slot.insert(registration);
                    None
                }
            },
            HostKey::Origin(origin) => match self.origins.entry(*origin) {
                Entry::Occupied(mut slot) => {
                    Self::ensure_replaceable(slot.get(), &key)?;
                    Some(slot.insert(registration))
                }
                Entry::Vacant(slot) => {
                    slot.insert(registration);
                    None
                }
            },
            HostKey::Wildcard => {
                let mut slot = self.wildcard.write();
                if let Some(existing) = slot.as_ref() {
                    Self::ensure_replaceable(existing, &key)?;
                }
                slot.replace(registration)
            }
        };

        if let HostKey::Exact(host) = &key {
            self.claim_formats(host, &transformer);
        }
        self.invalidate();

        match &previous {
            Some(old) => info!(
                key = %key,
                old = old.transformer.name(),
                new = transformer.name(),
                "transformer replaced"
            ),
            None => debug!(key = %key, transformer = transformer.name(), is_default, "transformer registered"),
        }
        Ok(previous.map(|r| r.transformer))
    }

    fn ensure_replaceable(existing: &Registration, key: &HostKey) -> Result<()> {
        if existing.transformer.overridable() {
            Ok(())
        } else {
            warn!(key = %key, "refusing to replace built-in transformer");
            Err(Error::Protected(key.to_string()))
        }
    }

    /// Removes the transformer under `key` along with its format claims.
    /// Built-ins stay put.
    pub fn unregister(&self, key: &HostKey) -> Result<Option<Arc<dyn Transformer>>> {
        let removed = match key {
            HostKey::Exact(k) => {
                let removed = self.exact.remove_if(k, Self::removable).map(|(_, r)| r);
                if removed.is_some() {
                    self.formats.write().retain(|c| &c.host != k);
                }
                removed
            }
            HostKey::Origin(origin) => self.origins.remove_if(origin, Self::removable).map(|(_, r)| r),
            HostKey::Wildcard => {
                let mut slot = self.wildcard.write();
                match slot.as_ref() {
                    Some(existing) if !existing.transformer.overridable() => None,
                    _ => slot.take(),
                }
            }
        };

        if removed.is_none() {
            if let Some(existing) = self.get(key) {
                Self::ensure_replaceable(&existing, key)?;
            }
            return Ok(None);
        }
        self.invalidate();
        debug!(key = %key, "transformer unregistered");
        Ok(removed.map(|r| r.transformer))
    }

    fn removable<K>(_key: &K, registration: &Registration) -> bool {
        registration.transformer.overridable()
    }

    /// Declares the direct parents of `child`, in lookup order.
    pub fn declare_parents(&self, child: impl Into<TypeKey>, parents: impl IntoIterator<Item = TypeKey>) {
        let child = child.into();
        let parents: Vec<TypeKey> = parents.into_iter().collect();
        debug!(child = %child, parents = ?parents, "parents declared");
        self.parents.insert(child, parents);
        self.invalidate();
    }

    /// Declares a named record type, replacing any earlier schema of that name.
    pub fn declare_record(&self, schema: RecordSchema) -> Arc<RecordSchema> {
        let schema = Arc::new(schema);
        let seq = self.record_seq.fetch_add(1, Ordering::Relaxed);
        debug!(record = %schema.name, fields = schema.fields.len(), open = schema.open, "record declared");
        self.records.insert(schema.name.clone(), (seq, schema.clone()));
        self.invalidate();
        schema
    }

    fn claim_formats(&self, host: &TypeKey, transformer: &Arc<dyn Transformer>) {
        let blobs = transformer.blob_formats();
        let mut formats = self.formats.write();
        formats.retain(|c| &c.host != host);
        for blob in blobs {
            if let Some(existing) = formats.iter().rev().find(|c| c.blob == blob) {
                warn!(
                    format = %blob.format,
                    previous = %existing.host,
                    current = %host,
                    "blob format claimed twice; latest registration wins"
                );
                self.conflicts.write().push(FormatConflict {
                    blob: blob.clone(),
                    previous: existing.host.clone(),
                    current: host.clone(),
                });
            }
            formats.push(FormatClaim { blob, host: host.clone(), transformer: transformer.clone() });
        }
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.wire_cache.clear();
    }

    // ========================================================================
    //  LOOKUP
    // ========================================================================

    pub fn get(&self, key: &HostKey) -> Option<Registration> {
        match key {
            HostKey::Exact(k) => self.exact.get(k).map(|r| r.value().clone()),
            HostKey::Origin(origin) => self.origins.get(origin).map(|r| r.value().clone()),
            HostKey::Wildcard => self.wildcard.read().clone(),
        }
    }

    pub fn record_schema(&self, key: &TypeKey) -> Option<Arc<RecordSchema>> {
        self.records.get(key).map(|r| r.1.clone())
    }

    /// The schema declared for `key`, or else for its nearest ancestor that has one.
    pub fn nearest_record_schema(&self, key: &TypeKey) -> Option<Arc<RecordSchema>> {
        self.record_schema(key)
            .or_else(|| self.ancestors(key).iter().find_map(|a| self.record_schema(a)))
    }

    /// Declared record schemas, most recently declared first.
    pub fn records(&self) -> Vec<Arc<RecordSchema>> {
        let mut all: Vec<(u64, Arc<RecordSchema>)> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        all.into_iter().map(|(_, s)| s).collect()
    }

    /// Transitive ancestors of `key`: depth-first, left to right, first occurrence kept.
    pub fn ancestors(&self, key: &TypeKey) -> Vec<TypeKey> {
        let parents_of = |k: &TypeKey| self.parents.get(k).map(|p| p.value().clone()).unwrap_or_default();
        let mut order: Vec<TypeKey> = Vec::new();
        let mut stack: Vec<TypeKey> = parents_of(key).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if &next == key || order.contains(&next) {
                continue;
            }
            stack.extend(parents_of(&next).into_iter().rev());
            order.push(next);
        }
        order
    }

    pub fn is_subtype(&self, child: &TypeKey, ancestor: &TypeKey) -> bool {
        child == ancestor || self.ancestors(child).contains(ancestor)
    }

    pub fn format_conflicts(&self) -> Vec<FormatConflict> {
        self.conflicts.read().clone()
    }

    /// Picks the transformer for `ty`.
    pub fn resolve(&self, ty: &HostType) -> Result<Arc<dyn Transformer>> {
        if let HostType::Named(key) = ty {
            if let Some(r) = self.exact.get(key) {
                trace!(ty = %ty, transformer = r.transformer.name(), "resolved by exact key");
                return Ok(r.transformer.clone());
            }
        }

        let origin = match ty {
            HostType::Named(key) if self.records.contains_key(key) => Some(GenericOrigin::Record),
            other => other.origin(),
        };
        if let Some(origin) = origin {
            if let Some(r) = self.origins.get(&origin) {
                trace!(ty = %ty, transformer = r.transformer.name(), "resolved by origin");
                return Ok(r.transformer.clone());
            }
        }

        if let HostType::Named(key) = ty {
            for ancestor in self.ancestors(key) {
                if let Some(r) = self.exact.get(&ancestor) {
                    trace!(ty = %ty, ancestor = %ancestor, transformer = r.transformer.name(), "resolved by ancestor");
                    return Ok(r.transformer.clone());
                }
                if self.records.contains_key(&ancestor) {
                    if let Some(r) = self.origins.get(&GenericOrigin::Record) {
                        trace!(ty = %ty, ancestor = %ancestor, "resolved by ancestor record");
                        return Ok(r.transformer.clone());
                    }
                }
            }
        }

        if let Some(r) = self.wildcard.read().as_ref() {
            trace!(ty = %ty, transformer = r.transformer.name(), "resolved by wildcard");
            return Ok(r.transformer.clone());
        }

        Err(Error::UnsupportedType(ty.to_string()))
    }

    /// Guesses the host type a wire type was described from.
    pub fn infer(&self, cx: &Context, wire: &WireType) -> Result<HostType> {
        let origin = |o: GenericOrigin| self.origins.get(&o).map(|r| r.transformer.clone());
        let transformer = match wire {
            WireType::Primitive(kind) => {
                self.exact.get(&TypeKey::new(primitive_key(*kind))).map(|r| r.transformer.clone())
            }
            WireType::Collection(_) => origin(GenericOrigin::Sequence),
            WireType::Mapping(_) => origin(GenericOrigin::Mapping),
            WireType::Union(u) if u.optional_inner().is_some() => {
                origin(GenericOrigin::Optional).or_else(|| origin(GenericOrigin::Union))
            }
            WireType::Union(_) => origin(GenericOrigin::Union),
            WireType::Record(_) => origin(GenericOrigin::Record),
            WireType::Blob(blob) => Some(self.blob_claimant(blob)?),
        };
        let transformer = transformer.ok_or_else(|| Error::UnsupportedType(wire.to_string()))?;
        let host = transformer.infer_host_type(cx, wire)?;
        trace!(wire = %wire, host = %host, "inferred host type");
        Ok(host)
    }

    /// Exact format claim first, then the single open-format claim of the
    /// same dimensionality.
    fn blob_claimant(&self, blob: &BlobType) -> Result<Arc<dyn Transformer>> {
        let formats = self.formats.read();
        if let Some(claim) = formats.iter().rev().find(|c| c.blob == *blob) {
            return Ok(claim.transformer.clone());
        }

        let same_shape: Vec<&FormatClaim> = formats
            .iter()
            .filter(|c| c.blob.dimensionality == blob.dimensionality)
            .collect();
        let open: Vec<&&FormatClaim> = same_shape.iter().filter(|c| c.blob.format.is_empty()).collect();
        if let [only] = open.as_slice() {
            return Ok(only.transformer.clone());
        }

        let wire = WireType::Blob(blob.clone()).to_string();
        if same_shape.is_empty() {
            return Err(Error::UnsupportedType(wire));
        }
        let mut candidates: Vec<String> = Vec::new();
        for claim in same_shape {
            let name = claim.host.to_string();
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        Err(Error::AmbiguousType { wire, candidates })
    }

    // ========================================================================
    //  WIRE TYPE CACHE
    // ========================================================================

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn cached_wire(&self, ty: &HostType) -> Option<WireType> {
        let current = self.generation();
        self.wire_cache
            .get(ty)
            .filter(|entry| entry.0 == current)
            .map(|entry| entry.1.clone())
    }

    /// Caches `wire` if no mutation happened since `generation` was read.
    pub(crate) fn store_wire(&self, ty: &HostType, wire: &WireType, generation: u64) {
        if generation == self.generation() {
            self.wire_cache.insert(ty.clone(), (generation, wire.clone()));
        }
    }
}
