//! # Host Values
//!
//! The dynamic values transformers consume and produce. Streams and opaque
//! payloads compare by identity; everything else compares structurally.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use litpack::Blob;
use parking_lot::Mutex;

use crate::error::Result;
use crate::host::TypeKey;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Datetime(DateTime<Utc>),
    Duration(TimeDelta),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(RecordValue),
    Blob(Blob),
    Stream(ValueStream),
    Opaque(Opaque),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn stream<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::Stream(ValueStream::new(items))
    }

    /// Short shape name for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::None => "none".into(),
            Self::Int(_) => "int".into(),
            Self::Float(_) => "float".into(),
            Self::Str(_) => "str".into(),
            Self::Bool(_) => "bool".into(),
            Self::Datetime(_) => "datetime".into(),
            Self::Duration(_) => "timedelta".into(),
            Self::Bytes(_) => "bytes".into(),
            Self::List(_) => "list".into(),
            Self::Map(_) => "dict".into(),
            Self::Record(r) => match &r.type_name {
                Some(name) => format!("record {}", name),
                None => "record".into(),
            },
            Self::Blob(b) => format!("blob {:?}", b.format),
            Self::Stream(_) => "stream".into(),
            Self::Opaque(o) => format!("opaque {}", o.key()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Field values of a record instance.
///
/// `type_name` names the concrete record type when known; it lets a value of
/// a declared subtype pass where the parent is expected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordValue {
    pub type_name: Option<TypeKey>,
    pub fields: BTreeMap<String, Value>,
}

impl RecordValue {
    pub fn new(type_name: impl Into<TypeKey>) -> Self {
        Self { type_name: Some(type_name.into()), fields: BTreeMap::new() }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl From<RecordValue> for Value {
    fn from(r: RecordValue) -> Self {
        Self::Record(r)
    }
}

// ============================================================================
//  STREAMS
// ============================================================================

type BoxedIter = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// A take-once source of values.
///
/// Clones share the same underlying iterator: whoever pulls an item first
/// consumes it. A fallible source ends at its first error.
#[derive(Clone)]
pub struct ValueStream {
    inner: Arc<Mutex<Pull>>,
}

struct Pull {
    iter: BoxedIter,
    done: bool,
}

impl ValueStream {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::fallible(items.into_iter().map(Ok))
    }

    /// Wraps a source whose items may fail to materialize, such as lines
    /// read lazily from storage.
    pub fn fallible<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Result<Value>>,
        I::IntoIter: Send + 'static,
    {
        let pull = Pull { iter: Box::new(items.into_iter()), done: false };
        Self { inner: Arc::new(Mutex::new(pull)) }
    }

    /// Pulls the next item, surfacing the source's failure.
    pub fn try_next(&self) -> Result<Option<Value>> {
        let mut pull = self.inner.lock();
        if pull.done {
            return Ok(None);
        }
        match pull.iter.next() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => {
                pull.done = true;
                Err(e)
            }
            None => {
                pull.done = true;
                Ok(None)
            }
        }
    }

    /// Like [`ValueStream::try_next`], treating a failure as the end.
    pub fn next_value(&self) -> Option<Value> {
        self.try_next().ok().flatten()
    }

    /// Pulls every remaining item.
    pub fn try_drain(&self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(value) = self.try_next()? {
            out.push(value);
        }
        Ok(out)
    }

    /// Pulls every remaining item, stopping quietly at a failure.
    pub fn drain(&self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(value) = self.next_value() {
            out.push(value);
        }
        out
    }
}

impl PartialEq for ValueStream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueStream({:p})", Arc::as_ptr(&self.inner))
    }
}

// ============================================================================
//  OPAQUE
// ============================================================================

/// A plugin-owned Rust value travelling through the engine untouched.
#[derive(Clone)]
pub struct Opaque {
    key: TypeKey,
    data: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(key: impl Into<TypeKey>, value: T) -> Self {
        Self { key: key.into(), data: Arc::new(value) }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.data), Arc::as_ptr(&other.data))
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.key)
    }
}
