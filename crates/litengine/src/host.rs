//! # Host Types
//!
//! Rust has no runtime type annotations to reflect on, so the engine takes
//! them as explicit values: nominal keys, generic shapes over other host
//! types, and record schemas.

use std::fmt;
use std::sync::Arc;

/// Names of the built-in nominal types.
pub mod keys {
    pub const NONE: &str = "none";
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STR: &str = "str";
    pub const BOOL: &str = "bool";
    pub const DATETIME: &str = "datetime";
    pub const TIMEDELTA: &str = "timedelta";
    pub const BYTES: &str = "bytes";
    pub const FILE: &str = "file";
    pub const DIRECTORY: &str = "directory";
    /// Name given to records rebuilt from a wire type alone.
    pub const ANONYMOUS_RECORD: &str = "record";
}

/// Interned nominal type name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:?})", &*self.0)
    }
}

/// The generic shapes dispatched on at resolution step 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenericOrigin {
    Sequence,
    Mapping,
    Optional,
    Union,
    Record,
}

impl GenericOrigin {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Optional => "optional",
            Self::Union => "union",
            Self::Record => "record",
        }
    }
}

impl fmt::Display for GenericOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared, typed record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub name: String,
    pub ty: HostType,
}

/// Ordered field declarations of a record type.
///
/// Open records accept fields beyond the declared ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSchema {
    pub name: TypeKey,
    pub fields: Vec<FieldSpec>,
    pub open: bool,
}

impl RecordSchema {
    pub fn new(name: impl Into<TypeKey>) -> Self {
        Self { name: name.into(), fields: Vec::new(), open: false }
    }

    pub fn field(mut self, name: impl Into<String>, ty: HostType) -> Self {
        self.fields.push(FieldSpec { name: name.into(), ty });
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&HostType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

/// A host type annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Named(TypeKey),
    Sequence(Box<HostType>),
    /// Mapping from string keys.
    Mapping(Box<HostType>),
    Optional(Box<HostType>),
    Union(Vec<HostType>),
    Record(Arc<RecordSchema>),
}

impl HostType {
    pub fn named(key: impl Into<TypeKey>) -> Self {
        Self::Named(key.into())
    }

    pub fn none() -> Self {
        Self::named(keys::NONE)
    }

    pub fn int() -> Self {
        Self::named(keys::INT)
    }

    pub fn float() -> Self {
        Self::named(keys::FLOAT)
    }

    pub fn str() -> Self {
        Self::named(keys::STR)
    }

    pub fn bool() -> Self {
        Self::named(keys::BOOL)
    }

    pub fn datetime() -> Self {
        Self::named(keys::DATETIME)
    }

    pub fn timedelta() -> Self {
        Self::named(keys::TIMEDELTA)
    }

    pub fn bytes() -> Self {
        Self::named(keys::BYTES)
    }

    pub fn file() -> Self {
        Self::named(keys::FILE)
    }

    pub fn directory() -> Self {
        Self::named(keys::DIRECTORY)
    }

    pub fn sequence(element: HostType) -> Self {
        Self::Sequence(Box::new(element))
    }

    pub fn mapping(value: HostType) -> Self {
        Self::Mapping(Box::new(value))
    }

    pub fn optional(inner: HostType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn union(members: impl IntoIterator<Item = HostType>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    pub fn record(schema: RecordSchema) -> Self {
        Self::Record(Arc::new(schema))
    }

    /// The generic origin of a parameterized type; `None` for nominal types.
    pub fn origin(&self) -> Option<GenericOrigin> {
        match self {
            Self::Named(_) => None,
            Self::Sequence(_) => Some(GenericOrigin::Sequence),
            Self::Mapping(_) => Some(GenericOrigin::Mapping),
            Self::Optional(_) => Some(GenericOrigin::Optional),
            Self::Union(_) => Some(GenericOrigin::Union),
            Self::Record(_) => Some(GenericOrigin::Record),
        }
    }

    pub fn key(&self) -> Option<&TypeKey> {
        match self {
            Self::Named(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::Named(key) if key.as_str() == keys::NONE)
    }
}

impl From<TypeKey> for HostType {
    fn from(key: TypeKey) -> Self {
        Self::Named(key)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(key) => write!(f, "{}", key),
            Self::Sequence(el) => write!(f, "list[{}]", el),
            Self::Mapping(v) => write!(f, "dict[str, {}]", v),
            Self::Optional(inner) => write!(f, "Optional[{}]", inner),
            Self::Union(members) => {
                write!(f, "Union[")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, "]")
            }
            Self::Record(schema) => write!(f, "{}", schema.name),
        }
    }
}
