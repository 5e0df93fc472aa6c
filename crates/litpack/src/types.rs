//! # Literal Model
//!
//! The wire vocabulary exchanged between task executions, independent of any
//! host language.
//!
//! ## Invariants
//! - **Structural Equality**: two `WireType`s are equal iff their shapes are equal,
//!   record field order included.
//! - **No Host References**: a `Literal` never embeds blob payloads, only a URI.
//! - **Paired Shapes**: a `Literal` produced for a `WireType` satisfies
//!   [`Literal::conforms_to`] against it, recursively.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Discriminator field name used by engine-produced unions.
pub const DEFAULT_TAG_FIELD: &str = "tag";

// ============================================================================
//  TYPE DESCRIPTORS
// ============================================================================

/// The scalar families understood by every binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    None,
    Integer,
    Float,
    String,
    Boolean,
    Datetime,
    Duration,
    Binary,
}

impl PrimitiveKind {
    /// Stable wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Duration => "duration",
            Self::Binary => "binary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "datetime" => Some(Self::Datetime),
            "duration" => Some(Self::Duration),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Whether a blob is one object or a prefix holding many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimensionality {
    Single,
    Multipart,
}

impl Dimensionality {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multipart => "multipart",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "single" => Some(Self::Single),
            "multipart" => Some(Self::Multipart),
            _ => None,
        }
    }
}

/// Type of an externally stored payload.
///
/// An empty `format` means "any format".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobType {
    pub format: String,
    pub dimensionality: Dimensionality,
}

impl BlobType {
    pub fn new(format: impl Into<String>, dimensionality: Dimensionality) -> Self {
        Self { format: format.into(), dimensionality }
    }

    pub fn single(format: impl Into<String>) -> Self {
        Self::new(format, Dimensionality::Single)
    }

    pub fn multipart(format: impl Into<String>) -> Self {
        Self::new(format, Dimensionality::Multipart)
    }
}

/// A named, typed record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: WireType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: WireType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Ordered, named fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecordType {
    pub fields: Vec<Field>,
}

impl RecordType {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Looks up a declared field type by name.
    pub fn field(&self, name: &str) -> Option<&WireType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

/// An ordered set of member types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnionType {
    pub members: Vec<WireType>,
    pub tag_field: String,
}

impl UnionType {
    /// Builds a union, dropping structurally repeated members (first one wins).
    pub fn new(members: impl IntoIterator<Item = WireType>) -> Self {
        let mut unique: Vec<WireType> = Vec::new();
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        Self { members: unique, tag_field: DEFAULT_TAG_FIELD.to_string() }
    }

    pub fn with_tag_field(mut self, tag_field: impl Into<String>) -> Self {
        self.tag_field = tag_field.into();
        self
    }

    pub fn contains(&self, ty: &WireType) -> bool {
        self.members.contains(ty)
    }

    /// Returns the single non-none member when this union is `T | none`.
    pub fn optional_inner(&self) -> Option<&WireType> {
        let none = WireType::Primitive(PrimitiveKind::None);
        if self.members.len() != 2 || !self.contains(&none) {
            return None;
        }
        self.members.iter().find(|m| **m != none)
    }
}

/// Platform-level type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Primitive(PrimitiveKind),
    Collection(Box<WireType>),
    Mapping(Box<WireType>),
    Union(UnionType),
    Blob(BlobType),
    Record(RecordType),
}

impl WireType {
    pub fn collection(element: WireType) -> Self {
        Self::Collection(Box::new(element))
    }

    pub fn mapping(value: WireType) -> Self {
        Self::Mapping(Box::new(value))
    }

    /// `T | none`, the wire shape of an optional.
    pub fn optional(inner: WireType) -> Self {
        Self::Union(UnionType::new([inner, Self::Primitive(PrimitiveKind::None)]))
    }

    /// Stable variant tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Collection(_) => "collection",
            Self::Mapping(_) => "mapping",
            Self::Union(_) => "union",
            Self::Blob(_) => "blob",
            Self::Record(_) => "record",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(k) => write!(f, "{}", k.as_str()),
            Self::Collection(el) => write!(f, "collection<{}>", el),
            Self::Mapping(v) => write!(f, "mapping<{}>", v),
            Self::Union(u) => {
                write!(f, "union<")?;
                for (i, m) in u.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ">")
            }
            Self::Blob(b) => write!(f, "blob<{:?}, {}>", b.format, b.dimensionality.as_str()),
            Self::Record(r) => {
                write!(f, "record{{")?;
                for (i, field) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ============================================================================
//  VALUES
// ============================================================================

/// A primitive wire value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Datetime(DateTime<Utc>),
    Duration(#[serde(with = "delta_serde")] TimeDelta),
    Binary(Vec<u8>),
}

impl Primitive {
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Integer(_) => PrimitiveKind::Integer,
            Self::Float(_) => PrimitiveKind::Float,
            Self::String(_) => PrimitiveKind::String,
            Self::Boolean(_) => PrimitiveKind::Boolean,
            Self::Datetime(_) => PrimitiveKind::Datetime,
            Self::Duration(_) => PrimitiveKind::Duration,
            Self::Binary(_) => PrimitiveKind::Binary,
        }
    }
}

/// Reference to an externally stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blob {
    pub uri: String,
    pub format: String,
    pub dimensionality: Dimensionality,
}

impl Blob {
    pub fn new(uri: impl Into<String>, ty: BlobType) -> Self {
        Self { uri: uri.into(), format: ty.format, dimensionality: ty.dimensionality }
    }

    pub fn blob_type(&self) -> BlobType {
        BlobType::new(self.format.clone(), self.dimensionality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    None,
    Primitive(Primitive),
    Blob(Blob),
}

/// The member selected at encode time, with its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionValue {
    pub ty: WireType,
    pub value: Literal,
}

/// A concrete wire value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Scalar(Scalar),
    Collection(Vec<Literal>),
    Mapping(BTreeMap<String, Literal>),
    Union(Box<UnionValue>),
    Record(BTreeMap<String, Literal>),
}

impl Literal {
    pub fn none() -> Self {
        Self::Scalar(Scalar::None)
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::Scalar(Scalar::Primitive(p))
    }

    pub fn integer(v: i64) -> Self {
        Self::primitive(Primitive::Integer(v))
    }

    pub fn float(v: f64) -> Self {
        Self::primitive(Primitive::Float(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::primitive(Primitive::String(v.into()))
    }

    pub fn boolean(v: bool) -> Self {
        Self::primitive(Primitive::Boolean(v))
    }

    pub fn blob(blob: Blob) -> Self {
        Self::Scalar(Scalar::Blob(blob))
    }

    pub fn union(ty: WireType, value: Literal) -> Self {
        Self::Union(Box::new(UnionValue { ty, value }))
    }

    /// Short shape name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(Scalar::None) => "none",
            Self::Scalar(Scalar::Primitive(p)) => p.kind().as_str(),
            Self::Scalar(Scalar::Blob(_)) => "blob",
            Self::Collection(_) => "collection",
            Self::Mapping(_) => "mapping",
            Self::Union(_) => "union",
            Self::Record(_) => "record",
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Self::Scalar(Scalar::Primitive(p)) => Some(p),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Scalar(Scalar::Blob(b)) => Some(b),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::None))
    }

    /// Checks that this literal's variant tags line up with `ty`, recursively.
    ///
    /// An untagged literal conforms to a union when it conforms to one of the
    /// members, which is how optionals travel.
    pub fn conforms_to(&self, ty: &WireType) -> bool {
        match (self, ty) {
            (Self::Union(uv), WireType::Union(u)) => {
                u.contains(&uv.ty) && uv.value.conforms_to(&uv.ty)
            }
            (other, WireType::Union(u)) => u.members.iter().any(|m| other.conforms_to(m)),
            (Self::Scalar(Scalar::None), WireType::Primitive(PrimitiveKind::None)) => true,
            (Self::Scalar(Scalar::Primitive(p)), WireType::Primitive(k)) => p.kind() == *k,
            (Self::Scalar(Scalar::Blob(b)), WireType::Blob(bt)) => {
                b.dimensionality == bt.dimensionality
                    && (bt.format.is_empty() || b.format == bt.format)
            }
            (Self::Collection(items), WireType::Collection(el)) => {
                items.iter().all(|item| item.conforms_to(el))
            }
            (Self::Mapping(entries), WireType::Mapping(v)) => {
                entries.values().all(|item| item.conforms_to(v))
            }
            (Self::Record(fields), WireType::Record(rt)) => rt.fields.iter().all(|f| {
                fields.get(&f.name).is_some_and(|lit| lit.conforms_to(&f.ty))
            }),
            _ => false,
        }
    }
}

/// `TimeDelta` has no serde support of its own; it travels as `(seconds, nanos)`.
mod delta_serde {
    use chrono::TimeDelta;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serialize;
    use serde::Serializer;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        (d.num_seconds(), d.subsec_nanos()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
        let (secs, nanos): (i64, i32) = Deserialize::deserialize(d)?;
        super::delta_from_parts(secs, nanos as i64)
            .ok_or_else(|| D::Error::custom("duration out of range"))
    }
}

/// Rebuilds a `TimeDelta` from whole seconds plus a same-signed nanosecond part.
pub(crate) fn delta_from_parts(secs: i64, nanos: i64) -> Option<TimeDelta> {
    TimeDelta::try_seconds(secs)?.checked_add(&TimeDelta::nanoseconds(nanos))
}
