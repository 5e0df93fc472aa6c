//! # Error Definitions
//!
//! The central ledger of conversion failures. Value-shape errors carry the
//! `FieldPath` of the offending element so callers can point at it.

use std::fmt;

use crate::storage::StorageError;

/// One step from a value to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Location of a value inside the root value being converted, rendered `$.a[2]["k"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path one segment deeper.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
                PathSegment::Key(key) => write!(f, "[{:?}]", key)?,
            }
        }
        Ok(())
    }
}

/// Conversion failures. None of these are retried by the engine.
#[derive(Debug, Clone)]
pub enum Error {
    /// No transformer can represent the host type or wire type.
    UnsupportedType(String),
    /// The value's runtime shape does not fit the declared host type.
    TypeMismatch { path: FieldPath, expected: String, found: String },
    /// A record value lacks a declared field.
    MissingField { path: FieldPath, field: String },
    /// A closed record value carries a field it does not declare.
    UnexpectedField { path: FieldPath, field: String },
    /// No union member accepted the value.
    NoMatchingUnionMember { path: FieldPath, union: String, found: String },
    /// The literal's shape does not fit the expected host type.
    Decode { path: FieldPath, expected: String, found: String },
    /// Reverse inference found no unique host type.
    AmbiguousType { wire: String, candidates: Vec<String> },
    /// A streaming source produced nothing.
    EmptyStream { path: FieldPath },
    /// The key belongs to a built-in that cannot be replaced.
    Protected(String),
    /// The value nests deeper than the configured limit.
    RecursionLimitExceeded { path: FieldPath },
    /// The caller cancelled a suspended conversion.
    Cancelled,
    /// A blocking bridge call was made from the bridge thread itself.
    BridgeReentry,
    /// The bridge thread is gone.
    BridgeClosed,
    /// The bridge thread could not be started.
    BridgeStart(String),
    /// The storage collaborator failed.
    Storage(StorageError),
    /// The interchange codec failed.
    Codec(litpack::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(ty) => write!(f, "unsupported type: {}", ty),
            Self::TypeMismatch { path, expected, found } => {
                write!(f, "type mismatch at {}: expected {}, found {}", path, expected, found)
            }
            Self::MissingField { path, field } => {
                write!(f, "missing field '{}' at {}", field, path)
            }
            Self::UnexpectedField { path, field } => {
                write!(f, "undeclared field '{}' at {}", field, path)
            }
            Self::NoMatchingUnionMember { path, union, found } => {
                write!(f, "no member of {} accepts {} at {}", union, found, path)
            }
            Self::Decode { path, expected, found } => {
                write!(f, "cannot decode {} literal as {} at {}", found, expected, path)
            }
            Self::AmbiguousType { wire, candidates } => {
                write!(f, "no canonical host type for {}; candidates: [{}]", wire, candidates.join(", "))
            }
            Self::EmptyStream { path } => write!(f, "empty stream at {}", path),
            Self::Protected(key) => write!(f, "transformer for '{}' is built in and cannot be replaced", key),
            Self::RecursionLimitExceeded { path } => write!(f, "nesting limit exceeded at {}", path),
            Self::Cancelled => write!(f, "conversion cancelled"),
            Self::BridgeReentry => write!(f, "blocking bridge call from the bridge thread"),
            Self::BridgeClosed => write!(f, "bridge thread is closed"),
            Self::BridgeStart(msg) => write!(f, "failed to start bridge: {}", msg),
            Self::Storage(e) => write!(f, "storage error: {}", e),
            Self::Codec(e) => write!(f, "codec error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<litpack::Error> for Error {
    fn from(e: litpack::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
