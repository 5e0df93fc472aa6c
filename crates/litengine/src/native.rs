//! Strongly typed front door: Rust types that know their own host type.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;

use crate::error::Error;
use crate::error::FieldPath;
use crate::error::Result;
use crate::host::HostType;
use crate::value::Value;

pub trait Native: Sized {
    fn host_type() -> HostType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T: Native>(found: &Value) -> Error {
    Error::TypeMismatch {
        path: FieldPath::root(),
        expected: T::host_type().to_string(),
        found: found.describe(),
    }
}

macro_rules! native_scalar {
    ($ty:ty, $host:ident, $variant:ident) => {
        impl Native for $ty {
            fn host_type() -> HostType {
                HostType::$host()
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }
    };
}

native_scalar!(i64, int, Int);
native_scalar!(bool, bool, Bool);
native_scalar!(String, str, Str);
native_scalar!(DateTime<Utc>, datetime, Datetime);
native_scalar!(TimeDelta, timedelta, Duration);

impl Native for f64 {
    fn host_type() -> HostType {
        HostType::float()
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Native for i32 {
    fn host_type() -> HostType {
        HostType::int()
    }

    fn into_value(self) -> Value {
        Value::Int(self.into())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(v) => i32::try_from(v).map_err(|_| Error::TypeMismatch {
                path: FieldPath::root(),
                expected: "i32".into(),
                found: format!("int {}", v),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Native for () {
    fn host_type() -> HostType {
        HostType::none()
    }

    fn into_value(self) -> Value {
        Value::None
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Native> Native for Vec<T> {
    fn host_type() -> HostType {
        HostType::sequence(T::host_type())
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Native::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Stream(stream) => stream.try_drain()?.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Native> Native for Option<T> {
    fn host_type() -> HostType {
        HostType::optional(T::host_type())
    }

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::None,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Native> Native for BTreeMap<String, T> {
    fn host_type() -> HostType {
        HostType::mapping(T::host_type())
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Native> Native for HashMap<String, T> {
    fn host_type() -> HostType {
        HostType::mapping(T::host_type())
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        BTreeMap::<String, T>::from_value(value).map(|m| m.into_iter().collect())
    }
}
