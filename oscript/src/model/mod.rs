// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod blob;
mod time;

#[cfg(test)]
mod tests;

pub use blob::Blob;
pub use time::Timestamp;

use std::fmt::{Display, Formatter};

/// The structural model of an Oscript document. Every well formed document
/// parses to exactly one [`Value`] and every [`Value`] prints as a well
/// formed document. This is also the dynamic destination type: decoding into
/// a `Value` accepts any document.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// The undefined value, `?` on the wire.
    #[default]
    Undefined,

    /// A boolean wrapped as a [`Value`].
    BooleanValue(bool),

    /// A 64-bit signed integer wrapped as a [`Value`]. Integer literals,
    /// with or without the `L` prefix, always parse to this variant.
    Int64Value(i64),

    /// A 64-bit unsigned integer wrapped as a [`Value`]. Never produced by
    /// the parser; exists so that the full unsigned range can be encoded.
    UInt64Value(u64),

    /// A 64-bit floating point number, `G`-prefixed on the wire.
    Float64Value(f64),

    /// A textual value, single quoted on the wire.
    Text(String),

    /// A Binary Large OBject, carried as a base64 string on the wire.
    Data(Blob),

    /// A UTC timestamp with second precision, `D/YYYY/M/D:H:M:S` on the wire.
    DateValue(Timestamp),

    /// A status code, `E` followed by decimal digits on the wire.
    ErrorValue(ErrorCode),

    /// An ordered sequence of values, `{...}` on the wire. An empty sequence
    /// is `{}`, never undefined.
    Sequence(Vec<Value>),

    /// An association of string keys to values, `A<1,?,...>` on the wire.
    /// Wire order is preserved.
    Object(Vec<Slot>),
}

impl Value {
    /// Create a text value from anything that can be turned into a string.
    pub fn text<T: Into<String>>(value: T) -> Value {
        Value::Text(value.into())
    }

    /// Create an object value from key/value pairs, preserving their order.
    pub fn object<K, I>(items: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(
            items
                .into_iter()
                .map(|(key, value)| Slot::new(key, value))
                .collect(),
        )
    }

    /// Create a sequence value.
    pub fn sequence<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Sequence(items.into_iter().collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The kind of this value, for diagnostics.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::BooleanValue(_) => ValueKind::Boolean,
            Value::Int64Value(_) | Value::UInt64Value(_) => ValueKind::Int,
            Value::Float64Value(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Data(_) => ValueKind::Data,
            Value::DateValue(_) => ValueKind::Date,
            Value::ErrorValue(_) => ValueKind::Error,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// A single member of an object: a key paired with a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    pub key: String,
    pub value: Value,
}

impl Slot {
    pub fn new<K: Into<String>>(key: K, value: Value) -> Slot {
        Slot {
            key: key.into(),
            value,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for Slot {
    fn from(pair: (K, V)) -> Slot {
        let (key, value) = pair;
        Slot::new(key, value.into())
    }
}

/// The kinds of [`Value`], used in type mismatch diagnostics.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ValueKind {
    Undefined,
    Boolean,
    Int,
    Float,
    Text,
    Data,
    Date,
    Error,
    Sequence,
    Object,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Undefined => write!(f, "Undefined"),
            ValueKind::Boolean => write!(f, "Boolean"),
            ValueKind::Int => write!(f, "Int"),
            ValueKind::Float => write!(f, "Float"),
            ValueKind::Text => write!(f, "Text"),
            ValueKind::Data => write!(f, "Data"),
            ValueKind::Date => write!(f, "Date"),
            ValueKind::Error => write!(f, "Error"),
            ValueKind::Sequence => write!(f, "Sequence"),
            ValueKind::Object => write!(f, "Object"),
        }
    }
}

/// A remote status code. The wire form is `E` followed by the decimal code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub i64);

impl ErrorCode {
    pub fn code(&self) -> i64 {
        self.0
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ErrorCode {}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> ErrorCode {
        ErrorCode(code)
    }
}

/// Marker type for the SDO tag of a record. Declaring a field of this type
/// with an `#[oscript(tag = "namespace.Name")]` attribute makes the record a
/// Service Data Object: the pseudo-field `_SDOName` is emitted at the field's
/// position and incoming documents must carry a matching name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SdoName;

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::BooleanValue(value)
    }
}

macro_rules! int_to_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Value {
                    Value::Int64Value(value as i64)
                }
            }
        )*
    };
}

int_to_value!(i8, i16, i32, i64, isize, u8, u16, u32);

impl From<u64> for Value {
    fn from(value: u64) -> Value {
        if let Ok(signed) = i64::try_from(value) {
            Value::Int64Value(signed)
        } else {
            Value::UInt64Value(value)
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Float64Value(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Value {
        Value::Float64Value(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Text(value.to_string())
    }
}

impl From<Blob> for Value {
    fn from(value: Blob) -> Value {
        Value::Data(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Value {
        Value::DateValue(value)
    }
}

impl From<ErrorCode> for Value {
    fn from(value: ErrorCode) -> Value {
        Value::ErrorValue(value)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(values: Vec<V>) -> Value {
        Value::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Value {
        match value {
            Some(value) => value.into(),
            None => Value::Undefined,
        }
    }
}
