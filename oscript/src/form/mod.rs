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

//! Reconstruction of typed values from parsed [`Value`]s.
//!
//! [`Unmarshal`] has two entry points with one deliberate asymmetry between
//! them. `try_from_value` builds a fresh value; `merge_value` updates an
//! existing one, and for primitive destinations an undefined wire value is a
//! no-op that keeps the prior contents. Composite destinations (options,
//! sequences, maps, the dynamic [`Value`]) are cleared by undefined instead.

mod impls;
mod resolver;

#[cfg(test)]
mod tests;

pub use resolver::{
    merge_record, resolved_fields, write_record, FieldDecl, FieldSpec, RecordForm, RecordSchema,
};

use crate::error::{DecodeError, EncodeError};
use crate::model::Value;

/// Options of a decode run.
#[derive(Clone, Debug, Default)]
pub struct DecodeContext {
    pub(crate) strict: bool,
}

impl DecodeContext {
    pub fn new() -> DecodeContext {
        DecodeContext::default()
    }

    /// Reject wire keys that have no counterpart in the destination record.
    pub fn strict() -> DecodeContext {
        DecodeContext { strict: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Types that can be reconstructed from a parsed [`Value`].
pub trait Unmarshal: Sized {
    /// Build a fresh value. Absent content materialises as the type's
    /// natural empty state.
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Self, DecodeError>;

    /// Update `self` in place. The default replaces `self` wholesale;
    /// primitive impls override it so that an undefined wire value keeps the
    /// prior contents.
    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        *self = Self::try_from_value(value, cx)?;
        Ok(())
    }
}

/// Types that unmarshal themselves from raw Oscript bytes. The bytes handed
/// to the hook are the compacted canonical rendering of the sub-document
/// (string values keep their surrounding quotes). By convention hooks treat
/// the single byte `?` as a no-op. Wire a type up with
/// [`impl_unmarshal_via_bytes!`](crate::impl_unmarshal_via_bytes).
pub trait UnmarshalBytes {
    fn unmarshal_oscript(&mut self, data: &[u8]) -> Result<(), DecodeError>;
}

/// Adapt an [`UnmarshalBytes`](crate::UnmarshalBytes) implementation into
/// [`Unmarshal`](crate::Unmarshal).
#[macro_export]
macro_rules! impl_unmarshal_via_bytes {
    ($ty:ty) => {
        impl $crate::Unmarshal for $ty {
            fn try_from_value(
                value: &$crate::Value,
                cx: &$crate::DecodeContext,
            ) -> Result<Self, $crate::DecodeError> {
                let mut out = <$ty as core::default::Default>::default();
                $crate::Unmarshal::merge_value(&mut out, value, cx)?;
                Ok(out)
            }

            fn merge_value(
                &mut self,
                value: &$crate::Value,
                _cx: &$crate::DecodeContext,
            ) -> Result<(), $crate::DecodeError> {
                let bytes = $crate::to_vec(value).map_err(|err| {
                    $crate::DecodeError::Message(format!(
                        "cannot render value for unmarshal hook: {}",
                        err
                    ))
                })?;
                $crate::UnmarshalBytes::unmarshal_oscript(self, &bytes)
            }
        }
    };
}

/// Coercion between map keys and their textual wire form. Keys of an
/// association must be strings, integers or a type implementing this trait.
pub trait TextKey: Sized {
    fn write_key(&self) -> Result<String, EncodeError>;

    fn parse_key(key: &str) -> Result<Self, DecodeError>;
}

impl TextKey for String {
    fn write_key(&self) -> Result<String, EncodeError> {
        Ok(self.clone())
    }

    fn parse_key(key: &str) -> Result<String, DecodeError> {
        Ok(key.to_string())
    }
}

macro_rules! text_key_int {
    ($($ty:ty),*) => {
        $(
            impl TextKey for $ty {
                fn write_key(&self) -> Result<String, EncodeError> {
                    Ok(self.to_string())
                }

                fn parse_key(key: &str) -> Result<$ty, DecodeError> {
                    key.parse::<$ty>().map_err(|_| DecodeError::Mismatch {
                        value: format!("number {}", key),
                        target: std::any::type_name::<$ty>(),
                        record: None,
                        field: None,
                    })
                }
            }
        )*
    };
}

text_key_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Describe a wire value for a type mismatch message.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::BooleanValue(_) => "bool".to_string(),
        Value::Int64Value(_) | Value::UInt64Value(_) => "int".to_string(),
        Value::Float64Value(_) => "float".to_string(),
        Value::Text(_) => "string".to_string(),
        Value::Data(_) => "data".to_string(),
        Value::DateValue(_) => "time".to_string(),
        Value::ErrorValue(_) => "error".to_string(),
        Value::Sequence(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

pub(crate) fn mismatch<T>(value: &Value) -> DecodeError {
    DecodeError::Mismatch {
        value: describe(value),
        target: std::any::type_name::<T>(),
        record: None,
        field: None,
    }
}

pub(crate) fn mismatch_desc<T>(desc: String) -> DecodeError {
    DecodeError::Mismatch {
        value: desc,
        target: std::any::type_name::<T>(),
        record: None,
        field: None,
    }
}

/// First-error-wins slot used while decoding composites. Latchable errors
/// are retained and decoding continues; anything else aborts through the
/// error return of [`ErrorLatch::note`].
#[derive(Default)]
pub(crate) struct ErrorLatch {
    first: Option<DecodeError>,
}

impl ErrorLatch {
    pub(crate) fn note(&mut self, err: DecodeError) -> Result<(), DecodeError> {
        if err.is_latchable() {
            if self.first.is_none() {
                self.first = Some(err);
            }
            Ok(())
        } else {
            Err(err)
        }
    }

    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
