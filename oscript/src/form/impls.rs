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

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use super::{mismatch, mismatch_desc, DecodeContext, ErrorLatch, TextKey, Unmarshal};
use crate::error::DecodeError;
use crate::model::{Blob, ErrorCode, Slot, Timestamp, Value};

impl Unmarshal for bool {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<bool, DecodeError> {
        match value {
            Value::Undefined => Ok(false),
            Value::BooleanValue(p) => Ok(*p),
            other => Err(mismatch::<bool>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = bool::try_from_value(value, cx)?;
        Ok(())
    }
}

macro_rules! unmarshal_int {
    ($($ty:ty),*) => {
        $(
            impl Unmarshal for $ty {
                fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<$ty, DecodeError> {
                    match value {
                        Value::Undefined => Ok(0),
                        Value::Int64Value(n) => <$ty>::try_from(*n)
                            .map_err(|_| mismatch_desc::<$ty>(format!("int {}", n))),
                        Value::UInt64Value(n) => <$ty>::try_from(*n)
                            .map_err(|_| mismatch_desc::<$ty>(format!("int {}", n))),
                        other => Err(mismatch::<$ty>(other)),
                    }
                }

                fn merge_value(
                    &mut self,
                    value: &Value,
                    cx: &DecodeContext,
                ) -> Result<(), DecodeError> {
                    if value.is_undefined() {
                        return Ok(());
                    }
                    *self = <$ty>::try_from_value(value, cx)?;
                    Ok(())
                }
            }
        )*
    };
}

unmarshal_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Unmarshal for f64 {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<f64, DecodeError> {
        match value {
            Value::Undefined => Ok(0.0),
            Value::Float64Value(x) => Ok(*x),
            other => Err(mismatch::<f64>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = f64::try_from_value(value, cx)?;
        Ok(())
    }
}

impl Unmarshal for f32 {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<f32, DecodeError> {
        match value {
            Value::Undefined => Ok(0.0),
            Value::Float64Value(x) => {
                let narrowed = *x as f32;
                if x.is_finite() && narrowed.is_infinite() {
                    Err(mismatch_desc::<f32>(format!("float {}", x)))
                } else {
                    Ok(narrowed)
                }
            }
            other => Err(mismatch::<f32>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = f32::try_from_value(value, cx)?;
        Ok(())
    }
}

impl Unmarshal for String {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<String, DecodeError> {
        match value {
            Value::Undefined => Ok(String::new()),
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch::<String>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = String::try_from_value(value, cx)?;
        Ok(())
    }
}

/// A blob decodes from the wire's base64 string form (and from itself, for
/// values that never left memory).
impl Unmarshal for Blob {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<Blob, DecodeError> {
        match value {
            Value::Undefined => Ok(Blob::new()),
            Value::Text(s) => Blob::decode(s.as_bytes()).map_err(DecodeError::from),
            Value::Data(blob) => Ok(blob.clone()),
            other => Err(mismatch::<Blob>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = Blob::try_from_value(value, cx)?;
        Ok(())
    }
}

impl Unmarshal for Timestamp {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<Timestamp, DecodeError> {
        match value {
            Value::Undefined => Ok(Timestamp::default()),
            Value::DateValue(ts) => Ok(*ts),
            other => Err(mismatch::<Timestamp>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = Timestamp::try_from_value(value, cx)?;
        Ok(())
    }
}

/// An error code decodes from `E...` only; an undefined value is accepted
/// as a no-op so that absent statuses leave the prior code in place.
impl Unmarshal for ErrorCode {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<ErrorCode, DecodeError> {
        match value {
            Value::Undefined => Ok(ErrorCode::default()),
            Value::ErrorValue(code) => Ok(*code),
            other => Err(mismatch::<ErrorCode>(other)),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            return Ok(());
        }
        *self = ErrorCode::try_from_value(value, cx)?;
        Ok(())
    }
}

impl Unmarshal for Value {
    fn try_from_value(value: &Value, _cx: &DecodeContext) -> Result<Value, DecodeError> {
        Ok(value.clone())
    }
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Option<T>, DecodeError> {
        match value {
            Value::Undefined => Ok(None),
            other => T::try_from_value(other, cx).map(Some),
        }
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        if value.is_undefined() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.merge_value(value, cx),
            None => {
                *self = Some(T::try_from_value(value, cx)?);
                Ok(())
            }
        }
    }
}

impl<T: Unmarshal + Default> Unmarshal for Vec<T> {
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Vec<T>, DecodeError> {
        let mut out = Vec::new();
        out.merge_value(value, cx)?;
        Ok(out)
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        match value {
            Value::Undefined => {
                self.clear();
                Ok(())
            }
            Value::Sequence(items) => {
                let mut latch = ErrorLatch::default();
                for (i, item) in items.iter().enumerate() {
                    if i == self.len() {
                        self.push(T::default());
                    }
                    if let Err(err) = self[i].merge_value(item, cx) {
                        latch.note(err)?;
                    }
                }
                self.truncate(items.len());
                latch.finish()
            }
            other => Err(mismatch::<Vec<T>>(other)),
        }
    }
}

/// Fixed capacity sinks truncate longer wire arrays and reset the elements
/// a shorter one does not reach.
impl<T: Unmarshal + Default, const N: usize> Unmarshal for [T; N] {
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<[T; N], DecodeError> {
        let mut out: [T; N] = std::array::from_fn(|_| T::default());
        out.merge_value(value, cx)?;
        Ok(out)
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        match value {
            Value::Undefined => Ok(()),
            Value::Sequence(items) => {
                let mut latch = ErrorLatch::default();
                for (i, slot) in self.iter_mut().enumerate() {
                    if let Some(item) = items.get(i) {
                        if let Err(err) = slot.merge_value(item, cx) {
                            latch.note(err)?;
                        }
                    } else {
                        *slot = T::default();
                    }
                }
                latch.finish()
            }
            other => Err(mismatch::<[T; N]>(other)),
        }
    }
}

fn merge_map_entries<'a, K, V, F>(
    items: &'a [Slot],
    cx: &DecodeContext,
    mut insert: F,
) -> Result<(), DecodeError>
where
    K: TextKey,
    V: Unmarshal,
    F: FnMut(K, V),
{
    let mut latch = ErrorLatch::default();
    for Slot { key, value } in items {
        let key = match K::parse_key(key) {
            Ok(key) => key,
            Err(err) => {
                // A bad key abandons the rest of the association.
                latch.note(err)?;
                break;
            }
        };
        match V::try_from_value(value, cx) {
            Ok(value) => insert(key, value),
            Err(err) => latch.note(err)?,
        }
    }
    latch.finish()
}

impl<K, V, S> Unmarshal for HashMap<K, V, S>
where
    K: TextKey + Eq + Hash,
    V: Unmarshal,
    S: BuildHasher + Default,
{
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Self, DecodeError> {
        let mut out = HashMap::default();
        out.merge_value(value, cx)?;
        Ok(out)
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        match value {
            Value::Undefined => {
                self.clear();
                Ok(())
            }
            Value::Object(items) => {
                merge_map_entries(items, cx, |key, value| {
                    self.insert(key, value);
                })
            }
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl<K, V> Unmarshal for BTreeMap<K, V>
where
    K: TextKey + Ord,
    V: Unmarshal,
{
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Self, DecodeError> {
        let mut out = BTreeMap::new();
        out.merge_value(value, cx)?;
        Ok(out)
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        match value {
            Value::Undefined => {
                self.clear();
                Ok(())
            }
            Value::Object(items) => {
                merge_map_entries(items, cx, |key, value| {
                    self.insert(key, value);
                })
            }
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl<T: Unmarshal> Unmarshal for Box<T> {
    fn try_from_value(value: &Value, cx: &DecodeContext) -> Result<Box<T>, DecodeError> {
        T::try_from_value(value, cx).map(Box::new)
    }

    fn merge_value(&mut self, value: &Value, cx: &DecodeContext) -> Result<(), DecodeError> {
        (**self).merge_value(value, cx)
    }
}
