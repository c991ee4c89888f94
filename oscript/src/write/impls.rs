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
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;

use base64::write::EncoderWriter;
use std::io::Write;

use super::{write_f32, write_f64, write_timestamp, EncodeState, Marshal};
use crate::error::EncodeError;
use crate::form::TextKey;
use crate::model::{Blob, ErrorCode, Slot, Timestamp, Value};

impl Marshal for bool {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.push_str(if *self { "true" } else { "false" });
        Ok(())
    }

    fn is_empty(&self) -> bool {
        !*self
    }
}

macro_rules! marshal_int {
    ($($ty:ty),*) => {
        $(
            impl Marshal for $ty {
                fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
                    out.push_str(&self.to_string());
                    Ok(())
                }

                fn is_empty(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

marshal_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Marshal for f64 {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        write_f64(out, *self)
    }

    fn is_empty(&self) -> bool {
        *self == 0.0
    }
}

impl Marshal for f32 {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        write_f32(out, *self)
    }

    fn is_empty(&self) -> bool {
        *self == 0.0
    }
}

impl Marshal for str {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.write_string_value(self);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        str::is_empty(self)
    }
}

impl Marshal for String {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.write_string_value(self);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }
}

impl Marshal for Timestamp {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        write_timestamp(out, self);
        Ok(())
    }
}

impl Marshal for ErrorCode {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.push_byte(b'E');
        out.push_str(&self.0.to_string());
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Blobs become single quoted base64. Small blobs encode through a scratch
/// string; larger ones stream straight into the output buffer.
impl Marshal for Blob {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.push_byte(b'\'');
        let data = self.as_slice();
        if data.len() < 1024 {
            let mut encoded = String::new();
            base64::encode_config_buf(data, base64::STANDARD, &mut encoded);
            out.push_str(&encoded);
        } else {
            // The encoder writes its final partial chunk when dropped.
            EncoderWriter::new(out.buffer_mut(), base64::STANDARD).write_all(data)?;
        }
        out.push_byte(b'\'');
        Ok(())
    }

    fn is_empty(&self) -> bool {
        Blob::is_empty(self)
    }
}

impl<T: Marshal> Marshal for Option<T> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        match self {
            Some(value) => value.write_oscript(out),
            None => {
                out.push_byte(b'?');
                Ok(())
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

impl<T: Marshal> Marshal for [T] {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        out.push_byte(b'{');
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                out.push_byte(b',');
            }
            item.write_oscript(out)?;
        }
        out.push_byte(b'}');
        Ok(())
    }

    fn is_empty(&self) -> bool {
        <[T]>::is_empty(self)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        self.as_slice().write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        self.as_slice().write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        N == 0
    }
}

fn write_map_entries<'a, V: Marshal + 'a>(
    out: &mut EncodeState,
    mut entries: Vec<(String, &'a V)>,
) -> Result<(), EncodeError> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    out.push_str("A<1,?");
    for (key, value) in entries {
        out.push_byte(b',');
        out.write_string_value(&key);
        out.push_byte(b'=');
        value.write_oscript(out)?;
    }
    out.push_byte(b'>');
    Ok(())
}

fn coerce_keys<'a, K: TextKey, V>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<Vec<(String, &'a V)>, EncodeError>
where
    K: 'a,
    V: 'a,
{
    entries
        .map(|(key, value)| {
            let key = key
                .write_key()
                .map_err(|cause| EncodeError::marshaler(std::any::type_name::<K>(), cause))?;
            Ok((key, value))
        })
        .collect()
}

impl<K: TextKey, V: Marshal, S: BuildHasher> Marshal for HashMap<K, V, S> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        write_map_entries(out, coerce_keys(self.iter())?)
    }

    fn is_empty(&self) -> bool {
        HashMap::is_empty(self)
    }
}

impl<K: TextKey, V: Marshal> Marshal for BTreeMap<K, V> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        write_map_entries(out, coerce_keys(self.iter())?)
    }

    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

impl Marshal for Value {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        match self {
            Value::Undefined => {
                out.push_byte(b'?');
                Ok(())
            }
            Value::BooleanValue(p) => p.write_oscript(out),
            Value::Int64Value(n) => n.write_oscript(out),
            Value::UInt64Value(n) => n.write_oscript(out),
            Value::Float64Value(x) => write_f64(out, *x),
            Value::Text(s) => {
                out.write_string_value(s);
                Ok(())
            }
            Value::Data(blob) => blob.write_oscript(out),
            Value::DateValue(ts) => {
                write_timestamp(out, ts);
                Ok(())
            }
            Value::ErrorValue(code) => code.write_oscript(out),
            Value::Sequence(items) => items.as_slice().write_oscript(out),
            Value::Object(items) => {
                out.push_str("A<1,?");
                for Slot { key, value } in items {
                    out.push_byte(b',');
                    out.write_string_value(key);
                    out.push_byte(b'=');
                    value.write_oscript(out)?;
                }
                out.push_byte(b'>');
                Ok(())
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.is_undefined()
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        (**self).write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        (**self).write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}

impl<T: Marshal + ?Sized> Marshal for Arc<T> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        (**self).write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}

impl<T: Marshal + ?Sized> Marshal for Rc<T> {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError> {
        (**self).write_oscript(out)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}
