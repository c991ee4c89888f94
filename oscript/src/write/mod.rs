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

//! Serialization of values as Oscript bytes.
//!
//! Dispatch is by trait: the structural encodings live on the crate's
//! [`Marshal`] impls and a user type overrides them by implementing
//! [`Marshal`] itself (writing straight into the buffer) or [`MarshalBytes`]
//! (returning bytes that are validated and compacted into the output).

mod impls;


use std::cell::RefCell;

use crate::error::EncodeError;
use crate::model::Timestamp;

/// Types that can be written as Oscript.
///
/// `is_empty` is the predicate consulted by `omitempty` record fields: false,
/// numeric zero, the empty string, empty sequences, maps and blobs, and
/// `None` are empty.
pub trait Marshal {
    fn write_oscript(&self, out: &mut EncodeState) -> Result<(), EncodeError>;

    fn is_empty(&self) -> bool {
        false
    }
}

/// Types that marshal themselves by returning Oscript bytes. The framework
/// validates the bytes and copies them into the output with insignificant
/// whitespace elided. Wire a type up with
/// [`impl_marshal_via_bytes!`](crate::impl_marshal_via_bytes).
pub trait MarshalBytes {
    fn marshal_oscript(&self) -> Result<Vec<u8>, EncodeError>;
}

/// Adapt a [`MarshalBytes`](crate::MarshalBytes) implementation into
/// [`Marshal`](crate::Marshal). The produced bytes are validated and
/// compacted on every write.
#[macro_export]
macro_rules! impl_marshal_via_bytes {
    ($ty:ty) => {
        impl $crate::Marshal for $ty {
            fn write_oscript(&self, out: &mut $crate::EncodeState) -> Result<(), $crate::EncodeError> {
                let bytes = $crate::MarshalBytes::marshal_oscript(self)
                    .map_err(|cause| $crate::EncodeError::Marshaler {
                        type_name: core::any::type_name::<$ty>(),
                        source: Box::new(cause),
                    })?;
                out.write_marshaled(core::any::type_name::<$ty>(), &bytes)
            }
        }
    };
}

thread_local! {
    static BUFFER_POOL: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

fn take_buffer() -> Vec<u8> {
    BUFFER_POOL.with(|pool| pool.borrow_mut().pop().unwrap_or_default())
}

fn recycle_buffer(mut buf: Vec<u8>) {
    buf.clear();
    BUFFER_POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() < 4 {
            pool.push(buf);
        }
    });
}

/// The append-only output buffer of an encode. Custom marshallers receive it
/// through [`Marshal::write_oscript`] and compose output with the methods
/// below.
pub struct EncodeState {
    buf: Vec<u8>,
}

impl EncodeState {
    pub(crate) fn new() -> EncodeState {
        EncodeState { buf: take_buffer() }
    }

    /// Append a single byte.
    pub fn push_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    /// Append raw characters without quoting.
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append `s` as a quoted, escaped Oscript string value.
    pub fn write_string_value(&mut self, s: &str) {
        self.buf.push(b'\'');
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b >= 0x80 || is_safe_byte(b) {
                continue;
            }
            if start < i {
                self.buf.extend_from_slice(&bytes[start..i]);
            }
            self.buf.push(b'\\');
            match b {
                b'\\' | b'"' | b'\'' => self.buf.push(b),
                b'\n' => self.buf.push(b'n'),
                b'\r' => self.buf.push(b'r'),
                b'\t' => self.buf.push(b't'),
                _ => {
                    self.buf.extend_from_slice(b"u00");
                    self.buf.push(HEX[(b >> 4) as usize]);
                    self.buf.push(HEX[(b & 0xF) as usize]);
                }
            }
            start = i + 1;
        }
        if start < bytes.len() {
            self.buf.extend_from_slice(&bytes[start..]);
        }
        self.buf.push(b'\'');
    }

    /// Append the encoding of another value.
    pub fn write_value<T: Marshal + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        value.write_oscript(self)
    }

    /// Append pre-encoded bytes, validating and compacting them. On failure
    /// nothing is appended.
    pub fn write_marshaled(
        &mut self,
        type_name: &'static str,
        bytes: &[u8],
    ) -> Result<(), EncodeError> {
        crate::scanner::compact(&mut self.buf, bytes).map_err(|source| {
            EncodeError::InvalidMarshal { type_name, source }
        })
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    fn finish(self) -> Vec<u8> {
        let out = self.buf.clone();
        recycle_buffer(self.buf);
        out
    }

    fn abandon(self) {
        recycle_buffer(self.buf);
    }
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn is_safe_byte(b: u8) -> bool {
    b >= 0x20 && b != b'\\' && b != b'"' && b != b'\''
}

/// Serialize `value` as Oscript bytes.
pub fn to_vec<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut out = EncodeState::new();
    match value.write_oscript(&mut out) {
        Ok(()) => Ok(out.finish()),
        Err(err) => {
            out.abandon();
            Err(err)
        }
    }
}

/// Write a real number. The wire form is `G` followed by the shortest
/// decimal that round-trips, in scientific notation when the magnitude falls
/// outside `[1e-6, 1e21)`.
pub(crate) fn write_f64(out: &mut EncodeState, value: f64) -> Result<(), EncodeError> {
    if value.is_nan() || value.is_infinite() {
        return Err(EncodeError::UnsupportedValue(format!("{}", value)));
    }
    let abs = value.abs();
    out.push_byte(b'G');
    if abs != 0.0 && (abs < 1e-6 || abs >= 1e21) {
        push_scientific(out, format!("{:e}", value));
    } else {
        out.push_str(&format!("{}", value));
    }
    Ok(())
}

/// As [`write_f64`], with the cutoffs computed in `f32` so the narrower
/// precision picks the same notation the value had before widening.
pub(crate) fn write_f32(out: &mut EncodeState, value: f32) -> Result<(), EncodeError> {
    if value.is_nan() || value.is_infinite() {
        return Err(EncodeError::UnsupportedValue(format!("{}", value)));
    }
    let abs = value.abs();
    out.push_byte(b'G');
    if abs != 0.0 && (abs < 1e-6f32 || abs >= 1e21f32) {
        push_scientific(out, format!("{:e}", value));
    } else {
        out.push_str(&format!("{}", value));
    }
    Ok(())
}

/// Positive exponents carry an explicit sign on the wire: `G1e+21`, not
/// `G1e21`. Negative exponents are already in the right shape.
fn push_scientific(out: &mut EncodeState, mut repr: String) {
    if let Some(e) = repr.find('e') {
        if repr.as_bytes().get(e + 1) != Some(&b'-') {
            repr.insert(e + 1, '+');
        }
    }
    out.push_str(&repr);
}

/// Write a date literal: `D/YYYY/M/D:H:M:S`, components unpadded.
pub(crate) fn write_timestamp(out: &mut EncodeState, ts: &Timestamp) {
    let (year, month, day, hour, minute, second) = ts.parts();
    out.push_byte(b'D');
    out.push_byte(b'/');
    out.push_str(&year.to_string());
    out.push_byte(b'/');
    out.push_str(&month.to_string());
    out.push_byte(b'/');
    out.push_str(&day.to_string());
    out.push_byte(b':');
    out.push_str(&hour.to_string());
    out.push_byte(b':');
    out.push_str(&minute.to_string());
    out.push_byte(b':');
    out.push_str(&second.to_string());
}
