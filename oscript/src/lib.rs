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

//! Codec for the Oscript wire format spoken by document management servers.
//!
//! The crate has three layers. The [scanner](is_valid) is a byte-level state
//! machine that validates the grammar and strips insignificant whitespace.
//! On top of it sit the structural codecs: [`to_vec`] serializes anything
//! implementing [`Marshal`], [`unmarshal_into`] and [`from_slice`] rebuild
//! typed values through [`Unmarshal`], and [`Value`] is the dynamic
//! representation any document can round-trip through. The
//! [streaming driver](Decoder) reads and writes values incrementally over
//! byte streams and exposes a pull-based [token reader](Token).
//!
//! Records derive [`Form`] to participate, with field behaviour controlled
//! by `#[oscript(...)]` attributes:
//!
//! ```
//! use oscript::{Form, SdoName};
//!
//! #[derive(Form, Default, PartialEq, Debug)]
//! struct NodeRights {
//!     #[oscript(tag = "Core.NodeRights")]
//!     sdo: SdoName,
//!     #[oscript(tag = "UserID")]
//!     user_id: i64,
//!     #[oscript(tag = "Permissions,omitempty")]
//!     permissions: Option<Vec<String>>,
//! }
//!
//! let rights = NodeRights { user_id: 1000, ..Default::default() };
//! let bytes = oscript::to_vec(&rights).unwrap();
//! assert_eq!(
//!     std::str::from_utf8(&bytes).unwrap(),
//!     "A<1,?,'_SDOName'='Core.NodeRights','UserID'=1000>",
//! );
//!
//! let back: NodeRights = oscript::from_slice(&bytes).unwrap();
//! assert_eq!(back, rights);
//! ```
//!
//! One asymmetry is worth calling out: decoding the undefined value `?` into
//! an option, map, sequence or [`Value`] clears the destination, while
//! decoding it into a primitive destination leaves the prior contents in
//! place and reports no error. [`unmarshal_into`] is the entry point that
//! preserves prior contents; [`from_slice`] starts from the default value.
//!
//! Cyclic values are not supported and are not detected; encoding one
//! recurses until the stack runs out.

// Lets the derive macro expand to `oscript::...` paths inside this crate.
extern crate self as oscript;

mod error;
mod form;
mod model;
mod read;
mod scanner;
mod stream;
mod write;

pub use error::{DecodeError, EncodeError, SyntaxError};
pub use form::{
    merge_record, resolved_fields, write_record, DecodeContext, FieldDecl, FieldSpec, RecordForm,
    RecordSchema, TextKey, Unmarshal, UnmarshalBytes,
};
pub use model::{Blob, ErrorCode, SdoName, Slot, Timestamp, Value, ValueKind};
pub use scanner::{compact, is_valid};
pub use stream::{Decoder, Encoder, Token};
pub use write::{to_vec, EncodeState, Marshal, MarshalBytes};

/// Derive [`Marshal`] and [`Unmarshal`] for a named-field struct, routing
/// its fields through the record resolver.
///
/// Recognised attributes:
/// - `#[oscript(tag = "name,omitempty,public")]` renames the field and sets
///   options; a tag of exactly `-` drops the field, `-,` names it `-`.
/// - `#[oscript(flatten)]` promotes the fields of an embedded record (the
///   field type must derive `Form` too; `Option<R>` embeds it optionally).
/// - A field of type [`SdoName`] declares the record's SDO tag.
///
/// Fields whose name starts with `_` stay off the wire unless tagged
/// `public`.
pub use oscript_derive::Form;

/// Serialize `value` and return the bytes. Alias of [`to_vec`].
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    to_vec(value)
}

/// Parse `data` and merge the value into `dest`, allocating only where the
/// document demands it. Prior contents of primitive destinations survive an
/// undefined wire value.
pub fn unmarshal_into<T: Unmarshal>(data: &[u8], dest: &mut T) -> Result<(), DecodeError> {
    unmarshal_with(data, dest, &DecodeContext::default())
}

/// As [`unmarshal_into`], with explicit decode options.
pub fn unmarshal_with<T: Unmarshal>(
    data: &[u8],
    dest: &mut T,
    cx: &DecodeContext,
) -> Result<(), DecodeError> {
    // Check for well-formedness up front; this avoids filling half of a
    // destination before discovering a syntax error.
    scanner::check_valid(data, &mut scanner::Scanner::new())?;
    let value = read::parse_value(data)?;
    dest.merge_value(&value, cx)
}

/// Parse `data` into a fresh value of type `T`.
pub fn from_slice<T: Unmarshal + Default>(data: &[u8]) -> Result<T, DecodeError> {
    let mut out = T::default();
    unmarshal_into(data, &mut out)?;
    Ok(out)
}
