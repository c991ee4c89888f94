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

use std::sync::Arc;
use thiserror::Error;

/// A description of a malformed Oscript document, produced by the scanner.
///
/// The offset is the number of bytes that had been consumed when the first
/// invalid transition occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{msg}")]
pub struct SyntaxError {
    pub(crate) msg: String,
    pub offset: u64,
}

impl SyntaxError {
    pub(crate) fn new(msg: String, offset: u64) -> SyntaxError {
        SyntaxError { msg, offset }
    }

    /// The description of the error.
    pub fn message(&self) -> &str {
        &self.msg
    }
}

/// Errors produced when serializing a value as Oscript.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The value cannot be represented on the wire (NaN or an infinity).
    #[error("oscript: unsupported value: {0}")]
    UnsupportedValue(String),
    /// A custom marshal hook failed.
    #[error("oscript: error calling marshal hook for {type_name}: {source}")]
    Marshaler {
        type_name: &'static str,
        source: Box<EncodeError>,
    },
    /// A bytes-returning marshal hook produced output that does not scan.
    #[error("oscript: marshal hook for {type_name} produced invalid output: {source}")]
    InvalidMarshal {
        type_name: &'static str,
        source: SyntaxError,
    },
    /// Writing to the underlying sink failed.
    #[error("oscript: write failed: {0}")]
    Io(Arc<std::io::Error>),
}

impl EncodeError {
    pub(crate) fn marshaler(type_name: &'static str, cause: EncodeError) -> EncodeError {
        EncodeError::Marshaler {
            type_name,
            source: Box::new(cause),
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> EncodeError {
        EncodeError::Io(Arc::new(err))
    }
}

/// Errors produced when interpreting Oscript bytes.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The input is not well formed Oscript.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// A well formed value was rejected by the destination type. The first
    /// such mismatch in a decode call is retained while the remaining fields
    /// continue to decode.
    #[error("oscript: cannot unmarshal {value} into {}", mismatch_target(.record, .field, .target))]
    Mismatch {
        /// Description of the wire value, e.g. "bool" or "int -5".
        value: String,
        /// Name of the destination type.
        target: &'static str,
        /// Record type that was being populated, if any.
        record: Option<&'static str>,
        /// Field of the record that was being populated, if any.
        field: Option<String>,
    },
    /// Strict mode only: a wire key with no counterpart in the record.
    #[error("oscript: unknown field {0:?}")]
    UnknownField(String),
    /// The `_SDOName` member did not match the tag declared on the record.
    #[error("oscript: unknown SDO name {0:?}")]
    UnknownSdoName(String),
    /// A blob string was not valid base64.
    #[error("oscript: {0}")]
    Base64(#[from] base64::DecodeError),
    /// A date literal did not have the `D/YYYY/M/D:H:M:S` shape.
    #[error("oscript: cannot parse {0:?} as date")]
    MalformedDate(String),
    /// Internal inconsistencies and custom hook failures.
    #[error("oscript: {0}")]
    Message(String),
    /// The underlying byte source is exhausted.
    #[error("unexpected end of input")]
    Eof,
    /// Reading from the underlying source failed.
    #[error("oscript: read failed: {0}")]
    Io(Arc<std::io::Error>),
}

fn mismatch_target(
    record: &Option<&'static str>,
    field: &Option<String>,
    target: &&'static str,
) -> String {
    match (record, field) {
        (Some(record), Some(field)) => {
            format!("record field {}.{} of type {}", record, field, target)
        }
        _ => format!("value of type {}", target),
    }
}

impl DecodeError {
    /// Whether the decoder may retain this error and keep populating peer
    /// fields. Hook failures, SDO mismatches, syntax and I/O errors abort
    /// instead.
    pub(crate) fn is_latchable(&self) -> bool {
        matches!(
            self,
            DecodeError::Mismatch { .. }
                | DecodeError::UnknownField(_)
                | DecodeError::Base64(_)
                | DecodeError::MalformedDate(_)
        )
    }

    pub(crate) fn with_record_context(
        self,
        record_name: &'static str,
        field_name: &str,
    ) -> DecodeError {
        match self {
            DecodeError::Mismatch {
                value,
                target,
                record: None,
                field: None,
            } => DecodeError::Mismatch {
                value,
                target,
                record: Some(record_name),
                field: Some(field_name.to_string()),
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> DecodeError {
        DecodeError::Io(Arc::new(err))
    }
}
