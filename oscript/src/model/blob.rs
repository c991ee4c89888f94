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

use std::io;
use std::io::Write;

use base64::write::EncoderWriter;

/// A byte blob. On the wire a blob is a single quoted, standard alphabet,
/// padded base64 string; this is the type that carries that representation
/// (a plain `Vec<u8>` encodes as a sequence of integers instead).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob {
    data: Vec<u8>,
}

impl Blob {
    pub fn new() -> Blob {
        Blob { data: Vec::new() }
    }

    pub fn from_vec(data: Vec<u8>) -> Blob {
        Blob { data }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stream the base64 encoding of the blob into `writer`. The final
    /// partial chunk is written when the encoder drops.
    pub fn encode<W: Write>(&self, mut writer: W) -> io::Result<()> {
        EncoderWriter::new(&mut writer, base64::STANDARD).write_all(&self.data)
    }

    /// Decode a base64 string into a blob.
    pub fn decode<T: AsRef<[u8]>>(encoded: T) -> Result<Blob, base64::DecodeError> {
        base64::decode_config(encoded.as_ref(), base64::STANDARD).map(Blob::from_vec)
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blob({} bytes)", self.data.len())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Blob {
        Blob::from_vec(data)
    }
}

impl From<&[u8]> for Blob {
    fn from(data: &[u8]) -> Blob {
        Blob::from_vec(data.to_vec())
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
