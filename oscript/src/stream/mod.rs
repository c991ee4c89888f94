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

//! Incremental encoding and decoding over byte streams, plus a pull-based
//! token reader. These are the only suspension points of the codec: the
//! reflective core never blocks, an [`Encoder`] or [`Decoder`] blocks only
//! on its underlying stream, and closing that stream surfaces as an I/O
//! error on the next call.

#[cfg(test)]
mod tests;

use std::io;
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{DecodeError, EncodeError, SyntaxError};
use crate::form::{DecodeContext, Unmarshal};
use crate::model::Value;
use crate::scanner::{is_space, ScanOp, Scanner};
use crate::write::{to_vec, Marshal};

/// Writes Oscript values to an output stream. The first write error latches
/// and is returned from every subsequent call.
pub struct Encoder<W: Write> {
    writer: W,
    err: Option<EncodeError>,
    trailing_newline: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Encoder<W> {
        Encoder {
            writer,
            err: None,
            trailing_newline: false,
        }
    }

    /// Write the encoding of `value` to the stream.
    pub fn encode<T: Marshal + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let mut bytes = to_vec(value)?;
        if self.trailing_newline {
            // A trailing space is what lets a reader know a top-level
            // number has no more digits coming.
            bytes.push(b'\n');
        }
        let written = self
            .writer
            .write_all(&bytes)
            .and_then(|()| self.writer.flush());
        if let Err(err) = written {
            let err = EncodeError::from(err);
            self.err = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Terminate every encoded value with a newline.
    pub fn enable_trailing_newline(&mut self) {
        self.trailing_newline = true;
    }

    /// Consume the encoder, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// A single token pulled from a [`Decoder`].
///
/// Delimiters are the object and array brackets `A`, `>`, `{` and `}`
/// (the object header bytes between `A` and the first member are elided, as
/// are commas and `=`); everything else arrives as a scalar [`Value`].
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Delim(char),
    Value(Value),
}

/// States of the token reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenState {
    TopValue,
    ArrayStart,
    ArrayValue,
    ArrayComma,
    ObjectStart,
    ObjectBeginKey,
    ObjectKey,
    ObjectEqually,
    ObjectValue,
    ObjectComma,
}

/// Reads and decodes Oscript values from an input stream. The decoder does
/// its own buffering and may read ahead of the values requested.
pub struct Decoder<R: Read> {
    reader: R,
    buf: Vec<u8>,
    /// Start of unread data in `buf`.
    scanp: usize,
    /// Bytes already discarded from the front of `buf`.
    scanned: u64,
    scan: Scanner,
    err: Option<DecodeError>,
    cx: DecodeContext,
    token_state: TokenState,
    token_stack: Vec<TokenState>,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Decoder<R> {
        Decoder {
            reader,
            buf: Vec::new(),
            scanp: 0,
            scanned: 0,
            scan: Scanner::new(),
            err: None,
            cx: DecodeContext::default(),
            token_state: TokenState::TopValue,
            token_stack: Vec::new(),
        }
    }

    /// Reject wire keys that do not match any field of a destination record.
    pub fn disallow_unknown_fields(&mut self) {
        self.cx.strict = true;
    }

    /// Read the next value from the stream and merge it into `dest`.
    pub fn decode<T: Unmarshal>(&mut self, dest: &mut T) -> Result<(), DecodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.token_prepare_for_decode()?;
        if !self.token_value_allowed() {
            return Err(DecodeError::Syntax(SyntaxError::new(
                "not at beginning of value".to_string(),
                self.offset(),
            )));
        }

        let n = self.read_value()?;
        let result = {
            let data = &self.buf[self.scanp..self.scanp + n];
            match crate::read::parse_value(data) {
                Ok(value) => dest.merge_value(&value, &self.cx),
                Err(err) => Err(err),
            }
        };
        self.scanp += n;
        if let Err(err) = &result {
            // The stream is still usable: a complete value was consumed
            // before the conversion failed.
            debug!(error = %err, "value rejected by destination");
        }
        self.token_value_end();
        result
    }

    /// Read the next value from the stream as a dynamic [`Value`].
    pub fn decode_value(&mut self) -> Result<Value, DecodeError> {
        let mut value = Value::Undefined;
        self.decode(&mut value)?;
        Ok(value)
    }

    /// The unread bytes currently buffered, valid until the next read from
    /// the decoder.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.scanp..]
    }

    fn offset(&self) -> u64 {
        self.scanned + self.scanp as u64
    }

    /// Scan one complete value into the buffer, returning its length.
    fn read_value(&mut self) -> Result<usize, DecodeError> {
        self.scan.reset();
        let mut scanp = self.scanp;
        'input: loop {
            while scanp < self.buf.len() {
                self.scan.bytes += 1;
                let op = self.scan.step(self.buf[scanp]);
                if op == ScanOp::End {
                    // The value ended before this byte; leave it unread.
                    break 'input;
                }
                // End is deferred one byte. Rather than block waiting for
                // that byte, invent a space when a composite closes.
                if op == ScanOp::EndObject || op == ScanOp::EndArray {
                    if self.scan.step(b' ') == ScanOp::End {
                        scanp += 1;
                        break 'input;
                    }
                }
                if op == ScanOp::Error {
                    let err = DecodeError::Syntax(self.scan.take_error());
                    self.err = Some(err.clone());
                    return Err(err);
                }
                scanp += 1;
            }
            // Refilling slides consumed bytes off the front of the buffer,
            // so the scan position is recomputed relative to the new start.
            let n = scanp - self.scanp;
            let refilled = self.refill();
            scanp = self.scanp + n;
            match refilled {
                Ok(0) => {
                    if self.scan.step(b' ') == ScanOp::End {
                        break 'input;
                    }
                    let err = if non_space(&self.buf[self.scanp..]) {
                        DecodeError::Io(Arc::new(io::Error::from(io::ErrorKind::UnexpectedEof)))
                    } else {
                        DecodeError::Eof
                    };
                    self.err = Some(err.clone());
                    return Err(err);
                }
                Ok(_) => {}
                Err(err) => {
                    let err = DecodeError::from(err);
                    self.err = Some(err.clone());
                    return Err(err);
                }
            }
        }
        Ok(scanp - self.scanp)
    }

    /// Make room and read more input. Consumed bytes slide off the front of
    /// the buffer first; the free space grows by at least 512 bytes, doubling
    /// the capacity as the buffer fills.
    fn refill(&mut self) -> io::Result<usize> {
        if self.scanp > 0 {
            self.scanned += self.scanp as u64;
            self.buf.drain(..self.scanp);
            self.scanp = 0;
        }

        const MIN_READ: usize = 512;
        let len = self.buf.len();
        if self.buf.capacity() - len < MIN_READ {
            let target = 2 * self.buf.capacity() + MIN_READ;
            self.buf.reserve(target - len);
        }
        let capacity = self.buf.capacity();
        self.buf.resize(capacity, 0);
        loop {
            match self.reader.read(&mut self.buf[len..]) {
                Ok(n) => {
                    self.buf.truncate(len + n);
                    trace!(read = n, buffered = self.buf.len(), "refilled decode buffer");
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(len);
                    return Err(err);
                }
            }
        }
    }

    /// The next significant byte, without consuming it.
    fn peek(&mut self) -> Result<u8, DecodeError> {
        loop {
            let mut i = self.scanp;
            while i < self.buf.len() {
                let c = self.buf[i];
                if is_space(c) {
                    i += 1;
                    continue;
                }
                self.scanp = i;
                return Ok(c);
            }
            match self.refill() {
                Ok(0) => return Err(DecodeError::Eof),
                Ok(_) => {}
                Err(err) => return Err(DecodeError::from(err)),
            }
        }
    }

    fn token_value_allowed(&self) -> bool {
        matches!(
            self.token_state,
            TokenState::TopValue
                | TokenState::ArrayStart
                | TokenState::ArrayValue
                | TokenState::ObjectValue
        )
    }

    fn token_value_end(&mut self) {
        match self.token_state {
            TokenState::ArrayStart | TokenState::ArrayValue => {
                self.token_state = TokenState::ArrayComma;
            }
            TokenState::ObjectValue => {
                self.token_state = TokenState::ObjectComma;
            }
            _ => {}
        }
    }

    /// Advance from a separator state to a value state so that `decode` can
    /// be interleaved with `token`.
    fn token_prepare_for_decode(&mut self) -> Result<(), DecodeError> {
        match self.token_state {
            TokenState::ArrayComma => {
                let c = self.peek()?;
                if c != b',' {
                    return Err(DecodeError::Syntax(SyntaxError::new(
                        "expected comma after array element".to_string(),
                        self.offset(),
                    )));
                }
                self.scanp += 1;
                self.token_state = TokenState::ArrayValue;
            }
            TokenState::ObjectEqually => {
                let c = self.peek()?;
                if c != b'=' {
                    return Err(DecodeError::Syntax(SyntaxError::new(
                        "expected equally after object key".to_string(),
                        self.offset(),
                    )));
                }
                self.scanp += 1;
                self.token_state = TokenState::ObjectValue;
            }
            _ => {}
        }
        Ok(())
    }

    fn pop_token_state(&mut self) -> Result<(), DecodeError> {
        match self.token_stack.pop() {
            Some(state) => {
                self.token_state = state;
                Ok(())
            }
            None => Err(DecodeError::Message(
                "token reader state underflow".to_string(),
            )),
        }
    }

    /// The next token in the stream. Delimiters are guaranteed to nest and
    /// match; at the end of the stream `Err(DecodeError::Eof)` is returned.
    pub fn token(&mut self) -> Result<Token, DecodeError> {
        loop {
            let c = self.peek()?;
            match c {
                b'{' => {
                    if !self.token_value_allowed() {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                    self.token_stack.push(self.token_state);
                    self.token_state = TokenState::ArrayStart;
                    return Ok(Token::Delim('{'));
                }
                b'}' => {
                    if self.token_state != TokenState::ArrayStart
                        && self.token_state != TokenState::ArrayComma
                    {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                    self.pop_token_state()?;
                    self.token_value_end();
                    return Ok(Token::Delim('}'));
                }
                b'A' => {
                    if !self.token_value_allowed() {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                    self.token_stack.push(self.token_state);
                    self.token_state = TokenState::ObjectStart;
                    return Ok(Token::Delim('A'));
                }
                b'<' => {
                    if self.token_state != TokenState::ObjectStart {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                }
                b'>' => {
                    if self.token_state != TokenState::ObjectStart
                        && self.token_state != TokenState::ObjectComma
                    {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                    self.pop_token_state()?;
                    self.token_value_end();
                    return Ok(Token::Delim('>'));
                }
                b'=' => {
                    if self.token_state != TokenState::ObjectEqually {
                        return Err(self.token_error(c));
                    }
                    self.scanp += 1;
                    self.token_state = TokenState::ObjectValue;
                }
                b',' => match self.token_state {
                    TokenState::ArrayComma => {
                        self.scanp += 1;
                        self.token_state = TokenState::ArrayValue;
                    }
                    TokenState::ObjectComma | TokenState::ObjectBeginKey => {
                        self.scanp += 1;
                        self.token_state = TokenState::ObjectKey;
                    }
                    TokenState::ObjectStart => {
                        self.scanp += 1;
                    }
                    _ => return Err(self.token_error(c)),
                },
                b'\'' if self.token_state == TokenState::ObjectKey => {
                    let old = self.token_state;
                    self.token_state = TokenState::TopValue;
                    let mut key = String::new();
                    let decoded = self.decode(&mut key);
                    self.token_state = old;
                    decoded?;
                    self.token_state = TokenState::ObjectEqually;
                    return Ok(Token::Value(Value::Text(key)));
                }
                _ => {
                    if c == b'1' && self.token_state == TokenState::ObjectStart {
                        // Fixed object header byte.
                        self.scanp += 1;
                        continue;
                    }
                    if (c == b'?' || c == b'N') && self.token_state == TokenState::ObjectStart {
                        // The header marker; members follow.
                        self.scanp += 1;
                        self.token_state = TokenState::ObjectBeginKey;
                        continue;
                    }
                    if !self.token_value_allowed() {
                        return Err(self.token_error(c));
                    }
                    let mut value = Value::Undefined;
                    self.decode(&mut value)?;
                    return Ok(Token::Value(value));
                }
            }
        }
    }

    fn token_error(&self, c: u8) -> DecodeError {
        let context = match self.token_state {
            TokenState::TopValue
            | TokenState::ArrayStart
            | TokenState::ArrayValue
            | TokenState::ObjectValue => " looking for beginning of value",
            TokenState::ArrayComma => " after array element",
            TokenState::ObjectKey => " looking for beginning of object key string",
            TokenState::ObjectEqually => " after object key",
            TokenState::ObjectComma => " after object key:value pair",
            _ => "",
        };
        DecodeError::Syntax(SyntaxError::new(
            format!("invalid character {:?}{}", c as char, context),
            self.offset(),
        ))
    }

    /// Whether the composite being parsed has further elements.
    pub fn more(&mut self) -> bool {
        match self.peek() {
            Ok(c) => c != b'}' && c != b'>',
            Err(_) => false,
        }
    }
}

fn non_space(bytes: &[u8]) -> bool {
    bytes.iter().any(|&c| !is_space(c))
}
