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

//! Parsing of Oscript bytes into [`Value`]s.
//!
//! The parser drives the scanner one byte at a time and interprets the
//! opcodes it reports. Input is expected to have been validated already
//! (callers run [`check_valid`](crate::scanner::check_valid) first, as the
//! top-level entry points do), so opcode sequences that cannot occur in a
//! valid document surface as internal inconsistencies rather than syntax
//! errors.


use crate::error::DecodeError;
use crate::model::{Slot, Timestamp, Value};
use crate::scanner::{ScanOp, Scanner};

/// Parse a single validated document into a [`Value`].
pub(crate) fn parse_value(data: &[u8]) -> Result<Value, DecodeError> {
    let mut parser = Parser {
        data,
        off: 0,
        opcode: ScanOp::Continue,
        scan: Scanner::new(),
    };
    parser.scan_while(ScanOp::SkipSpace);
    parser.value()
}

fn phase_error() -> DecodeError {
    DecodeError::Message("decoder out of sync with scanner".to_string())
}

struct Parser<'a> {
    data: &'a [u8],
    /// Next read offset in `data`.
    off: usize,
    /// The opcode of the last processed byte.
    opcode: ScanOp,
    scan: Scanner,
}

impl<'a> Parser<'a> {
    /// The position of the last byte read.
    fn read_index(&self) -> usize {
        self.off - 1
    }

    /// Process the byte at the current offset.
    fn scan_next(&mut self) {
        if self.off < self.data.len() {
            self.scan.bytes += 1;
            self.opcode = self.scan.step(self.data[self.off]);
            self.off += 1;
        } else {
            self.opcode = self.scan.eof();
            self.off = self.data.len() + 1;
        }
    }

    /// Process bytes until the scanner reports an opcode other than `op`.
    fn scan_while(&mut self, op: ScanOp) {
        while self.off < self.data.len() {
            self.scan.bytes += 1;
            let next = self.scan.step(self.data[self.off]);
            self.off += 1;
            if next != op {
                self.opcode = next;
                return;
            }
        }
        self.off = self.data.len() + 1;
        self.opcode = self.scan.eof();
    }

    /// Consume one value. The first byte of the value has been read already
    /// and its opcode is current.
    fn value(&mut self) -> Result<Value, DecodeError> {
        match self.opcode {
            ScanOp::BeginArray => {
                let value = self.array()?;
                self.scan_next();
                Ok(value)
            }
            ScanOp::BeginObject => {
                self.scan_while(ScanOp::Continue);
                let value = self.object()?;
                self.scan_next();
                Ok(value)
            }
            ScanOp::BeginLiteral => {
                let start = self.read_index();
                self.scan_while(ScanOp::Continue);
                literal_value(&self.data[start..self.read_index()])
            }
            _ => Err(phase_error()),
        }
    }

    /// Consume an array; the opening `{` has been read already.
    fn array(&mut self) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        loop {
            // Look ahead for `}` - can only happen on the first iteration.
            self.scan_while(ScanOp::SkipSpace);
            if self.opcode == ScanOp::EndArray {
                break;
            }
            items.push(self.value()?);

            // The next token must be `,` or `}`.
            if self.opcode == ScanOp::SkipSpace {
                self.scan_while(ScanOp::SkipSpace);
            }
            if self.opcode == ScanOp::EndArray {
                break;
            }
            if self.opcode != ScanOp::ArrayValue {
                return Err(phase_error());
            }
        }
        Ok(Value::Sequence(items))
    }

    /// Consume an object; the header through the `?`/`N` marker has been
    /// read already.
    fn object(&mut self) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        // Read the `,` before the first member, or the closing `>`.
        self.scan_next();
        if self.opcode == ScanOp::EndObject {
            return Ok(Value::Object(items));
        }
        loop {
            // Read the opening quote of the key, or the closing `>`.
            self.scan_while(ScanOp::SkipSpace);
            if self.opcode == ScanOp::EndObject {
                break;
            }
            if self.opcode != ScanOp::BeginLiteral {
                return Err(phase_error());
            }

            let start = self.read_index();
            self.scan_while(ScanOp::Continue);
            let item = &self.data[start..self.read_index()];
            let key = unquote(item).ok_or_else(phase_error)?;

            // Read the `=` before the value.
            if self.opcode == ScanOp::SkipSpace {
                self.scan_while(ScanOp::SkipSpace);
            }
            if self.opcode != ScanOp::ObjectKey {
                return Err(phase_error());
            }
            self.scan_while(ScanOp::SkipSpace);

            let value = self.value()?;
            items.push(Slot::new(key, value));

            // The next token must be `,` or `>`.
            if self.opcode == ScanOp::SkipSpace {
                self.scan_while(ScanOp::SkipSpace);
            }
            if self.opcode == ScanOp::EndObject {
                break;
            }
            if self.opcode != ScanOp::ObjectValue {
                return Err(phase_error());
            }
        }
        Ok(Value::Object(items))
    }
}

/// Convert the bytes of one literal into a [`Value`].
pub(crate) fn literal_value(item: &[u8]) -> Result<Value, DecodeError> {
    let mismatch = |desc: String, target: &'static str| DecodeError::Mismatch {
        value: desc,
        target,
        record: None,
        field: None,
    };
    match item[0] {
        b'?' => Ok(Value::Undefined),
        b'D' => {
            let text = std::str::from_utf8(item).map_err(|_| phase_error())?;
            parse_timestamp(text).map(Value::DateValue)
        }
        b't' | b'f' => Ok(Value::BooleanValue(item[0] == b't')),
        b'\'' => unquote(item).map(Value::Text).ok_or_else(phase_error),
        b'E' => {
            let text = std::str::from_utf8(&item[1..]).map_err(|_| phase_error())?;
            let code = text
                .parse::<i64>()
                .map_err(|_| mismatch(format!("error {}", text), "i64"))?;
            Ok(Value::ErrorValue(code.into()))
        }
        b'G' => {
            let c = item[1];
            if c != b'-' && !c.is_ascii_digit() {
                return Err(phase_error());
            }
            let text = std::str::from_utf8(&item[1..]).map_err(|_| phase_error())?;
            let number = text
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| mismatch(format!("number {}", text), "f64"))?;
            Ok(Value::Float64Value(number))
        }
        mut c => {
            let mut digits = item;
            if c == b'L' {
                digits = &item[1..];
                c = digits[0];
            }
            if c != b'-' && !c.is_ascii_digit() {
                return Err(phase_error());
            }
            let text = std::str::from_utf8(digits).map_err(|_| phase_error())?;
            let number = text
                .parse::<i64>()
                .map_err(|_| mismatch(format!("number {}", text), "i64"))?;
            Ok(Value::Int64Value(number))
        }
    }
}

/// Convert a quoted Oscript string literal into the string it denotes.
/// Returns `None` when the bytes are not a plausible literal (the scanner
/// rejects such input before this point). The wire may carry bytes under any
/// encoding; ill-formed UTF-8 is coerced a byte at a time to U+FFFD.
pub(crate) fn unquote(s: &[u8]) -> Option<String> {
    if s.len() < 2 || s[0] != b'\'' || s[s.len() - 1] != b'\'' {
        return None;
    }
    let s = &s[1..s.len() - 1];

    // If there are no escapes and no ill-formed sequences the bytes can be
    // taken as they are.
    let mut r = 0;
    while r < s.len() {
        let c = s[r];
        if c == b'\\' || c == b'\'' {
            break;
        }
        if c < 0x80 {
            r += 1;
            continue;
        }
        match decode_rune(&s[r..]) {
            Some((_, size)) => r += size,
            None => break,
        }
    }
    if r == s.len() {
        return String::from_utf8(s.to_vec()).ok();
    }

    let mut out = String::with_capacity(s.len() + 8);
    out.push_str(std::str::from_utf8(&s[..r]).ok()?);
    let mut r = r;
    while r < s.len() {
        let c = s[r];
        if c == b'\\' {
            r += 1;
            if r >= s.len() {
                return None;
            }
            match s[r] {
                b'"' | b'\\' | b'/' | b'\'' => {
                    out.push(s[r] as char);
                    r += 1;
                }
                b'b' => {
                    out.push('\u{08}');
                    r += 1;
                }
                b'f' => {
                    out.push('\u{0C}');
                    r += 1;
                }
                b'n' => {
                    out.push('\n');
                    r += 1;
                }
                b'r' => {
                    out.push('\r');
                    r += 1;
                }
                b't' => {
                    out.push('\t');
                    r += 1;
                }
                b'u' => {
                    r -= 1;
                    let rr = get_u4(&s[r..])?;
                    r += 6;
                    if (0xD800..0xE000).contains(&rr) {
                        // A high surrogate may pair with a following low
                        // surrogate escape; anything else is replaced.
                        if (0xD800..0xDC00).contains(&rr) {
                            if let Some(rr1) = get_u4(&s[r..]) {
                                if (0xDC00..0xE000).contains(&rr1) {
                                    let combined =
                                        0x10000 + ((rr - 0xD800) << 10) + (rr1 - 0xDC00);
                                    if let Some(ch) = char::from_u32(combined) {
                                        r += 6;
                                        out.push(ch);
                                        continue;
                                    }
                                }
                            }
                        }
                        out.push('\u{FFFD}');
                    } else {
                        out.push(char::from_u32(rr).unwrap_or('\u{FFFD}'));
                    }
                }
                _ => return None,
            }
        } else if c == b'\'' {
            // An unescaped quote cannot occur inside the literal.
            return None;
        } else if c < 0x80 {
            // Control bytes are allowed through unchanged.
            out.push(c as char);
            r += 1;
        } else {
            match decode_rune(&s[r..]) {
                Some((ch, size)) => {
                    out.push(ch);
                    r += size;
                }
                None => {
                    out.push('\u{FFFD}');
                    r += 1;
                }
            }
        }
    }
    Some(out)
}

/// Decode `\uXXXX` at the start of `s`, returning the code unit.
fn get_u4(s: &[u8]) -> Option<u32> {
    if s.len() < 6 || s[0] != b'\\' || s[1] != b'u' {
        return None;
    }
    let mut r = 0u32;
    for &c in &s[2..6] {
        let digit = (c as char).to_digit(16)?;
        r = r * 16 + digit;
    }
    Some(r)
}

/// Decode one well-formed UTF-8 sequence from the front of `s`.
fn decode_rune(s: &[u8]) -> Option<(char, usize)> {
    let len = match s[0] {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    if s.len() < len {
        return None;
    }
    std::str::from_utf8(&s[..len])
        .ok()
        .and_then(|text| text.chars().next())
        .map(|ch| (ch, len))
}

/// Parse a date literal of the form `D/YYYY/M/D:H:M:S`.
pub(crate) fn parse_timestamp(s: &str) -> Result<Timestamp, DecodeError> {
    let fail = || DecodeError::MalformedDate(s.to_string());
    let rest = s.strip_prefix("D/").ok_or_else(fail)?;
    let chunks: Vec<&str> = rest.split(':').collect();
    if chunks.len() != 4 {
        return Err(fail());
    }
    let date: Vec<&str> = chunks[0].split('/').collect();
    if date.len() != 3 {
        return Err(fail());
    }
    if date[0].is_empty() || !date[0].bytes().all(|b| b.is_ascii_digit()) {
        return Err(fail());
    }
    let year = date[0].parse::<i32>().map_err(|_| fail())?;
    let mut narrow = [0u32; 5];
    for (slot, text) in narrow.iter_mut().zip(date[1..].iter().chain(chunks[1..].iter())) {
        if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail());
        }
        *slot = text.parse::<u32>().map_err(|_| fail())?;
    }
    let [month, day, hour, minute, second] = narrow;
    Timestamp::from_parts(year, month, day, hour, minute, second).ok_or_else(fail)
}
