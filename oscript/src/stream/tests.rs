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

use std::collections::HashMap;
use std::io;
use std::io::Read;

use super::*;
use crate::model::Value;

#[test]
fn encodes_values_with_trailing_newlines() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.enable_trailing_newline();
    encoder.encode(&5i64).unwrap();
    encoder.encode(&vec![1i64, 2]).unwrap();
    encoder.encode("x").unwrap();
    assert_eq!(encoder.into_inner(), b"5\n{1,2}\n'x'\n");
}

struct FailingWriter;

impl io::Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn the_first_write_error_latches() {
    let mut encoder = Encoder::new(FailingWriter);
    assert!(matches!(encoder.encode(&1i64), Err(EncodeError::Io(_))));
    // Later calls fail without touching the sink.
    assert!(matches!(encoder.encode(&2i64), Err(EncodeError::Io(_))));
}

#[test]
fn marshal_errors_do_not_poison_the_encoder() {
    let mut encoder = Encoder::new(Vec::new());
    assert!(encoder.encode(&f64::NAN).is_err());
    encoder.encode(&1i64).unwrap();
    assert_eq!(encoder.into_inner(), b"1");
}

/// Serves the wrapped bytes a few at a time to exercise `refill`.
struct Trickle<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Trickle<'a> {
    fn new(data: &'a [u8]) -> Trickle<'a> {
        Trickle { data, pos: 0 }
    }
}

impl<'a> Read for Trickle<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.data.len() - self.pos).min(3).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn decodes_consecutive_values() {
    let mut decoder = Decoder::new(Trickle::new(b"5\n{1,2}\n'x'\n"));
    let mut n = 0i64;
    decoder.decode(&mut n).unwrap();
    assert_eq!(n, 5);
    let mut seq: Vec<i64> = Vec::new();
    decoder.decode(&mut seq).unwrap();
    assert_eq!(seq, vec![1, 2]);
    let mut text = String::new();
    decoder.decode(&mut text).unwrap();
    assert_eq!(text, "x");
    assert!(matches!(decoder.decode(&mut n), Err(DecodeError::Eof)));
}

#[test]
fn decodes_adjacent_objects_without_separators() {
    let mut decoder = Decoder::new(Trickle::new(b"A<1,?,'a'=1>A<1,?,'a'=2>"));
    let first = decoder.decode_value().unwrap();
    assert_eq!(first, Value::object([("a", Value::Int64Value(1))]));
    let second = decoder.decode_value().unwrap();
    assert_eq!(second, Value::object([("a", Value::Int64Value(2))]));
}

#[test]
fn buffered_exposes_the_unread_remainder() {
    // A slice source arrives in one read, so the remainder is buffered.
    let mut decoder = Decoder::new(&b"1 {2}"[..]);
    let mut n = 0i64;
    decoder.decode(&mut n).unwrap();
    assert_eq!(n, 1);
    assert_eq!(decoder.buffered(), b" {2}");
}

#[test]
fn truncated_documents_are_io_errors() {
    let mut decoder = Decoder::new(Trickle::new(b"A<1,?"));
    let mut value = Value::Undefined;
    assert!(matches!(
        decoder.decode(&mut value),
        Err(DecodeError::Io(_))
    ));
}

#[test]
fn syntax_errors_latch_the_decoder() {
    let mut decoder = Decoder::new(Trickle::new(b"A<2,?> 1"));
    let mut value = Value::Undefined;
    assert!(matches!(
        decoder.decode(&mut value),
        Err(DecodeError::Syntax(_))
    ));
    assert!(matches!(
        decoder.decode(&mut value),
        Err(DecodeError::Syntax(_))
    ));
}

#[test]
fn mismatches_do_not_poison_the_stream() {
    let mut decoder = Decoder::new(Trickle::new(b"'text' 7"));
    let mut n = 0i64;
    assert!(matches!(
        decoder.decode(&mut n),
        Err(DecodeError::Mismatch { .. })
    ));
    decoder.decode(&mut n).unwrap();
    assert_eq!(n, 7);
}

#[test]
fn tokens_walk_nested_structure() {
    let mut decoder = Decoder::new(Trickle::new(b"A<1,?,'obj'={A<1,?,'a'=1>}>"));
    let mut tokens = Vec::new();
    loop {
        match decoder.token() {
            Ok(token) => tokens.push(token),
            Err(DecodeError::Eof) => break,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(
        tokens,
        vec![
            Token::Delim('A'),
            Token::Value(Value::text("obj")),
            Token::Delim('{'),
            Token::Delim('A'),
            Token::Value(Value::text("a")),
            Token::Value(Value::Int64Value(1)),
            Token::Delim('>'),
            Token::Delim('}'),
            Token::Delim('>'),
        ]
    );
}

#[test]
fn tokens_cover_scalars_and_empty_composites() {
    let mut decoder = Decoder::new(Trickle::new(b"{true, ?, 'x', G1.5, E7}"));
    let mut tokens = Vec::new();
    loop {
        match decoder.token() {
            Ok(token) => tokens.push(token),
            Err(DecodeError::Eof) => break,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(
        tokens,
        vec![
            Token::Delim('{'),
            Token::Value(Value::BooleanValue(true)),
            Token::Value(Value::Undefined),
            Token::Value(Value::text("x")),
            Token::Value(Value::Float64Value(1.5)),
            Token::Value(Value::ErrorValue(crate::ErrorCode(7))),
            Token::Delim('}'),
        ]
    );
}

#[test]
fn more_reports_remaining_elements() {
    let mut decoder = Decoder::new(Trickle::new(b"{1,2}"));
    assert_eq!(decoder.token().unwrap(), Token::Delim('{'));
    let mut elements = Vec::new();
    while decoder.more() {
        match decoder.token().unwrap() {
            Token::Value(value) => elements.push(value),
            other => panic!("unexpected token: {:?}", other),
        }
    }
    assert_eq!(
        elements,
        vec![Value::Int64Value(1), Value::Int64Value(2)]
    );
    assert_eq!(decoder.token().unwrap(), Token::Delim('}'));
}

#[test]
fn decode_interleaves_with_tokens() {
    let mut decoder = Decoder::new(Trickle::new(b"{A<1,?,'a'=1>, A<1,?,'a'=2>}"));
    assert_eq!(decoder.token().unwrap(), Token::Delim('{'));
    let mut maps: Vec<HashMap<String, i64>> = Vec::new();
    while decoder.more() {
        let mut map = HashMap::new();
        decoder.decode(&mut map).unwrap();
        maps.push(map);
    }
    assert_eq!(decoder.token().unwrap(), Token::Delim('}'));
    assert_eq!(maps.len(), 2);
    assert_eq!(maps[0]["a"], 1);
    assert_eq!(maps[1]["a"], 2);
}
