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

//! Oscript scanning state machine.
//!
//! The scanner is the single grammar authority of the crate: validation,
//! whitespace compaction and the parser all drive it one byte at a time.
//! Each state is a function that inspects the incoming byte, installs the
//! successor state and reports a [`ScanOp`] describing what just happened.
//!
//! The end of the top-level value is observable only after the byte that
//! follows it; `End` is deferred one byte so that adjacent numbers stay
//! unambiguous (is `123` complete, or the start of `12345e+6`?). At end of
//! input callers feed a synthetic space through [`Scanner::eof`].


use crate::error::SyntaxError;

/// Significant events reported by the scanner, one per input byte. Once a
/// state function reports `Error` every subsequent call reports `Error` too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd)]
pub(crate) enum ScanOp {
    /// Uninteresting byte.
    Continue,
    /// First byte of a literal; the end is implied by the next op that is
    /// not `Continue`.
    BeginLiteral,
    /// `A`, opening an object.
    BeginObject,
    /// The object header is complete, a key or `>` follows.
    BeginObjectKey,
    /// An object key just ended.
    ObjectKey,
    /// A non-final object member value just ended.
    ObjectValue,
    /// `>`, closing an object.
    EndObject,
    /// `{`, opening an array.
    BeginArray,
    /// A non-final array element just ended.
    ArrayValue,
    /// `}`, closing an array.
    EndArray,
    /// Insignificant space byte.
    SkipSpace,
    /// The top-level value ended before this byte.
    End,
    /// The scan failed; the error is latched on the scanner.
    Error,
}

/// Composite contexts held on the parse stack, outermost at entry 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    /// Reading the object header or first member.
    ObjectStart,
    /// Reading an object key, before `=`.
    ObjectKey,
    /// Reading an object value, after `=`.
    ObjectValue,
    /// Reading an array element.
    ArrayValue,
}

type StateFn = fn(&mut Scanner, u8) -> ScanOp;

/// The Oscript scanning state machine. Callers reset the scanner and then
/// feed bytes one at a time through [`Scanner::step`].
pub(crate) struct Scanner {
    /// The transition to execute for the next byte.
    step: StateFn,
    /// Reached the end of the top-level value.
    end_top: bool,
    /// Stack of composite contexts.
    parse_state: Vec<ParseState>,
    /// The latched error, if any.
    err: Option<SyntaxError>,
    /// Total bytes consumed; maintained by the caller.
    pub(crate) bytes: u64,
}

impl Default for Scanner {
    fn default() -> Scanner {
        Scanner::new()
    }
}

impl Scanner {
    pub(crate) fn new() -> Scanner {
        Scanner {
            step: state_begin_value,
            end_top: false,
            parse_state: Vec::new(),
            err: None,
            bytes: 0,
        }
    }

    /// Prepare the scanner for a fresh document.
    pub(crate) fn reset(&mut self) {
        self.step = state_begin_value;
        self.parse_state.clear();
        self.err = None;
        self.end_top = false;
    }

    /// Execute the transition for one input byte.
    pub(crate) fn step(&mut self, c: u8) -> ScanOp {
        let step = self.step;
        step(self, c)
    }

    /// Tell the scanner that the input is exhausted.
    pub(crate) fn eof(&mut self) -> ScanOp {
        if self.err.is_some() {
            return ScanOp::Error;
        }
        if self.end_top {
            return ScanOp::End;
        }
        self.step(b' ');
        if self.end_top {
            return ScanOp::End;
        }
        if self.err.is_none() {
            self.err = Some(SyntaxError::new(
                "unexpected end of Oscript input".to_string(),
                self.bytes,
            ));
        }
        ScanOp::Error
    }

    pub(crate) fn take_error(&mut self) -> SyntaxError {
        self.err.take().unwrap_or_else(|| {
            SyntaxError::new("oscript scanner failed without an error".to_string(), 0)
        })
    }

    fn push_parse_state(&mut self, p: ParseState) {
        self.parse_state.push(p);
    }

    /// Pop a composite context and pick the follow-on state.
    fn pop_parse_state(&mut self) {
        self.parse_state.pop();
        if self.parse_state.is_empty() {
            self.step = state_end_top;
            self.end_top = true;
        } else {
            self.step = state_end_value;
        }
    }

    fn fail(&mut self, c: u8, context: &str) -> ScanOp {
        self.step = state_error;
        let msg = if context.is_empty() {
            format!("invalid character {}", quote_char(c))
        } else {
            format!("invalid character {} {}", quote_char(c), context)
        };
        self.err = Some(SyntaxError::new(msg, self.bytes));
        ScanOp::Error
    }
}

pub(crate) fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r' || c == b'\n'
}

/// Format `c` as a quoted character literal for error messages.
fn quote_char(c: u8) -> String {
    match c {
        b'\'' => r#"'\''"#.to_string(),
        b'"' => r#"'"'"#.to_string(),
        _ => format!("'{}'", std::ascii::escape_default(c)),
    }
}

/// The state at the beginning of a value.
fn state_begin_value(s: &mut Scanner, c: u8) -> ScanOp {
    if is_space(c) {
        return ScanOp::SkipSpace;
    }
    match c {
        b'A' => {
            // beginning of A<1,?>
            s.step = state_begin_object;
            s.push_parse_state(ParseState::ObjectStart);
            return ScanOp::BeginObject;
        }
        b'D' => {
            // beginning of a date: D/2006/1/2:15:4:5
            s.step = state_in_date;
            return ScanOp::BeginLiteral;
        }
        b'E' => {
            // beginning of an error: E1024
            s.step = state_begin_error;
            return ScanOp::BeginLiteral;
        }
        b'{' => {
            s.step = state_begin_value_or_empty;
            s.push_parse_state(ParseState::ArrayValue);
            return ScanOp::BeginArray;
        }
        b'\'' => {
            s.step = state_in_string;
            return ScanOp::BeginLiteral;
        }
        b'-' => {
            s.step = state_l_neg;
            return ScanOp::BeginLiteral;
        }
        b'G' => {
            // beginning of G1.123
            s.step = state_g;
            return ScanOp::BeginLiteral;
        }
        b'L' => {
            // beginning of L1234
            s.step = state_l;
            return ScanOp::BeginLiteral;
        }
        b't' => {
            s.step = state_t;
            return ScanOp::BeginLiteral;
        }
        b'f' => {
            s.step = state_f;
            return ScanOp::BeginLiteral;
        }
        b'?' => {
            // the undefined value
            s.step = state_end_value;
            return ScanOp::BeginLiteral;
        }
        _ => {}
    }
    if c.is_ascii_digit() {
        // beginning of 1234
        s.step = state_l1;
        return ScanOp::BeginLiteral;
    }
    s.fail(c, "looking for beginning of value")
}

/// The state after reading `D`.
fn state_in_date(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'/' || c == b':' || c.is_ascii_digit() {
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state after reading `E`.
fn state_begin_error(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        s.step = state_in_error;
        return ScanOp::Continue;
    }
    s.fail(c, "looking for beginning of error syntax")
}

/// The state after reading `E1`.
fn state_in_error(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state after reading `A`.
fn state_begin_object(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'<' {
        s.step = state_begin_object_bracket;
        return ScanOp::Continue;
    }
    s.fail(c, "looking for beginning of object syntax")
}

/// The state after reading `A<`.
fn state_begin_object_bracket(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'1' {
        s.step = state_begin_object_one;
        return ScanOp::Continue;
    }
    s.fail(c, "looking for beginning of object syntax")
}

/// The state after reading `A<1`.
fn state_begin_object_one(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b',' {
        s.step = state_begin_object_comma;
        return ScanOp::Continue;
    }
    s.fail(c, "looking for beginning of object syntax")
}

/// The state after reading `A<1,`.
fn state_begin_object_comma(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'?' || c == b'N' {
        s.step = state_begin_string_or_empty;
        return ScanOp::BeginObjectKey;
    }
    s.fail(c, "looking for beginning of object syntax")
}

/// The state after reading `A<1,?` or `A<1,N`.
fn state_begin_string_or_empty(s: &mut Scanner, c: u8) -> ScanOp {
    match c {
        b',' => {
            s.step = state_begin_string;
            let top = s.parse_state.len() - 1;
            s.parse_state[top] = ParseState::ObjectKey;
            ScanOp::BeginObjectKey
        }
        b'>' => {
            let top = s.parse_state.len() - 1;
            s.parse_state[top] = ParseState::ObjectValue;
            state_end_value(s, c)
        }
        _ => s.fail(c, "looking for beginning of object syntax"),
    }
}

/// The state after reading `{`.
fn state_begin_value_or_empty(s: &mut Scanner, c: u8) -> ScanOp {
    if is_space(c) {
        return ScanOp::SkipSpace;
    }
    if c == b'}' {
        return state_end_value(s, c);
    }
    state_begin_value(s, c)
}

/// The state before an object key string.
fn state_begin_string(s: &mut Scanner, c: u8) -> ScanOp {
    if is_space(c) {
        return ScanOp::SkipSpace;
    }
    if c == b'\'' {
        s.step = state_in_string;
        return ScanOp::BeginLiteral;
    }
    s.fail(c, "looking for beginning of object key string")
}

/// The state after completing a value, such as after reading `A<1,?>`, `{}`
/// or `true`.
fn state_end_value(s: &mut Scanner, c: u8) -> ScanOp {
    if s.parse_state.is_empty() {
        // Completed the top-level value before the current byte.
        s.step = state_end_top;
        s.end_top = true;
        return state_end_top(s, c);
    }
    if is_space(c) {
        s.step = state_end_value;
        return ScanOp::SkipSpace;
    }
    let top = s.parse_state.len() - 1;
    match s.parse_state[top] {
        ParseState::ObjectKey => {
            if c == b'=' {
                s.parse_state[top] = ParseState::ObjectValue;
                s.step = state_begin_value;
                return ScanOp::ObjectKey;
            }
            s.fail(c, "after object key")
        }
        ParseState::ObjectStart | ParseState::ObjectValue => {
            if c == b',' {
                s.parse_state[top] = ParseState::ObjectKey;
                s.step = state_begin_string;
                return ScanOp::ObjectValue;
            }
            if c == b'>' {
                s.pop_parse_state();
                return ScanOp::EndObject;
            }
            s.fail(c, "after object key:value pair")
        }
        ParseState::ArrayValue => {
            if c == b',' {
                s.step = state_begin_value;
                return ScanOp::ArrayValue;
            }
            if c == b'}' {
                s.pop_parse_state();
                return ScanOp::EndArray;
            }
            s.fail(c, "after array element")
        }
    }
}

/// The state after finishing the top-level value. Only spaces are acceptable
/// from here on.
fn state_end_top(s: &mut Scanner, c: u8) -> ScanOp {
    if !is_space(c) {
        // Complain about the non-space byte on the next call.
        s.fail(c, "after top-level value");
    }
    ScanOp::End
}

/// The state inside a quoted string.
fn state_in_string(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'\'' {
        s.step = state_end_value;
        return ScanOp::Continue;
    }
    if c == b'\\' {
        s.step = state_in_string_esc;
        return ScanOp::Continue;
    }
    ScanOp::Continue
}

/// The state after reading `\` inside a quoted string.
fn state_in_string_esc(s: &mut Scanner, c: u8) -> ScanOp {
    match c {
        b'b' | b'f' | b'n' | b'r' | b't' | b'\\' | b'/' | b'"' | b'\'' => {
            s.step = state_in_string;
            ScanOp::Continue
        }
        b'u' => {
            s.step = state_in_string_esc_u;
            ScanOp::Continue
        }
        _ => s.fail(c, "in string escape code"),
    }
}

fn is_hex(c: u8) -> bool {
    c.is_ascii_digit() || (b'a'..=b'f').contains(&c) || (b'A'..=b'F').contains(&c)
}

/// The state after reading `\u` inside a quoted string.
fn state_in_string_esc_u(s: &mut Scanner, c: u8) -> ScanOp {
    if is_hex(c) {
        s.step = state_in_string_esc_u1;
        return ScanOp::Continue;
    }
    s.fail(c, "in \\u hexadecimal character escape")
}

/// The state after reading `\u1` inside a quoted string.
fn state_in_string_esc_u1(s: &mut Scanner, c: u8) -> ScanOp {
    if is_hex(c) {
        s.step = state_in_string_esc_u12;
        return ScanOp::Continue;
    }
    s.fail(c, "in \\u hexadecimal character escape")
}

/// The state after reading `\u12` inside a quoted string.
fn state_in_string_esc_u12(s: &mut Scanner, c: u8) -> ScanOp {
    if is_hex(c) {
        s.step = state_in_string_esc_u123;
        return ScanOp::Continue;
    }
    s.fail(c, "in \\u hexadecimal character escape")
}

/// The state after reading `\u123` inside a quoted string.
fn state_in_string_esc_u123(s: &mut Scanner, c: u8) -> ScanOp {
    if is_hex(c) {
        s.step = state_in_string;
        return ScanOp::Continue;
    }
    s.fail(c, "in \\u hexadecimal character escape")
}

/// The state after reading `L-` or `-`.
fn state_l_neg(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'0' {
        s.step = state_end_value;
        return ScanOp::Continue;
    }
    if (b'1'..=b'9').contains(&c) {
        s.step = state_l1;
        return ScanOp::Continue;
    }
    s.fail(c, "in numeric literal")
}

/// The state after reading `L`.
fn state_l(s: &mut Scanner, c: u8) -> ScanOp {
    match c {
        b'-' => {
            s.step = state_l_neg;
            ScanOp::Continue
        }
        b'0' => {
            s.step = state_end_value;
            ScanOp::Continue
        }
        b'1'..=b'9' => {
            s.step = state_l1;
            ScanOp::Continue
        }
        _ => s.fail(c, "in numeric literal"),
    }
}

/// The state inside the digits of an integer, such as after `1` or `L10`.
fn state_l1(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        s.step = state_l1;
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state after reading `G-`.
fn state_g_neg(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'0' {
        s.step = state_g0;
        return ScanOp::Continue;
    }
    if (b'1'..=b'9').contains(&c) {
        s.step = state_g1;
        return ScanOp::Continue;
    }
    s.fail(c, "in numeric literal")
}

/// The state after reading `G`.
fn state_g(s: &mut Scanner, c: u8) -> ScanOp {
    match c {
        b'-' => {
            s.step = state_g_neg;
            ScanOp::Continue
        }
        b'0' => {
            s.step = state_g0;
            ScanOp::Continue
        }
        b'1'..=b'9' => {
            s.step = state_g1;
            ScanOp::Continue
        }
        _ => s.fail(c, "in numeric literal"),
    }
}

/// The state after reading `G0`, or a complete integer part.
fn state_g0(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'.' {
        s.step = state_dot;
        return ScanOp::Continue;
    }
    if c == b'e' || c == b'E' {
        s.step = state_exp;
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state inside the integer part of a real, such as after `G1` or `G52`.
fn state_g1(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        s.step = state_g1;
        return ScanOp::Continue;
    }
    state_g0(s, c)
}

/// The state after reading the decimal point, such as after `G1.`.
fn state_dot(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        s.step = state_dot0;
        return ScanOp::Continue;
    }
    s.fail(c, "after decimal point in numeric literal")
}

/// The state inside the fractional digits, such as after `G3.14`.
fn state_dot0(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        return ScanOp::Continue;
    }
    if c == b'e' || c == b'E' {
        s.step = state_exp;
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state after reading the mantissa and `e`, such as after `G314e`.
fn state_exp(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'+' || c == b'-' {
        s.step = state_exp_sign;
        return ScanOp::Continue;
    }
    state_exp_sign(s, c)
}

/// The state after the exponent sign, such as after `G314e-`.
fn state_exp_sign(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        s.step = state_exp0;
        return ScanOp::Continue;
    }
    s.fail(c, "in exponent of numeric literal")
}

/// The state inside the exponent digits, such as after `G314e-2`.
fn state_exp0(s: &mut Scanner, c: u8) -> ScanOp {
    if c.is_ascii_digit() {
        return ScanOp::Continue;
    }
    state_end_value(s, c)
}

/// The state after reading `t`.
fn state_t(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'r' {
        s.step = state_tr;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal true (expecting 'r')")
}

/// The state after reading `tr`.
fn state_tr(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'u' {
        s.step = state_tru;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal true (expecting 'u')")
}

/// The state after reading `tru`.
fn state_tru(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'e' {
        s.step = state_end_value;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal true (expecting 'e')")
}

/// The state after reading `f`.
fn state_f(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'a' {
        s.step = state_fa;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal false (expecting 'a')")
}

/// The state after reading `fa`.
fn state_fa(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'l' {
        s.step = state_fal;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal false (expecting 'l')")
}

/// The state after reading `fal`.
fn state_fal(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b's' {
        s.step = state_fals;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal false (expecting 's')")
}

/// The state after reading `fals`.
fn state_fals(s: &mut Scanner, c: u8) -> ScanOp {
    if c == b'e' {
        s.step = state_end_value;
        return ScanOp::Continue;
    }
    s.fail(c, "in literal false (expecting 'e')")
}

/// The sink state after a syntax error.
fn state_error(_s: &mut Scanner, _c: u8) -> ScanOp {
    ScanOp::Error
}

/// Verify that `data` is a single valid Oscript document.
pub(crate) fn check_valid(data: &[u8], scan: &mut Scanner) -> Result<(), SyntaxError> {
    scan.reset();
    for &c in data {
        scan.bytes += 1;
        if scan.step(c) == ScanOp::Error {
            return Err(scan.take_error());
        }
    }
    if scan.eof() == ScanOp::Error {
        return Err(scan.take_error());
    }
    Ok(())
}

/// Report whether `data` is a valid Oscript encoding.
pub fn is_valid(data: &[u8]) -> bool {
    check_valid(data, &mut Scanner::new()).is_ok()
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Append `src` to `dst` with insignificant space bytes elided. The three
/// byte sequences for U+2028 and U+2029 are rewritten to `\u2028`/`\u2029`
/// escapes while copying. On error `dst` is truncated back to its original
/// length.
pub fn compact(dst: &mut Vec<u8>, src: &[u8]) -> Result<(), SyntaxError> {
    let orig_len = dst.len();
    let mut scan = Scanner::new();
    let mut start = 0;
    for (i, &c) in src.iter().enumerate() {
        // Convert U+2028 and U+2029 (E2 80 A8 and E2 80 A9).
        if c == 0xE2 && i + 2 < src.len() && src[i + 1] == 0x80 && src[i + 2] & !1 == 0xA8 {
            if start < i {
                dst.extend_from_slice(&src[start..i]);
            }
            dst.extend_from_slice(br"\u202");
            dst.push(HEX[(src[i + 2] & 0xF) as usize]);
            start = i + 3;
        }
        let op = scan.step(c);
        if op >= ScanOp::SkipSpace {
            if op == ScanOp::Error {
                break;
            }
            if start < i {
                dst.extend_from_slice(&src[start..i]);
            }
            start = i + 1;
        }
    }
    if scan.eof() == ScanOp::Error {
        dst.truncate(orig_len);
        return Err(scan.take_error());
    }
    if start < src.len() {
        dst.extend_from_slice(&src[start..]);
    }
    Ok(())
}
