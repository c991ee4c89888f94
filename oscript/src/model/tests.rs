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

use super::*;

#[test]
fn conversions_pick_the_right_variant() {
    assert_eq!(Value::from(true), Value::BooleanValue(true));
    assert_eq!(Value::from(-5i32), Value::Int64Value(-5));
    assert_eq!(Value::from(7u8), Value::Int64Value(7));
    assert_eq!(Value::from(7u64), Value::Int64Value(7));
    assert_eq!(Value::from(u64::MAX), Value::UInt64Value(u64::MAX));
    assert_eq!(Value::from(1.5f64), Value::Float64Value(1.5));
    assert_eq!(Value::from("text"), Value::text("text"));
    assert_eq!(Value::from(Option::<i32>::None), Value::Undefined);
    assert_eq!(Value::from(Some(2i64)), Value::Int64Value(2));
    assert_eq!(
        Value::from(vec![1i32, 2]),
        Value::sequence([Value::Int64Value(1), Value::Int64Value(2)]),
    );
}

#[test]
fn kinds_describe_values() {
    assert_eq!(Value::Undefined.kind(), ValueKind::Undefined);
    assert_eq!(Value::Int64Value(0).kind(), ValueKind::Int);
    assert_eq!(Value::UInt64Value(0).kind(), ValueKind::Int);
    assert_eq!(Value::text("").kind(), ValueKind::Text);
    assert_eq!(Value::Object(vec![]).kind(), ValueKind::Object);
    assert_eq!(format!("{}", ValueKind::Sequence), "Sequence");
}

#[test]
fn slots_build_from_pairs() {
    let slot = Slot::from(("key", 1i64));
    assert_eq!(slot.key, "key");
    assert_eq!(slot.value, Value::Int64Value(1));
}

#[test]
fn blob_round_trips_base64() {
    let blob = Blob::from_vec(vec![0, 1, 2, 0xFF]);
    let mut encoded = Vec::new();
    blob.encode(&mut encoded).unwrap();
    assert_eq!(encoded, b"AAEC/w==");
    assert_eq!(Blob::decode(&encoded).unwrap(), blob);
}

#[test]
fn blob_rejects_bad_base64() {
    assert!(Blob::decode(b"not base64!").is_err());
}

#[test]
fn timestamp_has_second_precision_parts() {
    let ts = Timestamp::from_parts(2019, 12, 4, 11, 47, 16).unwrap();
    assert_eq!(ts.parts(), (2019, 12, 4, 11, 47, 16));
    assert!(Timestamp::from_parts(2019, 13, 1, 0, 0, 0).is_none());
    assert!(Timestamp::from_parts(2019, 2, 30, 0, 0, 0).is_none());
    assert!(Timestamp::from_parts(2019, 1, 1, 24, 0, 0).is_none());
}

#[test]
fn default_timestamp_is_the_epoch() {
    assert_eq!(Timestamp::default().seconds(), 0);
    assert_eq!(Timestamp::default().parts(), (1970, 1, 1, 0, 0, 0));
}

#[test]
fn error_code_displays_its_code() {
    assert_eq!(ErrorCode(1024).to_string(), "1024");
    assert_eq!(ErrorCode::from(7).code(), 7);
}
