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
use std::sync::Arc;

use super::resolver::{equal_fold, parse_tag};
use super::*;
use crate::error::DecodeError;
use crate::model::{Blob, ErrorCode, SdoName, Timestamp, Value};
use crate::{from_slice, unmarshal_into, unmarshal_with, Form};

fn cx() -> DecodeContext {
    DecodeContext::default()
}

#[test]
fn integers_narrow_with_overflow_checks() {
    assert_eq!(i8::try_from_value(&Value::Int64Value(127), &cx()).unwrap(), 127);
    assert!(matches!(
        i8::try_from_value(&Value::Int64Value(300), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
    assert!(matches!(
        u8::try_from_value(&Value::Int64Value(-1), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
    assert_eq!(
        u64::try_from_value(&Value::UInt64Value(u64::MAX), &cx()).unwrap(),
        u64::MAX
    );
    assert!(matches!(
        i64::try_from_value(&Value::UInt64Value(u64::MAX), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
    assert!(matches!(
        i64::try_from_value(&Value::text("5"), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
}

#[test]
fn floats_check_narrowing_range() {
    assert_eq!(f64::try_from_value(&Value::Float64Value(1.5), &cx()).unwrap(), 1.5);
    assert_eq!(f32::try_from_value(&Value::Float64Value(1.5), &cx()).unwrap(), 1.5);
    assert!(matches!(
        f32::try_from_value(&Value::Float64Value(1e300), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
    // Integers do not coerce into float destinations.
    assert!(matches!(
        f64::try_from_value(&Value::Int64Value(1), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
}

#[test]
fn undefined_is_a_no_op_for_primitive_merges() {
    let mut n = 5i32;
    n.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(n, 5);

    let mut s = String::from("kept");
    s.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(s, "kept");

    let mut p = true;
    p.merge_value(&Value::Undefined, &cx()).unwrap();
    assert!(p);

    let mut code = ErrorCode(7);
    code.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(code, ErrorCode(7));

    let mut ts = Timestamp::from_parts(2019, 1, 1, 0, 0, 0).unwrap();
    let kept = ts;
    ts.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(ts, kept);
}

#[test]
fn undefined_clears_composite_merges() {
    let mut opt = Some(5i32);
    opt.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(opt, None);

    let mut seq = vec![1i64, 2];
    seq.merge_value(&Value::Undefined, &cx()).unwrap();
    assert!(seq.is_empty());

    let mut map: HashMap<String, i64> = HashMap::new();
    map.insert("a".to_string(), 1);
    map.merge_value(&Value::Undefined, &cx()).unwrap();
    assert!(map.is_empty());

    let mut dynamic = Value::Int64Value(5);
    dynamic.merge_value(&Value::Undefined, &cx()).unwrap();
    assert_eq!(dynamic, Value::Undefined);
}

#[test]
fn strings_and_blobs_coerce_from_text() {
    assert_eq!(
        String::try_from_value(&Value::text("hi"), &cx()).unwrap(),
        "hi"
    );
    assert_eq!(
        Blob::try_from_value(&Value::text("AAE="), &cx()).unwrap(),
        Blob::from_vec(vec![0, 1])
    );
    assert!(matches!(
        Blob::try_from_value(&Value::text("!!"), &cx()),
        Err(DecodeError::Base64(_))
    ));
}

#[test]
fn error_codes_accept_undefined_as_zero() {
    assert_eq!(
        ErrorCode::try_from_value(&Value::Undefined, &cx()).unwrap(),
        ErrorCode(0)
    );
    assert_eq!(
        ErrorCode::try_from_value(&Value::ErrorValue(ErrorCode(9)), &cx()).unwrap(),
        ErrorCode(9)
    );
    assert!(matches!(
        ErrorCode::try_from_value(&Value::Int64Value(9), &cx()),
        Err(DecodeError::Mismatch { .. })
    ));
}

#[test]
fn sequence_merges_keep_surviving_elements() {
    // A mismatched element retains the first error while its peers decode.
    let mut seq: Vec<i64> = Vec::new();
    let wire = Value::sequence([
        Value::Int64Value(1),
        Value::text("x"),
        Value::Int64Value(3),
    ]);
    let err = seq.merge_value(&wire, &cx()).unwrap_err();
    assert!(matches!(err, DecodeError::Mismatch { .. }));
    assert_eq!(seq, vec![1, 0, 3]);

    // Merging over a longer sequence truncates it.
    let mut seq = vec![9i64, 9, 9, 9];
    seq.merge_value(&Value::sequence([Value::Int64Value(1)]), &cx())
        .unwrap();
    assert_eq!(seq, vec![1]);
}

#[test]
fn arrays_truncate_and_pad() {
    let long = Value::sequence([
        Value::Int64Value(1),
        Value::Int64Value(2),
        Value::Int64Value(3),
    ]);
    let arr: [i64; 2] = Unmarshal::try_from_value(&long, &cx()).unwrap();
    assert_eq!(arr, [1, 2]);

    let mut arr = [9i64; 3];
    arr.merge_value(&Value::sequence([Value::Int64Value(7)]), &cx())
        .unwrap();
    assert_eq!(arr, [7, 0, 0]);
}

#[test]
fn maps_merge_and_convert_keys() {
    let wire = Value::object([("1", Value::text("one")), ("2", Value::text("two"))]);
    let map: HashMap<i64, String> = Unmarshal::try_from_value(&wire, &cx()).unwrap();
    assert_eq!(map[&1], "one");
    assert_eq!(map[&2], "two");

    // Existing entries survive a merge.
    let mut map: HashMap<String, i64> = HashMap::new();
    map.insert("kept".to_string(), 1);
    map.merge_value(&Value::object([("new", Value::Int64Value(2))]), &cx())
        .unwrap();
    assert_eq!(map.len(), 2);

    // A key that does not parse abandons the rest of the object.
    let wire = Value::object([("oops", Value::text("x")), ("3", Value::text("y"))]);
    let mut map: HashMap<i64, String> = HashMap::new();
    let err = map.merge_value(&wire, &cx()).unwrap_err();
    assert!(matches!(err, DecodeError::Mismatch { .. }));
    assert!(map.is_empty());
}

#[test]
fn tag_grammar_splits_name_and_options() {
    assert_eq!(parse_tag("Name"), ("Name", Default::default()));
    let (name, opts) = parse_tag("Name,omitempty");
    assert_eq!(name, "Name");
    assert!(opts.omit_empty && !opts.public);
    let (name, opts) = parse_tag(",omitempty,public");
    assert_eq!(name, "");
    assert!(opts.omit_empty && opts.public);
    // The first position is always the name, even when it spells an option.
    let (name, opts) = parse_tag("omitempty");
    assert_eq!(name, "omitempty");
    assert!(!opts.omit_empty);
    assert_eq!(parse_tag("-,").0, "-");
}

#[test]
fn folding_matches_case_insensitively() {
    assert!(equal_fold("age", "AGE"));
    assert!(equal_fold("K", "k"));
    assert!(equal_fold("\u{212A}", "k"));
    assert!(!equal_fold("age", "ages"));
}

#[derive(Form, Default, Debug, PartialEq)]
struct Tagged {
    #[oscript(tag = "sr")]
    serial: String,
    #[oscript(tag = ",omitempty")]
    optional: i64,
    #[oscript(tag = "omitempty")]
    misnamed: i64,
    #[oscript(tag = "-")]
    skipped: i64,
    #[oscript(tag = "-,")]
    dash: i64,
    _hidden: i64,
    #[oscript(tag = ",public")]
    _exposed: i64,
}

#[test]
fn resolver_applies_tags_and_visibility() {
    let fields = resolved_fields::<Tagged>();
    let names: Vec<&str> = fields.iter().map(|f| f.name).collect();
    assert_eq!(names, ["sr", "optional", "omitempty", "-", "_exposed"]);
    assert!(fields[1].omit_empty);
    assert!(!fields[2].omit_empty);
    assert_eq!(fields[0].index, vec![0]);
    assert_eq!(fields[4].index, vec![6]);
}

#[test]
fn resolution_is_deterministic_and_cached() {
    let first = resolved_fields::<Tagged>();
    let second = resolved_fields::<Tagged>();
    assert_eq!(&*first, &*second);
    assert!(Arc::ptr_eq(&first, &second));
}

#[derive(Form, Default, Debug, PartialEq)]
struct Inner {
    x: i64,
    y: i64,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Shadowing {
    x: i64,
    #[oscript(flatten)]
    inner: Inner,
}

#[test]
fn outer_fields_shadow_promoted_ones() {
    let fields = resolved_fields::<Shadowing>();
    let names: Vec<(&str, &[usize])> = fields
        .iter()
        .map(|f| (f.name, f.index.as_slice()))
        .collect();
    assert_eq!(
        names,
        [("x", &[0usize][..]), ("y", &[1usize, 1][..])]
    );
}

#[derive(Form, Default, Debug, PartialEq)]
struct Six {
    x: i64,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Seven {
    x: i64,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Eight {
    #[oscript(flatten)]
    nine: Inner,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Ambiguous {
    #[oscript(flatten)]
    six: Six,
    #[oscript(flatten)]
    seven: Seven,
    #[oscript(flatten)]
    eight: Eight,
}

#[test]
fn conflicting_promotions_annihilate_and_block_deeper_fields() {
    let fields = resolved_fields::<Ambiguous>();
    let names: Vec<(&str, &[usize])> = fields
        .iter()
        .map(|f| (f.name, f.index.as_slice()))
        .collect();
    // The x in six and seven annihilate, and they also block the deeper
    // x promoted through eight; only y survives.
    assert_eq!(names, [("y", &[2usize, 0, 1][..])]);
}

#[test]
fn annihilated_names_decode_as_unknown() {
    let mut value = Ambiguous::default();
    unmarshal_into(b"A<1,?,'X'= 1,'Y'=2>", &mut value).unwrap();
    assert_eq!(
        value,
        Ambiguous {
            eight: Eight {
                nine: Inner { x: 0, y: 2 }
            },
            ..Default::default()
        }
    );
}

#[derive(Form, Default, Debug, PartialEq)]
struct LevelA {
    #[oscript(tag = "S")]
    s: String,
}

#[derive(Form, Default, Debug, PartialEq)]
struct LevelD {
    #[oscript(tag = "S")]
    xxx: String,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Untagged {
    s: String,
}

#[derive(Form, Default, Debug, PartialEq)]
struct TaggedS {
    #[oscript(tag = "s")]
    xxx: String,
}

#[derive(Form, Default, Debug, PartialEq)]
struct Dominated {
    #[oscript(flatten)]
    plain: Untagged,
    #[oscript(flatten)]
    tagged: TaggedS,
}

#[test]
fn a_tagged_field_dominates_untagged_peers() {
    let fields = resolved_fields::<Dominated>();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "s");
    assert_eq!(fields[0].index, vec![1, 0]);
    assert!(fields[0].tagged);
}

#[test]
fn two_tagged_fields_at_one_depth_annihilate() {
    #[derive(Form, Default, Debug, PartialEq)]
    struct Conflicted {
        #[oscript(flatten)]
        a: LevelA,
        #[oscript(flatten)]
        d: LevelD,
    }
    let fields = resolved_fields::<Conflicted>();
    assert!(fields.is_empty());
}

#[derive(Form, Default, Debug, PartialEq)]
struct WithSdo {
    #[oscript(tag = "world.gopher")]
    sdo: SdoName,
    age: i64,
}

#[test]
fn sdo_fields_become_the_name_pseudo_field() {
    let fields = resolved_fields::<WithSdo>();
    assert_eq!(fields[0].name, "_SDOName");
    assert_eq!(fields[0].sdo_value, Some("world.gopher"));
    assert_eq!(fields[0].index, vec![0]);
    assert_eq!(fields[1].name, "age");
}

#[test]
fn sdo_mismatch_aborts_the_decode() {
    let mut value = WithSdo::default();
    let err = unmarshal_into(b"A<1,?,'Age'=6,'_SDOName'='world.go'>", &mut value).unwrap_err();
    match err {
        DecodeError::UnknownSdoName(got) => assert_eq!(got, "world.go"),
        other => panic!("expected UnknownSdoName, got {:?}", other),
    }
    // Members before the mismatch have already been stored.
    assert_eq!(value.age, 6);
}

#[test]
fn matching_sdo_names_decode() {
    let value: WithSdo = from_slice(b"A<1,?,'_SDOName'='world.gopher','age'=3>").unwrap();
    assert_eq!(value.age, 3);
}

#[derive(Form, Default, Debug, PartialEq)]
struct Pair {
    a: i64,
    b: i64,
}

#[test]
fn the_first_mismatch_latches_while_peers_decode() {
    let mut pair = Pair::default();
    let err = unmarshal_into(b"A<1,?,'a'='x','b'=2>", &mut pair).unwrap_err();
    match err {
        DecodeError::Mismatch { record, field, .. } => {
            assert_eq!(record, Some("Pair"));
            assert_eq!(field, Some("a".to_string()));
        }
        other => panic!("expected Mismatch, got {:?}", other),
    }
    assert_eq!(pair.b, 2);
}

#[test]
fn keys_fall_back_to_case_folding() {
    let pair: Pair = from_slice(b"A<1,?,'A'=1,'B'=2>").unwrap();
    assert_eq!(pair, Pair { a: 1, b: 2 });
}

#[test]
fn unknown_keys_are_skipped_unless_strict() {
    let pair: Pair = from_slice(b"A<1,?,'a'=1,'c'=3>").unwrap();
    assert_eq!(pair, Pair { a: 1, b: 0 });

    let mut pair = Pair::default();
    let err = unmarshal_with(
        b"A<1,?,'a'=1,'c'=3,'b'=2>",
        &mut pair,
        &DecodeContext::strict(),
    )
    .unwrap_err();
    match err {
        DecodeError::UnknownField(key) => assert_eq!(key, "c"),
        other => panic!("expected UnknownField, got {:?}", other),
    }
    assert_eq!(pair, Pair { a: 1, b: 2 });
}

#[test]
fn undefined_members_keep_prior_record_fields() {
    let mut pair = Pair { a: 9, b: 9 };
    unmarshal_into(b"A<1,?,'a'=?,'b'=1>", &mut pair).unwrap();
    assert_eq!(pair, Pair { a: 9, b: 1 });
}

#[derive(Form, Default, Debug, PartialEq)]
struct Optional {
    #[oscript(flatten)]
    inner: Option<Inner>,
    name: String,
}

#[test]
fn optional_embeddings_materialise_on_demand() {
    let fields = resolved_fields::<Optional>();
    let names: Vec<&str> = fields.iter().map(|f| f.name).collect();
    assert_eq!(names, ["x", "y", "name"]);

    let value: Optional = from_slice(b"A<1,?,'name'='n'>").unwrap();
    assert_eq!(value.inner, None);

    let value: Optional = from_slice(b"A<1,?,'x'=1,'name'='n'>").unwrap();
    assert_eq!(value.inner, Some(Inner { x: 1, y: 0 }));
}
