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

//! Resolution of the serialisable field set of a record type.
//!
//! The derive macro emits a static [`RecordSchema`] per record; this module
//! turns a schema into the ordered list of [`FieldSpec`]s that actually
//! appear on the wire, flattening embedded records breadth first and
//! applying the dominance rules for promoted names. Results are memoised per
//! type in a process-wide cache.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::{describe, mismatch, DecodeContext, ErrorLatch};
use crate::error::{DecodeError, EncodeError};
use crate::model::{Slot, Value};
use crate::write::{EncodeState, Marshal};

/// Static description of a record type, emitted by the derive macro.
pub struct RecordSchema {
    /// The type's name, used in error context.
    pub name: &'static str,
    /// The declared fields, in declaration order.
    pub fields: &'static [FieldDecl],
}

/// Static description of one declared field.
pub struct FieldDecl {
    /// The field identifier.
    pub name: &'static str,
    /// The raw `oscript` tag, if the field carries one.
    pub tag: Option<&'static str>,
    /// Whether the field is an embedded record whose members are promoted.
    pub flatten: bool,
    /// Whether the field is the record's [`SdoName`](crate::SdoName) marker.
    pub sdo: bool,
    /// The schema of the field's record type, for embedded records.
    pub schema: Option<fn() -> &'static RecordSchema>,
}

/// Record types whose fields can be addressed uniformly. Implemented by the
/// derive macro; the index paths handed to `get_field` and `put_field` come
/// from the resolver and step through flattened embeddings level by level.
pub trait RecordForm: 'static {
    fn schema() -> &'static RecordSchema;

    /// Borrow the field at `path`, or `None` when an absent embedding makes
    /// it unreachable.
    fn get_field(&self, path: &[usize]) -> Option<&dyn Marshal>;

    /// Merge `value` into the field at `path`, materialising absent
    /// embeddings along the way.
    fn put_field(
        &mut self,
        path: &[usize],
        value: &Value,
        cx: &DecodeContext,
    ) -> Result<(), DecodeError>;
}

/// One resolved, wire-visible field of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// The wire key.
    pub name: &'static str,
    /// Indices through the declaration levels to the backing field.
    pub index: Vec<usize>,
    /// The field participates in empty-value elision.
    pub omit_empty: bool,
    /// The name came from a tag rather than the identifier.
    pub tagged: bool,
    /// For the `_SDOName` pseudo-field, the declared SDO tag.
    pub sdo_value: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TagOptions {
    pub omit_empty: bool,
    pub public: bool,
}

/// Split a tag of the form `name,opt,opt` into the name and its options.
pub(crate) fn parse_tag(tag: &'static str) -> (&'static str, TagOptions) {
    let (name, rest) = match tag.find(',') {
        Some(comma) => (&tag[..comma], &tag[comma + 1..]),
        None => (tag, ""),
    };
    let mut options = TagOptions::default();
    for option in rest.split(',') {
        match option {
            "omitempty" => options.omit_empty = true,
            "public" => options.public = true,
            _ => {}
        }
    }
    (name, options)
}

/// Backslash and quote characters are reserved; any other punctuation is
/// allowed in a tag name.
fn is_valid_tag(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| "!#$%&()*+-./:<=>?@[]^_{|}~ ".contains(c) || c.is_alphanumeric())
}

/// Case-insensitive comparison by Unicode simple folding, the fallback used
/// for wire keys that do not match a field byte for byte.
pub(crate) fn equal_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

type SchemaId = *const RecordSchema;

/// Compute the wire-visible fields of a record type. The walk is breadth
/// first over the tree of flattened embeddings: the top schema first, then
/// any embedded records it promotes, so that shallower declarations win.
fn type_fields(root: &'static RecordSchema) -> Vec<FieldSpec> {
    struct Embedded {
        schema: &'static RecordSchema,
        index: Vec<usize>,
    }

    let mut current: Vec<Embedded> = Vec::new();
    let mut next: Vec<Embedded> = vec![Embedded {
        schema: root,
        index: Vec::new(),
    }];

    // How many times each schema is queued at the current and next level;
    // a schema queued twice contributes duplicate fields so the dominance
    // pass sees the conflict.
    let mut count: HashMap<SchemaId, usize>;
    let mut next_count: HashMap<SchemaId, usize> = HashMap::new();

    let mut visited: HashSet<SchemaId> = HashSet::new();
    let mut fields: Vec<FieldSpec> = Vec::new();

    while !next.is_empty() {
        std::mem::swap(&mut current, &mut next);
        next.clear();
        count = std::mem::take(&mut next_count);

        for embedded in &current {
            let id: SchemaId = embedded.schema;
            if !visited.insert(id) {
                continue;
            }

            for (i, decl) in embedded.schema.fields.iter().enumerate() {
                let tag = decl.tag.unwrap_or("");
                if tag == "-" {
                    continue;
                }
                let (mut name, options) = parse_tag(tag);

                let hidden = decl.name.starts_with('_');
                if !decl.flatten && hidden && !options.public {
                    continue;
                }
                if !is_valid_tag(name) {
                    name = "";
                }

                let mut index = embedded.index.clone();
                index.push(i);

                let promoted = if decl.flatten && name.is_empty() {
                    decl.schema
                } else {
                    None
                };
                match promoted {
                    None => {
                        let tagged = !name.is_empty();
                        let final_name = if tagged { name } else { decl.name };
                        let spec = if decl.sdo {
                            FieldSpec {
                                name: "_SDOName",
                                index,
                                omit_empty: options.omit_empty,
                                tagged,
                                sdo_value: Some(final_name),
                            }
                        } else {
                            FieldSpec {
                                name: final_name,
                                index,
                                omit_empty: options.omit_empty,
                                tagged,
                                sdo_value: None,
                            }
                        };
                        fields.push(spec);
                        if count.get(&id).copied().unwrap_or(0) > 1 {
                            // A second copy is enough; the dominance pass
                            // only distinguishes one candidate from many.
                            if let Some(last) = fields.last() {
                                let duplicate = last.clone();
                                fields.push(duplicate);
                            }
                        }
                    }
                    Some(schema_fn) => {
                        let sub = schema_fn();
                        let sub_id: SchemaId = sub;
                        let queued = next_count.entry(sub_id).or_insert(0);
                        *queued += 1;
                        if *queued == 1 {
                            next.push(Embedded { schema: sub, index });
                        }
                    }
                }
            }
        }
    }

    fields.sort_by(|a, b| {
        a.name
            .cmp(b.name)
            .then_with(|| a.index.len().cmp(&b.index.len()))
            .then_with(|| b.tagged.cmp(&a.tagged))
            .then_with(|| a.index.cmp(&b.index))
    });

    // Keep one dominant field per name; names with no dominant candidate
    // are annihilated without error.
    let mut out: Vec<FieldSpec> = Vec::with_capacity(fields.len());
    let mut i = 0;
    while i < fields.len() {
        let mut advance = 1;
        while i + advance < fields.len() && fields[i + advance].name == fields[i].name {
            advance += 1;
        }
        if advance == 1 {
            out.push(fields[i].clone());
        } else if let Some(dominant) = dominant_field(&fields[i..i + advance]) {
            out.push(dominant.clone());
        }
        i += advance;
    }

    out.sort_by(|a, b| a.index.cmp(&b.index));
    out
}

/// Pick the single field that dominates a group sharing one name, or `None`
/// when the group annihilates. Candidates arrive sorted with the shortest
/// index paths first; a unique tagged candidate at the shallowest depth
/// wins, several tagged candidates (or several untagged survivors) lose the
/// name entirely.
fn dominant_field(group: &[FieldSpec]) -> Option<&FieldSpec> {
    let depth = group[0].index.len();
    let mut tagged: Option<usize> = None;
    let mut end = group.len();
    for (i, spec) in group.iter().enumerate() {
        if spec.index.len() > depth {
            end = i;
            break;
        }
        if spec.tagged {
            if tagged.is_some() {
                return None;
            }
            tagged = Some(i);
        }
    }
    let group = &group[..end];
    if let Some(winner) = tagged {
        return Some(&group[winner]);
    }
    if group.len() > 1 {
        return None;
    }
    Some(&group[0])
}

type FieldCache = RwLock<HashMap<TypeId, Arc<[FieldSpec]>>>;

static FIELD_CACHE: OnceLock<FieldCache> = OnceLock::new();

/// The resolved fields of `T`, computed once per process. Readers share the
/// installed slice without coordination; racing writers compute identical
/// values and the first install wins.
pub fn resolved_fields<T: RecordForm>() -> Arc<[FieldSpec]> {
    let cache = FIELD_CACHE.get_or_init(Default::default);
    if let Some(fields) = cache.read().get(&TypeId::of::<T>()) {
        return fields.clone();
    }
    let computed: Arc<[FieldSpec]> = type_fields(T::schema()).into();
    let mut guard = cache.write();
    guard
        .entry(TypeId::of::<T>())
        .or_insert(computed)
        .clone()
}

/// Write a record as an object, fields in resolver order.
pub fn write_record<T: RecordForm>(record: &T, out: &mut EncodeState) -> Result<(), EncodeError> {
    let fields = resolved_fields::<T>();
    out.push_str("A<1,?");
    for spec in fields.iter() {
        if let Some(tag) = spec.sdo_value {
            out.push_byte(b',');
            out.write_string_value(spec.name);
            out.push_byte(b'=');
            out.write_string_value(tag);
            continue;
        }
        // An absent embedding along the path drops the field.
        let Some(field) = record.get_field(&spec.index) else {
            continue;
        };
        if spec.omit_empty && field.is_empty() {
            continue;
        }
        out.push_byte(b',');
        out.write_string_value(spec.name);
        out.push_byte(b'=');
        field.write_oscript(out)?;
    }
    out.push_byte(b'>');
    Ok(())
}

/// Merge an object into a record. Wire keys match resolved fields byte for
/// byte first, then by case folding; unknown keys are skipped, or latched as
/// errors in strict mode. The first type mismatch is retained while the
/// remaining members continue to decode.
pub fn merge_record<T: RecordForm>(
    record: &mut T,
    value: &Value,
    cx: &DecodeContext,
) -> Result<(), DecodeError> {
    let items = match value {
        Value::Object(items) => items,
        Value::Undefined => return Ok(()),
        other => return Err(mismatch::<T>(other)),
    };
    let schema = T::schema();
    let fields = resolved_fields::<T>();
    let mut latch = ErrorLatch::default();
    for Slot { key, value } in items {
        let mut found: Option<&FieldSpec> = None;
        for spec in fields.iter() {
            if spec.name == key.as_str() {
                found = Some(spec);
                break;
            }
            if found.is_none() && equal_fold(spec.name, key) {
                found = Some(spec);
            }
        }
        match found {
            Some(spec) => {
                if let Some(tag) = spec.sdo_value {
                    match value {
                        Value::Text(got) if got == tag => {}
                        Value::Text(got) => {
                            return Err(DecodeError::UnknownSdoName(got.clone()));
                        }
                        other => {
                            return Err(DecodeError::UnknownSdoName(describe(other)));
                        }
                    }
                    continue;
                }
                if let Err(err) = record.put_field(&spec.index, value, cx) {
                    latch.note(err.with_record_context(schema.name, spec.name))?;
                }
            }
            None if cx.strict => {
                latch.note(DecodeError::UnknownField(key.clone()))?;
            }
            None => {}
        }
    }
    latch.finish()
}
