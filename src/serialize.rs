//! Document serializer: live record + compiled mapping → engine document.
//!
//! The serializer walks the compiled mapping, not the record: only mapped
//! fields can appear in the output, and fields absent from the record (or
//! explicitly null) are omitted entirely rather than emitted as null. Arrays
//! are preserved element-wise in order and cardinality — nested-typed arrays
//! in particular stay arrays of objects, never flattened — and reference
//! nodes are delegated to [`crate::refs`].

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::mapping::{Mapping, MappingNode};
use crate::refs::{self, RecordSource};

/// Serialize a record against its compiled mapping.
///
/// Infallible: the result is the engine document, scoped to mapped fields
/// present on the record. A non-object record yields an empty document.
pub fn serialize_record(
    record: &Value,
    mapping: &Mapping,
    records: Option<&dyn RecordSource>,
) -> Value {
    match record {
        Value::Object(obj) => Value::Object(serialize_properties(obj, &mapping.properties, records)),
        _ => Value::Object(Map::new()),
    }
}

pub(crate) fn serialize_properties(
    record: &Map<String, Value>,
    properties: &BTreeMap<String, MappingNode>,
    records: Option<&dyn RecordSource>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, node) in properties {
        let Some(value) = record.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(serialized) = serialize_node(value, node, records) {
            out.insert(name.clone(), serialized);
        }
    }
    out
}

pub(crate) fn serialize_node(
    value: &Value,
    node: &MappingNode,
    records: Option<&dyn RecordSource>,
) -> Option<Value> {
    if node.reference.is_some() {
        return refs::resolve_reference(value, node, records);
    }
    if node.is_leaf() {
        return Some(serialize_leaf(value, node));
    }
    match value {
        Value::Object(obj) => Some(Value::Object(serialize_properties(
            obj,
            &node.properties,
            records,
        ))),
        // Arrays of sub-records map element-wise, order and length preserved.
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => Some(Value::Object(serialize_properties(
                        obj,
                        &node.properties,
                        records,
                    ))),
                    _ => None,
                })
                .collect(),
        )),
        // Shape mismatch (e.g. a raw id against an object shape): omit.
        _ => None,
    }
}

fn serialize_leaf(value: &Value, node: &MappingNode) -> Value {
    if node.es_type.as_deref() == Some("date") {
        return coerce_date(value);
    }
    value.clone()
}

/// Integer epoch-milliseconds become RFC 3339 strings; anything the engine
/// already understands (ISO strings) passes through untouched.
fn coerce_date(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(coerce_date).collect()),
        _ => value.clone(),
    }
}
