//! Reference resolver: expand foreign keys into embedded sub-documents.
//!
//! Used at serialization time, only for mapping nodes compiled from a
//! reference projection. A populated target object is serialized against the
//! projection's sub-mapping; a raw identifier is looked up through the
//! optional [`RecordSource`] seam; anything unresolved is omitted entirely —
//! absence, not null, not error.
//!
//! There is no cycle or depth guard: projections are static, author-written
//! shapes, so recursion is bounded by the authored depth.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::mapping::MappingNode;
use crate::serialize;

/// Lookup seam for resolving raw reference identifiers against the primary
/// data store.
///
/// Implementations must be `Send + Sync`; resolution happens inside
/// serialization, which may run on any async task.
pub trait RecordSource: Send + Sync {
    /// Fetch one record of `model` by identifier, if it exists.
    fn fetch(&self, model: &str, id: &str) -> Option<Value>;
}

/// Resolve a reference value through its projection mapping.
///
/// Handles a populated object, a raw id (string or number) when a
/// [`RecordSource`] is available and the node knows its target model, or an
/// array of either (resolved element-wise, unresolved elements dropped).
/// Returns `None` when the reference cannot be resolved.
pub fn resolve_reference(
    value: &Value,
    node: &MappingNode,
    records: Option<&dyn RecordSource>,
) -> Option<Value> {
    match value {
        Value::Object(obj) => Some(Value::Object(serialize::serialize_properties(
            obj,
            &node.properties,
            records,
        ))),
        Value::String(id) => resolve_by_id(id, node, records),
        Value::Number(id) => resolve_by_id(&id.to_string(), node, records),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| resolve_reference(item, node, records))
                .collect(),
        )),
        _ => None,
    }
}

fn resolve_by_id(
    id: &str,
    node: &MappingNode,
    records: Option<&dyn RecordSource>,
) -> Option<Value> {
    let target = node.reference.as_deref()?;
    let fetched = records?.fetch(target, id)?;
    match fetched {
        Value::Object(obj) => Some(Value::Object(serialize::serialize_properties(
            &obj,
            &node.properties,
            records,
        ))),
        _ => None,
    }
}

/// In-memory [`RecordSource`] keyed by `(model, id)`, for tests and small
/// deployments.
#[derive(Default)]
pub struct MemoryRecords {
    records: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, model: &str, id: &str, record: Value) {
        self.records
            .write()
            .unwrap()
            .insert((model.to_string(), id.to_string()), record);
    }
}

impl RecordSource for MemoryRecords {
    fn fetch(&self, model: &str, id: &str) -> Option<Value> {
        self.records
            .read()
            .unwrap()
            .get(&(model.to_string(), id.to_string()))
            .cloned()
    }
}
