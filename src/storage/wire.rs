//! JSON rendering of records in their persisted shape.
//!
//! In memory a [`Record`] keeps structural metadata apart from its fields. On
//! the wire both are flattened into one object, with metadata under reserved
//! keys that application fields never use.

use serde_json::{json, Map, Value};

use crate::storage::calls::{Call, CallValue};
use crate::storage::range::{EdgeRef, Range};
use crate::storage::record::{FieldValue, RangeOperation, Record, RecordPath};
use crate::types::DataId;

/// Record identifier.
pub const ID_KEY: &str = "__id";
/// GraphQL type name.
pub const TYPENAME_KEY: &str = "__typename";
/// Provenance path of a client record.
pub const PATH_KEY: &str = "__path";
/// Set of resolved deferred fragments.
pub const RESOLVED_FRAGMENTS_KEY: &str = "__resolved_fragments";
/// Generation counter of the resolved fragment set.
pub const RESOLVED_FRAGMENTS_GENERATION_KEY: &str = "__resolved_fragments_generation";
/// Connection range.
pub const RANGE_KEY: &str = "__range";
/// Filter calls of a connection range.
pub const FILTER_CALLS_KEY: &str = "__filter_calls";
/// Force index of a connection range.
pub const FORCE_INDEX_KEY: &str = "__force_index";
/// Client mutation ids of optimistic writes.
pub const MUTATION_IDS_KEY: &str = "__mutation_ids";
/// Status bitmask.
pub const STATUS_KEY: &str = "__status";

/// Reserved key holding the queue of `op` range updates.
pub fn queued_op_key(op: RangeOperation) -> &'static str {
    match op {
        RangeOperation::Append => "__queued_append",
        RangeOperation::Prepend => "__queued_prepend",
        RangeOperation::Remove => "__queued_remove",
    }
}

/// `{ "__id": id }` reference object.
pub fn link_to_wire(id: &DataId) -> Value {
    json!({ ID_KEY: id.as_str() })
}

/// Renders an application field value.
pub fn field_to_wire(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Scalar(scalar) => scalar.clone(),
        FieldValue::Linked(id) => link_to_wire(id),
        FieldValue::LinkedList(ids) => Value::Array(ids.iter().map(link_to_wire).collect()),
    }
}

fn call_value_to_wire(value: &CallValue) -> Value {
    match value {
        CallValue::Null => Value::Null,
        CallValue::Bool(v) => Value::Bool(*v),
        CallValue::Int(v) => json!(v),
        CallValue::Float(v) => json!(v),
        CallValue::Str(v) => Value::String(v.clone()),
        CallValue::List(values) => Value::Array(values.iter().map(call_value_to_wire).collect()),
    }
}

/// Renders a call list as `[{ "name", "value" }]`.
pub fn calls_to_wire(calls: &[Call]) -> Value {
    Value::Array(
        calls
            .iter()
            .map(|call| json!({ "name": call.name, "value": call_value_to_wire(&call.value) }))
            .collect(),
    )
}

/// Renders an edge as `{ "__id", "cursor", "node": { "__id" } }`.
pub fn edge_to_wire(edge: &EdgeRef) -> Value {
    json!({
        ID_KEY: edge.edge_id.as_str(),
        "cursor": edge.cursor,
        "node": link_to_wire(&edge.node_id),
    })
}

/// Renders every segment of a range.
pub fn range_to_wire(range: &Range) -> Value {
    let segments = range
        .segments()
        .map(|(key, segment)| {
            let page_info = segment.page_info();
            json!({
                "key": key,
                "filter_calls": calls_to_wire(segment.filter_calls()),
                "force_index": segment.force_index(),
                "page_info": {
                    "has_next_page": page_info.has_next_page,
                    "has_previous_page": page_info.has_previous_page,
                },
                "edges": segment.edges().iter().map(edge_to_wire).collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    json!({ "segments": segments })
}

/// Renders a provenance path.
pub fn path_to_wire(path: &RecordPath) -> Value {
    json!({ "root": path.root_id.as_str(), "fields": path.fields })
}

/// Flattens `record` into its persisted shape.
pub fn record_to_wire(id: &DataId, record: &Record) -> Value {
    let mut out = Map::new();
    for (key, value) in record.fields() {
        out.insert(key.to_owned(), field_to_wire(value));
    }
    let meta = record.meta();
    out.insert(ID_KEY.to_owned(), Value::String(id.to_string()));
    if let Some(type_name) = meta.type_name() {
        out.insert(TYPENAME_KEY.to_owned(), Value::String(type_name.to_owned()));
    }
    if let Some(path) = meta.path() {
        out.insert(PATH_KEY.to_owned(), path_to_wire(path));
    }
    if meta.fragment_generation() > 0 {
        let fragments: Map<String, Value> = meta
            .resolved_fragments()
            .iter()
            .map(|fragment| (fragment.clone(), Value::Bool(true)))
            .collect();
        out.insert(RESOLVED_FRAGMENTS_KEY.to_owned(), Value::Object(fragments));
        out.insert(
            RESOLVED_FRAGMENTS_GENERATION_KEY.to_owned(),
            json!(meta.fragment_generation()),
        );
    }
    if let Some(range) = meta.range() {
        out.insert(RANGE_KEY.to_owned(), range_to_wire(range));
    }
    if let Some(calls) = meta.filter_calls() {
        out.insert(FILTER_CALLS_KEY.to_owned(), calls_to_wire(calls));
    }
    if let Some(force_index) = meta.force_index() {
        out.insert(FORCE_INDEX_KEY.to_owned(), json!(force_index));
    }
    if !meta.mutation_ids().is_empty() {
        out.insert(MUTATION_IDS_KEY.to_owned(), json!(meta.mutation_ids()));
    }
    if meta.status().bits() != 0 {
        out.insert(STATUS_KEY.to_owned(), json!(meta.status().bits()));
    }
    for op in [RangeOperation::Append, RangeOperation::Prepend, RangeOperation::Remove] {
        let queued = meta.queued_range_ops().get(op);
        if !queued.is_empty() {
            let ids: Vec<&str> = queued.iter().map(DataId::as_str).collect();
            out.insert(queued_op_key(op).to_owned(), json!(ids));
        }
    }
    Value::Object(out)
}
