use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::storage::calls::Call;
use crate::storage::range::Range;
use crate::types::DataId;

/// Existence of a record slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Never observed; callers should ask the network.
    Unknown,
    /// Known to be deleted; callers should not ask again.
    Nonexistent,
    /// Present with field data.
    Existent,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordState::Unknown => "UNKNOWN",
            RecordState::Nonexistent => "NONEXISTENT",
            RecordState::Existent => "EXISTENT",
        })
    }
}

/// Borrowed view of a record slot.
#[derive(Clone, Copy, Debug)]
pub enum RecordSlot<'a> {
    /// Absent from the store.
    Unknown,
    /// Tombstoned by a delete.
    Tombstoned,
    /// Live record.
    Present(&'a Record),
}

impl RecordSlot<'_> {
    /// Collapses the slot to its [`RecordState`].
    pub fn state(&self) -> RecordState {
        match self {
            RecordSlot::Unknown => RecordState::Unknown,
            RecordSlot::Tombstoned => RecordState::Nonexistent,
            RecordSlot::Present(_) => RecordState::Existent,
        }
    }
}

/// Value stored under an application field key.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Explicit null (also what a cleared field holds).
    Null,
    /// Scalar payload; arrays and objects of scalars are allowed.
    Scalar(serde_json::Value),
    /// Reference to one record.
    Linked(DataId),
    /// Ordered references to records.
    LinkedList(Vec<DataId>),
}

impl FieldValue {
    /// True for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Scalar payload, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// String payload, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(serde_json::Value::as_str)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        if value.is_null() {
            FieldValue::Null
        } else {
            FieldValue::Scalar(value)
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Scalar(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        serde_json::Value::from(value).into()
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Scalar(value.into())
    }
}

/// Bitmask describing speculative state of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecordStatus(u8);

impl RecordStatus {
    /// Touched by an optimistic write.
    pub const OPTIMISTIC: u8 = 0x01;
    /// Touched by a mutation that failed.
    pub const ERROR: u8 = 0x02;

    /// Builds a status from raw bits.
    pub fn from_bits(bits: u8) -> Self {
        RecordStatus(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True when the optimistic bit is set.
    pub fn is_optimistic(self) -> bool {
        self.0 & Self::OPTIMISTIC != 0
    }

    /// True when the error bit is set.
    pub fn has_error(self) -> bool {
        self.0 & Self::ERROR != 0
    }

    /// Returns a copy with the optimistic bit set to `on`.
    pub fn with_optimistic(self, on: bool) -> Self {
        self.with_bit(Self::OPTIMISTIC, on)
    }

    /// Returns a copy with the error bit set to `on`.
    pub fn with_error(self, on: bool) -> Self {
        self.with_bit(Self::ERROR, on)
    }

    fn with_bit(self, bit: u8, on: bool) -> Self {
        if on {
            RecordStatus(self.0 | bit)
        } else {
            RecordStatus(self.0 & !bit)
        }
    }
}

/// Provenance of a client-only record: the root record it hangs off and the
/// field chain walked from there. Used by outer layers to refetch the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPath {
    /// Record the path starts from (a root call result or a refetchable node).
    pub root_id: DataId,
    /// Storage keys walked from the root, outermost first.
    pub fields: Vec<String>,
}

impl RecordPath {
    /// Path pointing at `root_id` itself.
    pub fn new(root_id: impl Into<DataId>) -> Self {
        Self {
            root_id: root_id.into(),
            fields: Vec::new(),
        }
    }

    /// Extends the path by one field.
    pub fn child(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }
}

/// Range mutation requested by a mutation payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOperation {
    /// Insert at the tail.
    Append,
    /// Insert at the head.
    Prepend,
    /// Delete from every segment.
    Remove,
}

impl RangeOperation {
    /// Lowercase operation name.
    pub fn as_str(self) -> &'static str {
        match self {
            RangeOperation::Append => "append",
            RangeOperation::Prepend => "prepend",
            RangeOperation::Remove => "remove",
        }
    }
}

/// Range updates recorded by optimistic writes, one ordered list per operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueuedRangeOps {
    append: Vec<DataId>,
    prepend: Vec<DataId>,
    remove: Vec<DataId>,
}

impl QueuedRangeOps {
    /// Queued edge ids for `op`.
    pub fn get(&self, op: RangeOperation) -> &[DataId] {
        match op {
            RangeOperation::Append => &self.append,
            RangeOperation::Prepend => &self.prepend,
            RangeOperation::Remove => &self.remove,
        }
    }

    /// Queues `edge_id`. Prepends go to the front so that replaying the queue
    /// front-to-back reproduces the prepend order.
    pub(crate) fn push(&mut self, op: RangeOperation, edge_id: DataId) {
        match op {
            RangeOperation::Append => self.append.push(edge_id),
            RangeOperation::Prepend => self.prepend.insert(0, edge_id),
            RangeOperation::Remove => self.remove.push(edge_id),
        }
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.append.is_empty() && self.prepend.is_empty() && self.remove.is_empty()
    }
}

/// Structural metadata kept beside a record's application fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordMeta {
    pub(crate) type_name: Option<String>,
    pub(crate) path: Option<RecordPath>,
    pub(crate) resolved_fragments: BTreeSet<String>,
    pub(crate) fragment_generation: u64,
    pub(crate) range: Option<Range>,
    pub(crate) filter_calls: Option<Vec<Call>>,
    pub(crate) force_index: Option<i32>,
    pub(crate) mutation_ids: SmallVec<[String; 2]>,
    pub(crate) status: RecordStatus,
    pub(crate) queued: QueuedRangeOps,
}

impl RecordMeta {
    /// GraphQL type name, if known.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Provenance path of a client record.
    pub fn path(&self) -> Option<&RecordPath> {
        self.path.as_ref()
    }

    /// Deferred fragments resolved on this record.
    pub fn resolved_fragments(&self) -> &BTreeSet<String> {
        &self.resolved_fragments
    }

    /// Bumped on every change to [`Self::resolved_fragments`].
    pub fn fragment_generation(&self) -> u64 {
        self.fragment_generation
    }

    /// Connection range, when this record is a connection.
    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    /// Filter calls the range was last created with.
    pub fn filter_calls(&self) -> Option<&[Call]> {
        self.filter_calls.as_deref()
    }

    /// Stored range force index.
    pub fn force_index(&self) -> Option<i32> {
        self.force_index
    }

    /// Client mutation ids of optimistic writes that touched the record, in
    /// first-touch order.
    pub fn mutation_ids(&self) -> &[String] {
        &self.mutation_ids
    }

    /// Status bits.
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Range updates queued by optimistic writes.
    pub fn queued_range_ops(&self) -> &QueuedRangeOps {
        &self.queued
    }
}

/// A normalized record: application fields plus structural metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
    meta: RecordMeta,
}

impl Record {
    /// Creates a record of `type_name` without fields.
    pub fn new(type_name: Option<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            meta: RecordMeta {
                type_name,
                ..RecordMeta::default()
            },
        }
    }

    /// Value stored under `key`.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Application fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Structural metadata.
    pub fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    pub(crate) fn set_field(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_owned(), value);
    }

    /// Adds `mutation_id` to the tag list (once) and sets the optimistic bit.
    pub(crate) fn tag_optimistic(&mut self, mutation_id: Option<&str>) {
        if let Some(id) = mutation_id {
            if !self.meta.mutation_ids.iter().any(|existing| existing == id) {
                self.meta.mutation_ids.push(id.to_owned());
            }
        }
        self.meta.status = self.meta.status.with_optimistic(true);
    }
}
