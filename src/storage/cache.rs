//! Persistence collaborator interface.
//!
//! The store never persists anything itself. Committed writes are reported to
//! a [`CacheWriter`] supplied by the caller; the calls are fire-and-forget and
//! cannot fail a logical write.

use serde_json::Value;

use crate::storage::calls::Call;
use crate::storage::range::Range;
use crate::storage::record::{FieldValue, Record, RecordPath};
use crate::storage::wire;
use crate::types::DataId;

/// Borrowed value handed to [`CacheWriter::write_field`].
#[derive(Clone, Copy, Debug)]
pub enum CacheValue<'a> {
    /// A record id (written under [`wire::ID_KEY`] on creation).
    Id(&'a str),
    /// An application field value.
    Field(&'a FieldValue),
    /// A client record provenance path.
    Path(&'a RecordPath),
    /// A connection range.
    Range(&'a Range),
    /// Range filter calls.
    FilterCalls(&'a [Call]),
    /// Range force index.
    ForceIndex(i32),
}

impl CacheValue<'_> {
    /// Renders the value in its persisted JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            CacheValue::Id(id) => Value::String((*id).to_owned()),
            CacheValue::Field(value) => wire::field_to_wire(value),
            CacheValue::Path(path) => wire::path_to_wire(path),
            CacheValue::Range(range) => wire::range_to_wire(range),
            CacheValue::FilterCalls(calls) => wire::calls_to_wire(calls),
            CacheValue::ForceIndex(index) => Value::from(*index),
        }
    }
}

/// Receives committed writes for persistence.
pub trait CacheWriter {
    /// A field (application or reserved) of `record_id` changed.
    fn write_field(
        &mut self,
        record_id: &str,
        field_key: &str,
        value: CacheValue<'_>,
        type_name: Option<&str>,
    );

    /// A whole record was replaced; `None` means tombstoned.
    fn write_node(&mut self, record_id: &str, record: Option<&Record>);

    /// A root call was memoized.
    fn write_root_call(&mut self, storage_key: &str, identifying_arg: &str, record_id: &str);
}

/// One call received by a [`CacheLog`].
#[derive(Clone, Debug, PartialEq)]
pub enum CacheWrite {
    /// From [`CacheWriter::write_field`].
    Field {
        /// Record written.
        record_id: DataId,
        /// Application or reserved key.
        field_key: String,
        /// Value in its wire shape.
        value: Value,
        /// Type name of the record, when known.
        type_name: Option<String>,
    },
    /// From [`CacheWriter::write_node`].
    Node {
        /// Record replaced.
        record_id: DataId,
        /// Wire shape of the record; `None` for a tombstone.
        record: Option<Value>,
    },
    /// From [`CacheWriter::write_root_call`].
    RootCall {
        /// Root field storage key.
        storage_key: String,
        /// Identifying argument, empty when absent.
        identifying_arg: String,
        /// Record the call resolves to.
        record_id: DataId,
    },
}

/// In-memory [`CacheWriter`] that records every call in order.
#[derive(Clone, Debug, Default)]
pub struct CacheLog {
    writes: Vec<CacheWrite>,
}

impl CacheLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes received so far.
    pub fn writes(&self) -> &[CacheWrite] {
        &self.writes
    }

    /// Drains the log.
    pub fn take(&mut self) -> Vec<CacheWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Number of writes received.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True when nothing was written.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Latest value written to `field_key` of `record_id`.
    pub fn last_field(&self, record_id: &str, field_key: &str) -> Option<&Value> {
        self.writes.iter().rev().find_map(|write| match write {
            CacheWrite::Field {
                record_id: id,
                field_key: key,
                value,
                ..
            } if id.as_str() == record_id && key == field_key => Some(value),
            _ => None,
        })
    }
}

impl CacheWriter for CacheLog {
    fn write_field(
        &mut self,
        record_id: &str,
        field_key: &str,
        value: CacheValue<'_>,
        type_name: Option<&str>,
    ) {
        self.writes.push(CacheWrite::Field {
            record_id: DataId::from(record_id),
            field_key: field_key.to_owned(),
            value: value.to_json(),
            type_name: type_name.map(str::to_owned),
        });
    }

    fn write_node(&mut self, record_id: &str, record: Option<&Record>) {
        let id = DataId::from(record_id);
        let record = record.map(|record| wire::record_to_wire(&id, record));
        self.writes.push(CacheWrite::Node {
            record_id: id,
            record,
        });
    }

    fn write_root_call(&mut self, storage_key: &str, identifying_arg: &str, record_id: &str) {
        self.writes.push(CacheWrite::RootCall {
            storage_key: storage_key.to_owned(),
            identifying_arg: identifying_arg.to_owned(),
            record_id: DataId::from(record_id),
        });
    }
}
