use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::storage::calls::{split_calls, Call};
use crate::storage::metrics::{default_metrics, StoreMetrics};
use crate::storage::node_index::NodeConnectionIndex;
use crate::storage::options::StoreOptions;
use crate::storage::range::{EdgeRef, PageInfo, Range, RangeChange, RangeInfo};
use crate::storage::record::{
    FieldValue, QueuedRangeOps, RangeOperation, Record, RecordPath, RecordSlot, RecordState,
    RecordStatus,
};
use crate::storage::root_calls::RootCallMap;
use crate::storage::wire;
use crate::types::{DataId, Result, StoreError};

static NULL_FIELD: FieldValue = FieldValue::Null;

/// Edge record field holding the opaque cursor.
pub const EDGE_CURSOR_FIELD: &str = "cursor";
/// Edge record field linking the node.
pub const EDGE_NODE_FIELD: &str = "node";

/// Page of a connection range resolved against a set of calls.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeMetadata {
    /// Calls that selected the segment.
    pub filter_calls: Vec<Call>,
    /// Edges of the requested page, in range order.
    pub requested_edges: Vec<EdgeRef>,
    /// Continuation flags of the requested page.
    pub page_info: PageInfo,
}

impl RangeMetadata {
    /// Edge ids of the requested page.
    pub fn requested_edge_ids(&self) -> Vec<DataId> {
        self.requested_edges
            .iter()
            .map(|edge| edge.edge_id.clone())
            .collect()
    }
}

/// Normalized record store.
///
/// Owns the record map, the root-call memo and the node-to-connection reverse
/// index. Every id is in one of three states: unknown (no slot), tombstoned (a
/// slot holding `None`), or present. Reads live here; writes go through a
/// [`super::RecordWriter`] bound to a mode.
#[derive(Clone)]
pub struct RecordStore {
    records: FxHashMap<DataId, Option<Record>>,
    root_calls: RootCallMap,
    node_index: NodeConnectionIndex,
    next_client_id: u64,
    options: StoreOptions,
    metrics: Arc<dyn StoreMetrics>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl RecordStore {
    /// Creates an empty store.
    pub fn new(options: StoreOptions) -> Self {
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        Self {
            records: FxHashMap::default(),
            root_calls: RootCallMap::new(),
            node_index: NodeConnectionIndex::new(),
            next_client_id: 0,
            options,
            metrics,
        }
    }

    /// Options the store was created with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of known ids, tombstones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no id is known.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Root-call memo.
    pub fn root_calls(&self) -> &RootCallMap {
        &self.root_calls
    }

    /// Node-to-connection reverse index.
    pub fn node_index(&self) -> &NodeConnectionIndex {
        &self.node_index
    }

    /// Slot of `id`.
    pub fn record_slot(&self, id: &str) -> RecordSlot<'_> {
        match self.records.get(id) {
            None => RecordSlot::Unknown,
            Some(None) => RecordSlot::Tombstoned,
            Some(Some(record)) => RecordSlot::Present(record),
        }
    }

    /// Existence state of `id`.
    pub fn get_record_state(&self, id: &str) -> RecordState {
        self.record_slot(id).state()
    }

    /// The live record for `id`, if present.
    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.get(id).and_then(Option::as_ref)
    }

    /// True when `storage_key` names a node root call.
    pub fn is_node_root_call(&self, storage_key: &str) -> bool {
        self.options
            .node_root_calls
            .iter()
            .any(|call| call == storage_key)
    }

    /// Resolves a root call to a record id.
    ///
    /// Node root calls resolve to their identifying argument without consulting
    /// the memo, and fail when the argument is absent.
    pub fn get_data_id(&self, storage_key: &str, identifying_arg: Option<&str>) -> Result<Option<DataId>> {
        if self.is_node_root_call(storage_key) {
            return match identifying_arg {
                Some(arg) => Ok(Some(DataId::from(arg))),
                None => Err(StoreError::RootCallArgumentMissing {
                    storage_key: storage_key.to_owned(),
                }),
            };
        }
        Ok(self.root_calls.get(storage_key, identifying_arg).cloned())
    }

    /// True when `id` carries the client id prefix.
    pub fn is_client_id(&self, id: &str) -> bool {
        id.starts_with(self.options.client_id_prefix.as_str())
    }

    /// Mints a client id unused by any known record.
    pub fn generate_client_id(&mut self) -> DataId {
        loop {
            self.next_client_id += 1;
            let id = DataId::new(format!(
                "{}{}",
                self.options.client_id_prefix, self.next_client_id
            ));
            if !self.records.contains_key(id.as_str()) {
                trace!(id = %id, "store.generate_client_id");
                return id;
            }
        }
    }

    /// Type name of a present record.
    pub fn get_type(&self, id: &str) -> Option<&str> {
        self.record(id)?.meta().type_name()
    }

    /// Provenance path of a present client record.
    pub fn get_path_to_record(&self, id: &str) -> Option<&RecordPath> {
        self.record(id)?.meta().path()
    }

    /// Value of `key` on `id`.
    ///
    /// Returns `None` for an unknown record or an unfetched field, and
    /// [`FieldValue::Null`] for every field of a tombstoned record.
    pub fn get_field(&self, id: &str, key: &str) -> Option<&FieldValue> {
        match self.records.get(id)? {
            None => Some(&NULL_FIELD),
            Some(record) => record.field(key),
        }
    }

    /// Id linked from `key` on `id`.
    ///
    /// `None` covers unknown records, unfetched fields and null links; use
    /// [`Self::get_field`] to tell those apart.
    pub fn get_linked_record_id(&self, id: &str, key: &str) -> Result<Option<&DataId>> {
        match self.get_field(id, key) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Linked(linked)) => Ok(Some(linked)),
            Some(_) => Err(StoreError::MalformedField {
                id: DataId::from(id),
                field: key.to_owned(),
                expected: "a linked record",
            }),
        }
    }

    /// Ids linked from the plural field `key` on `id`.
    pub fn get_linked_record_ids(&self, id: &str, key: &str) -> Result<Option<&[DataId]>> {
        match self.get_field(id, key) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::LinkedList(linked)) => Ok(Some(linked.as_slice())),
            Some(_) => Err(StoreError::MalformedField {
                id: DataId::from(id),
                field: key.to_owned(),
                expected: "an array of linked records",
            }),
        }
    }

    /// Force index of the range on `id`: `-1` when tombstoned, `0` when unset.
    pub fn get_range_force_index(&self, id: &str) -> i32 {
        match self.records.get(id) {
            Some(None) => -1,
            Some(Some(record)) => record.meta().force_index().unwrap_or(0),
            None => 0,
        }
    }

    /// Filter calls of the range on `id`.
    pub fn get_range_filter_calls(&self, id: &str) -> Option<&[Call]> {
        self.record(id)?.meta().filter_calls()
    }

    /// True when `id` holds a range.
    pub fn has_range(&self, id: &str) -> bool {
        self.get_range(id).is_some()
    }

    /// Range held by `id`.
    pub fn get_range(&self, id: &str) -> Option<&Range> {
        self.record(id)?.meta().range()
    }

    /// Resolves `calls` against the range on `connection_id`.
    ///
    /// Returns `None` when the connection holds no range or no segment exists
    /// for the filter calls. Segments are created by `put_range` and by merged
    /// pages; a dropped page creates none.
    pub fn get_range_metadata(&self, connection_id: &str, calls: &[Call]) -> Option<RangeMetadata> {
        let range = self.get_range(connection_id)?;
        let split = split_calls(calls, &self.options.pagination_calls);
        let RangeInfo {
            requested_edges,
            page_info,
        } = range.retrieve(&split.filter, &split.pagination)?;
        Some(RangeMetadata {
            filter_calls: split.filter,
            requested_edges,
            page_info,
        })
    }

    /// True when `fragment` was resolved on `id`.
    pub fn has_deferred_fragment_data(&self, id: &str, fragment: &str) -> bool {
        self.record(id)
            .is_some_and(|record| record.meta().resolved_fragments().contains(fragment))
    }

    /// Connections whose committed range contains `node_id`.
    pub fn get_connection_ids_for_record(&self, node_id: &str) -> Option<&BTreeSet<DataId>> {
        self.node_index.connections(node_id)
    }

    /// Client mutation ids that optimistically touched `id`.
    pub fn get_client_mutation_ids(&self, id: &str) -> Option<&[String]> {
        let ids = self.record(id)?.meta().mutation_ids();
        (!ids.is_empty()).then_some(ids)
    }

    /// True when `id` was written by an optimistic writer.
    pub fn has_optimistic_update(&self, id: &str) -> bool {
        self.get_status(id).is_some_and(RecordStatus::is_optimistic)
    }

    /// Status flags of `id`.
    pub fn get_status(&self, id: &str) -> Option<RecordStatus> {
        self.record(id).map(|record| record.meta().status())
    }

    /// Range updates queued on `id` by optimistic writes.
    pub fn get_queued_range_ops(&self, id: &str) -> Option<&QueuedRangeOps> {
        let queued = self.record(id)?.meta().queued_range_ops();
        (!queued.is_empty()).then_some(queued)
    }

    /// Renders the whole store in its persisted shape.
    ///
    /// Tombstones render as `null`. Keys are sorted, so two stores with the
    /// same content produce equal snapshots.
    pub fn to_wire_snapshot(&self) -> Value {
        let records: Map<String, Value> = self
            .records
            .iter()
            .map(|(id, slot)| {
                let value = slot
                    .as_ref()
                    .map_or(Value::Null, |record| wire::record_to_wire(id, record));
                (id.to_string(), value)
            })
            .collect();
        let mut root_calls = Map::new();
        for (key, arg, id) in self.root_calls.iter() {
            let entry = root_calls
                .entry(key.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(args) = entry {
                args.insert(arg.to_owned(), Value::String(id.to_string()));
            }
        }
        let mut out = Map::new();
        out.insert("records".to_owned(), Value::Object(records));
        out.insert("root_calls".to_owned(), Value::Object(root_calls));
        Value::Object(out)
    }

    pub(crate) fn metrics(&self) -> &dyn StoreMetrics {
        self.metrics.as_ref()
    }

    pub(crate) fn record_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id).and_then(Option::as_mut)
    }

    pub(crate) fn insert_record(&mut self, id: DataId, record: Record) {
        self.records.insert(id, Some(record));
    }

    /// Tombstones `id`, returning the record it held.
    pub(crate) fn tombstone(&mut self, id: &str) -> Option<Record> {
        self.records.insert(DataId::from(id), None).flatten()
    }

    /// Drops `id` from the reverse index, both as a node and as a connection.
    pub(crate) fn purge_from_index(&mut self, id: &str, removed: Option<&Record>) {
        self.node_index.remove_node(id);
        if let Some(range) = removed.and_then(|record| record.meta().range()) {
            self.node_index.remove_connection(id, &range.node_ids());
        }
    }

    pub(crate) fn root_calls_mut(&mut self) -> &mut RootCallMap {
        &mut self.root_calls
    }

    /// The live record for `id`; an unknown or tombstoned id gets a bare record.
    /// The flag is true when the record was created.
    pub(crate) fn record_or_insert(&mut self, id: &str) -> (&mut Record, bool) {
        let slot = self.records.entry(DataId::from(id)).or_insert(None);
        let created = slot.is_none();
        (slot.get_or_insert_with(|| Record::new(None)), created)
    }

    /// Reads the cursor and node link off the edge record `edge_id`.
    pub(crate) fn edge_ref(&self, edge_id: &str) -> Result<EdgeRef> {
        let record = self.record(edge_id).ok_or_else(|| StoreError::RecordMissing {
            id: DataId::from(edge_id),
            op: "reading it as an edge",
        })?;
        let cursor = record
            .field(EDGE_CURSOR_FIELD)
            .and_then(FieldValue::as_str)
            .ok_or_else(|| StoreError::MalformedEdge {
                id: DataId::from(edge_id),
                reason: "missing cursor",
            })?;
        let node_id = match record.field(EDGE_NODE_FIELD) {
            Some(FieldValue::Linked(node_id)) => node_id.clone(),
            _ => {
                return Err(StoreError::MalformedEdge {
                    id: DataId::from(edge_id),
                    reason: "missing node link",
                })
            }
        };
        Ok(EdgeRef::new(edge_id, cursor, node_id))
    }

    /// Merges a fetched page into the range on `connection_id` and updates
    /// the reverse index.
    pub(crate) fn merge_range_page(
        &mut self,
        connection_id: &str,
        calls: &[Call],
        page_info: PageInfo,
        edges: &[EdgeRef],
    ) -> Result<RangeChange> {
        let split = split_calls(calls, &self.options.pagination_calls);
        let target = range_target(&mut self.records, connection_id, "writing range edges")?;
        let change = target.range.add_items(
            &split.filter,
            &split.pagination,
            edges,
            page_info,
            target.force_index,
        );
        reindex(&mut self.node_index, connection_id, target.range, &change);
        Ok(change)
    }

    /// Applies one committed range update to `connection_id` and updates the
    /// reverse index.
    pub(crate) fn apply_range_op(
        &mut self,
        connection_id: &str,
        edge_id: &str,
        op: RangeOperation,
    ) -> Result<RangeChange> {
        let edge = match op {
            RangeOperation::Remove => None,
            RangeOperation::Append | RangeOperation::Prepend => Some(self.edge_ref(edge_id)?),
        };
        let target = range_target(&mut self.records, connection_id, "applying a range update")?;
        let change = match edge {
            None => target.range.remove_edge(&DataId::from(edge_id)),
            Some(edge) if op == RangeOperation::Append => {
                target
                    .range
                    .append_edge(target.filter_calls, edge, target.force_index)
            }
            Some(edge) => target
                .range
                .prepend_edge(target.filter_calls, edge, target.force_index),
        };
        reindex(&mut self.node_index, connection_id, target.range, &change);
        Ok(change)
    }
}

struct RangeTarget<'a> {
    range: &'a mut Range,
    filter_calls: &'a [Call],
    force_index: i32,
}

fn range_target<'a>(
    records: &'a mut FxHashMap<DataId, Option<Record>>,
    connection_id: &str,
    op: &'static str,
) -> Result<RangeTarget<'a>> {
    let record = records
        .get_mut(connection_id)
        .and_then(Option::as_mut)
        .ok_or_else(|| StoreError::RecordMissing {
            id: DataId::from(connection_id),
            op,
        })?;
    let meta = record.meta_mut();
    let force_index = meta.force_index.unwrap_or(0);
    let filter_calls = meta.filter_calls.as_deref().unwrap_or(&[]);
    let range = meta.range.as_mut().ok_or_else(|| StoreError::RangeMissing {
        id: DataId::from(connection_id),
    })?;
    Ok(RangeTarget {
        range,
        filter_calls,
        force_index,
    })
}

/// Evicted edges leave the index only when no other edge of the range still
/// points at their node.
fn reindex(index: &mut NodeConnectionIndex, connection_id: &str, range: &Range, change: &RangeChange) {
    let connection = DataId::from(connection_id);
    for edge in &change.evicted {
        if !range.contains_node(&edge.node_id) {
            index.remove(&edge.node_id, &connection);
        }
    }
    for edge in &change.inserted {
        index.add(&edge.node_id, &connection);
    }
}
