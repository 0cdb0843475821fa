use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::storage::cache::{CacheValue, CacheWriter};
use crate::storage::calls::{filter_calls, Call};
use crate::storage::range::{PageInfo, Range};
use crate::storage::record::{FieldValue, RangeOperation, Record, RecordPath, RecordState};
use crate::storage::store::RecordStore;
use crate::storage::wire::{FILTER_CALLS_KEY, FORCE_INDEX_KEY, ID_KEY, PATH_KEY, RANGE_KEY};
use crate::types::{DataId, Result, StoreError};

mod mode;

pub use mode::{Committed, Optimistic, WriteMode};

/// Writer for server-confirmed data.
pub type CommittedWriter<'s, 'c> = RecordWriter<'s, Committed<'c>>;

/// Writer for one optimistic mutation.
pub type OptimisticWriter<'s> = RecordWriter<'s, Optimistic>;

fn missing(id: &str, op: &'static str) -> StoreError {
    StoreError::RecordMissing {
        id: DataId::from(id),
        op,
    }
}

/// Mutation interface over a [`RecordStore`].
///
/// All normalized writes go through a writer. The mode parameter fixes whether
/// writes are committed or optimistic for the writer's whole lifetime. Every
/// operation checks its preconditions before touching the store, so a failed
/// call leaves the store unchanged.
pub struct RecordWriter<'s, M: WriteMode> {
    store: &'s mut RecordStore,
    mode: M,
}

impl<'s, 'c> RecordWriter<'s, Committed<'c>> {
    /// Creates a committed writer reporting to `cache`.
    pub fn committed(store: &'s mut RecordStore, cache: Option<&'c mut dyn CacheWriter>) -> Self {
        Self::with_mode(store, Committed::new(cache))
    }
}

impl<'s> RecordWriter<'s, Optimistic> {
    /// Creates an optimistic writer for `client_mutation_id`.
    pub fn optimistic(store: &'s mut RecordStore, client_mutation_id: Option<String>) -> Self {
        Self::with_mode(store, Optimistic::new(client_mutation_id))
    }

    /// Mutation id tagged onto touched records.
    pub fn client_mutation_id(&self) -> Option<&str> {
        self.mode.client_mutation_id()
    }
}

impl<'s, M: WriteMode> RecordWriter<'s, M> {
    /// Creates a writer over `store` in `mode`.
    pub fn with_mode(store: &'s mut RecordStore, mode: M) -> Self {
        Self { store, mode }
    }

    /// The underlying store, for reads not forwarded by the writer.
    pub fn store(&self) -> &RecordStore {
        self.store
    }

    /// True for optimistic writers.
    pub fn is_optimistic(&self) -> bool {
        self.mode.is_optimistic()
    }

    /// See [`RecordStore::get_data_id`].
    pub fn get_data_id(&self, storage_key: &str, identifying_arg: Option<&str>) -> Result<Option<DataId>> {
        self.store.get_data_id(storage_key, identifying_arg)
    }

    /// See [`RecordStore::get_record_state`].
    pub fn get_record_state(&self, id: &str) -> RecordState {
        self.store.get_record_state(id)
    }

    /// See [`RecordStore::get_field`].
    pub fn get_field(&self, id: &str, key: &str) -> Option<&FieldValue> {
        self.store.get_field(id, key)
    }

    /// See [`RecordStore::get_linked_record_id`].
    pub fn get_linked_record_id(&self, id: &str, key: &str) -> Result<Option<&DataId>> {
        self.store.get_linked_record_id(id, key)
    }

    /// See [`RecordStore::get_linked_record_ids`].
    pub fn get_linked_record_ids(&self, id: &str, key: &str) -> Result<Option<&[DataId]>> {
        self.store.get_linked_record_ids(id, key)
    }

    /// See [`RecordStore::get_range_force_index`].
    pub fn get_range_force_index(&self, id: &str) -> i32 {
        self.store.get_range_force_index(id)
    }

    /// See [`RecordStore::get_range_filter_calls`].
    pub fn get_range_filter_calls(&self, id: &str) -> Option<&[Call]> {
        self.store.get_range_filter_calls(id)
    }

    /// See [`RecordStore::has_range`].
    pub fn has_range(&self, id: &str) -> bool {
        self.store.has_range(id)
    }

    /// See [`RecordStore::has_deferred_fragment_data`].
    pub fn has_deferred_fragment_data(&self, id: &str, fragment: &str) -> bool {
        self.store.has_deferred_fragment_data(id, fragment)
    }

    /// Memoizes the root call `storage_key(identifying_arg)` as `id`.
    ///
    /// Node root calls are never memoized; they only require the argument.
    pub fn put_data_id(
        &mut self,
        storage_key: &str,
        identifying_arg: Option<&str>,
        id: impl Into<DataId>,
    ) -> Result<()> {
        if self.store.is_node_root_call(storage_key) {
            return match identifying_arg {
                Some(_) => Ok(()),
                None => Err(StoreError::RootCallArgumentMissing {
                    storage_key: storage_key.to_owned(),
                }),
            };
        }
        let id = id.into();
        self.mode.notify(|cache| {
            cache.write_root_call(storage_key, identifying_arg.unwrap_or(""), &id)
        });
        trace!(storage_key, identifying_arg, id = %id, "writer.put_data_id");
        self.store.root_calls_mut().put(storage_key, identifying_arg, id);
        Ok(())
    }

    /// Creates `id` with `type_name`.
    ///
    /// A no-op when the record already exists. A tombstoned id is brought back
    /// as a fresh record. Client ids require `path`; other ids ignore it.
    pub fn put_record(&mut self, id: &str, type_name: Option<&str>, path: Option<RecordPath>) -> Result<()> {
        if self.store.get_record_state(id) == RecordState::Existent {
            return Ok(());
        }
        let is_client = self.store.is_client_id(id);
        if is_client && path.is_none() {
            return Err(StoreError::ClientRecordPathMissing {
                id: DataId::from(id),
            });
        }
        let mut record = Record::new(type_name.map(str::to_owned));
        if is_client {
            record.meta_mut().path = path;
        }
        self.mode.tag(&mut record);
        self.mode.notify(|cache| {
            cache.write_field(id, ID_KEY, CacheValue::Id(id), type_name);
            if let Some(path) = record.meta().path() {
                cache.write_field(id, PATH_KEY, CacheValue::Path(path), type_name);
            }
        });
        debug!(id, type_name, optimistic = self.mode.is_optimistic(), "writer.put_record");
        self.store.insert_record(DataId::from(id), record);
        self.store.metrics().record_created();
        Ok(())
    }

    /// Writes a scalar field (or an explicit null) on an existing record.
    ///
    /// Links are refused; they go through [`Self::put_linked_record_id`] and
    /// [`Self::put_linked_record_ids`], which check that their targets exist.
    pub fn put_field(&mut self, id: &str, key: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        if matches!(value, FieldValue::Linked(_) | FieldValue::LinkedList(_)) {
            return Err(StoreError::MalformedField {
                id: DataId::from(id),
                field: key.to_owned(),
                expected: "a scalar value",
            });
        }
        self.write_field(id, key, value, "writing a field")
    }

    /// Clears `key` to null. The field remains known.
    pub fn delete_field(&mut self, id: &str, key: &str) -> Result<()> {
        self.write_field(id, key, FieldValue::Null, "deleting a field")
    }

    /// Links `key` on `parent` to the existing record `id`.
    pub fn put_linked_record_id(&mut self, parent: &str, key: &str, id: &str) -> Result<()> {
        self.ensure_present(parent, "writing a linked field")?;
        self.ensure_linked(parent, key, std::iter::once(id))?;
        self.write_field(
            parent,
            key,
            FieldValue::Linked(DataId::from(id)),
            "writing a linked field",
        )
    }

    /// Links the plural `key` on `parent` to the existing records `ids`, in order.
    pub fn put_linked_record_ids(&mut self, parent: &str, key: &str, ids: Vec<DataId>) -> Result<()> {
        self.ensure_present(parent, "writing a linked field")?;
        self.ensure_linked(parent, key, ids.iter().map(DataId::as_str))?;
        self.write_field(
            parent,
            key,
            FieldValue::LinkedList(ids),
            "writing a linked field",
        )
    }

    /// Makes `id` a connection with a range.
    ///
    /// `calls` are stripped of pagination calls to form the filter calls. An
    /// existing range keeps its segments; the force index only rises.
    pub fn put_range(&mut self, id: &str, calls: &[Call], force_index: Option<i32>) -> Result<()> {
        self.mode.check_range_write(id)?;
        let filter = filter_calls(calls, &self.store.options().pagination_calls);
        let requested = force_index.unwrap_or(0);
        let record = self.store.record_mut(id).ok_or_else(|| missing(id, "putting a range"))?;
        let meta = record.meta_mut();
        let force = meta.force_index.map_or(requested, |stored| stored.max(requested));
        meta.force_index = Some(force);
        meta.range
            .get_or_insert_with(Range::new)
            .ensure_segment(&filter, force);
        meta.filter_calls = Some(filter);
        let record: &Record = record;
        self.mode.notify(|cache| {
            let meta = record.meta();
            let type_name = meta.type_name();
            cache.write_field(
                id,
                FILTER_CALLS_KEY,
                CacheValue::FilterCalls(meta.filter_calls().unwrap_or(&[])),
                type_name,
            );
            cache.write_field(id, FORCE_INDEX_KEY, CacheValue::ForceIndex(force), type_name);
            if let Some(range) = meta.range() {
                cache.write_field(id, RANGE_KEY, CacheValue::Range(range), type_name);
            }
        });
        debug!(id, force_index = force, "writer.put_range");
        Ok(())
    }

    /// Merges a fetched page of edges into the range on `connection_id`.
    ///
    /// `calls` carry both the filter and the paging arguments of the fetch.
    /// Each edge record must hold a cursor and a node link.
    pub fn put_range_edges(
        &mut self,
        connection_id: &str,
        calls: &[Call],
        page_info: PageInfo,
        edge_ids: &[DataId],
    ) -> Result<()> {
        self.mode.check_range_write(connection_id)?;
        let edges = edge_ids
            .iter()
            .map(|edge_id| self.store.edge_ref(edge_id))
            .collect::<Result<Vec<_>>>()?;
        let change = self
            .store
            .merge_range_page(connection_id, calls, page_info, &edges)?;
        self.store.metrics().range_page_merged(change.inserted.len());
        debug!(
            connection = connection_id,
            edges = edges.len(),
            inserted = change.inserted.len(),
            evicted = change.evicted.len(),
            "writer.put_range_edges"
        );
        self.notify_range(connection_id);
        Ok(())
    }

    /// Appends, prepends or removes `edge_id` on `connection_id`.
    ///
    /// Committed writers apply the update to the range. Optimistic writers
    /// queue it on the connection record, creating the record if needed.
    pub fn apply_range_update(&mut self, connection_id: &str, edge_id: &str, op: RangeOperation) -> Result<()> {
        self.mode
            .apply_range_update(&mut *self.store, connection_id, edge_id, op)
    }

    /// Marks `fragment` as resolved on `id` and bumps the fragment generation.
    pub fn set_has_deferred_fragment_data(&mut self, id: &str, fragment: &str) -> Result<()> {
        let record = self
            .store
            .record_mut(id)
            .ok_or_else(|| missing(id, "marking a deferred fragment"))?;
        let meta = record.meta_mut();
        meta.resolved_fragments.insert(fragment.to_owned());
        meta.fragment_generation += 1;
        trace!(id, fragment, generation = meta.fragment_generation, "writer.set_has_deferred_fragment_data");
        Ok(())
    }

    /// Sets or clears the error status bit on `id`.
    pub fn set_error_status(&mut self, id: &str, has_error: bool) -> Result<()> {
        let record = self
            .store
            .record_mut(id)
            .ok_or_else(|| missing(id, "setting its status"))?;
        let meta = record.meta_mut();
        meta.status = meta.status.with_error(has_error);
        Ok(())
    }

    /// Tombstones `id`.
    ///
    /// Committed deletes also drop `id` from the reverse index, both as a node
    /// and, when it held a range, as a connection.
    pub fn delete_record(&mut self, id: &str) {
        let removed = self.store.tombstone(id);
        self.mode.on_delete(&mut *self.store, id, removed.as_ref());
        self.store.metrics().record_deleted();
        debug!(id, optimistic = self.mode.is_optimistic(), "writer.delete_record");
    }

    fn write_field(&mut self, id: &str, key: &str, value: FieldValue, op: &'static str) -> Result<()> {
        let record = self.store.record_mut(id).ok_or_else(|| missing(id, op))?;
        self.mode.tag(record);
        self.mode.notify(|cache| {
            cache.write_field(id, key, CacheValue::Field(&value), record.meta().type_name())
        });
        trace!(id, key, "writer.write_field");
        record.set_field(key, value);
        self.store.metrics().field_written();
        Ok(())
    }

    fn ensure_present(&self, id: &str, op: &'static str) -> Result<()> {
        match self.store.get_record_state(id) {
            RecordState::Existent => Ok(()),
            _ => Err(missing(id, op)),
        }
    }

    fn ensure_linked<'a>(&self, parent: &str, key: &str, ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in ids {
            if seen.insert(id) && self.store.get_record_state(id) != RecordState::Existent {
                return Err(StoreError::LinkedRecordMissing {
                    parent: DataId::from(parent),
                    id: DataId::from(id),
                    field: key.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn notify_range(&mut self, connection_id: &str) {
        let store = &*self.store;
        let Some(record) = store.record(connection_id) else {
            return;
        };
        if let Some(range) = record.meta().range() {
            self.mode.notify(|cache| {
                cache.write_field(
                    connection_id,
                    RANGE_KEY,
                    CacheValue::Range(range),
                    record.meta().type_name(),
                )
            });
        }
    }
}
