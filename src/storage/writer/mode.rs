use tracing::debug;

use crate::storage::cache::{CacheValue, CacheWriter};
use crate::storage::record::{RangeOperation, Record};
use crate::storage::store::RecordStore;
use crate::storage::wire::RANGE_KEY;
use crate::types::{DataId, Result, StoreError};

/// Behaviour that differs between committed and optimistic writes.
///
/// A [`super::RecordWriter`] runs every operation through its mode: the mode
/// tags touched records, decides whether the persistence collaborator hears
/// about the write, and picks the strategy for range updates.
pub trait WriteMode {
    /// True for optimistic writers.
    fn is_optimistic(&self) -> bool;

    /// Marks `record` as touched by this writer.
    fn tag(&self, record: &mut Record);

    /// Hands the persistence collaborator to `f`, if this mode has one.
    fn notify(&mut self, f: impl FnOnce(&mut dyn CacheWriter));

    /// Fails when this mode may not create or fill ranges.
    fn check_range_write(&self, connection_id: &str) -> Result<()>;

    /// Applies or queues one range update.
    fn apply_range_update(
        &mut self,
        store: &mut RecordStore,
        connection_id: &str,
        edge_id: &str,
        op: RangeOperation,
    ) -> Result<()>;

    /// Runs after `id` was tombstoned; `removed` is the record it held.
    fn on_delete(&mut self, store: &mut RecordStore, id: &str, removed: Option<&Record>);
}

/// Writes server-confirmed data.
///
/// Range updates mutate ranges directly and keep the reverse index current.
/// Every write is reported to the optional [`CacheWriter`].
pub struct Committed<'c> {
    cache: Option<&'c mut dyn CacheWriter>,
}

impl<'c> Committed<'c> {
    /// Creates the mode, optionally reporting to `cache`.
    pub fn new(cache: Option<&'c mut dyn CacheWriter>) -> Self {
        Self { cache }
    }
}

impl WriteMode for Committed<'_> {
    fn is_optimistic(&self) -> bool {
        false
    }

    fn tag(&self, _record: &mut Record) {}

    fn notify(&mut self, f: impl FnOnce(&mut dyn CacheWriter)) {
        if let Some(cache) = self.cache.as_deref_mut() {
            f(cache);
        }
    }

    fn check_range_write(&self, _connection_id: &str) -> Result<()> {
        Ok(())
    }

    fn apply_range_update(
        &mut self,
        store: &mut RecordStore,
        connection_id: &str,
        edge_id: &str,
        op: RangeOperation,
    ) -> Result<()> {
        let change = store.apply_range_op(connection_id, edge_id, op)?;
        store.metrics().range_update(false);
        debug!(
            connection = connection_id,
            edge = edge_id,
            op = op.as_str(),
            inserted = change.inserted.len(),
            evicted = change.evicted.len(),
            "writer.apply_range_update: applied"
        );
        let store = &*store;
        if let Some(record) = store.record(connection_id) {
            if let Some(range) = record.meta().range() {
                self.notify(|cache| {
                    cache.write_field(
                        connection_id,
                        RANGE_KEY,
                        CacheValue::Range(range),
                        record.meta().type_name(),
                    )
                });
            }
        }
        Ok(())
    }

    fn on_delete(&mut self, store: &mut RecordStore, id: &str, removed: Option<&Record>) {
        store.purge_from_index(id, removed);
        self.notify(|cache| cache.write_node(id, None));
    }
}

/// Writes speculative data on behalf of a client mutation.
///
/// Records touched are tagged with the mutation id and the optimistic status
/// bit. Range updates are queued on the connection record instead of applied,
/// and nothing reaches the persistence collaborator.
#[derive(Clone, Debug, Default)]
pub struct Optimistic {
    client_mutation_id: Option<String>,
}

impl Optimistic {
    /// Creates the mode for `client_mutation_id`.
    pub fn new(client_mutation_id: Option<String>) -> Self {
        Self { client_mutation_id }
    }

    /// Mutation id tagged onto touched records.
    pub fn client_mutation_id(&self) -> Option<&str> {
        self.client_mutation_id.as_deref()
    }
}

impl WriteMode for Optimistic {
    fn is_optimistic(&self) -> bool {
        true
    }

    fn tag(&self, record: &mut Record) {
        record.tag_optimistic(self.client_mutation_id.as_deref());
    }

    fn notify(&mut self, _f: impl FnOnce(&mut dyn CacheWriter)) {}

    fn check_range_write(&self, connection_id: &str) -> Result<()> {
        Err(StoreError::OptimisticRange {
            id: DataId::from(connection_id),
        })
    }

    fn apply_range_update(
        &mut self,
        store: &mut RecordStore,
        connection_id: &str,
        edge_id: &str,
        op: RangeOperation,
    ) -> Result<()> {
        let (record, created) = store.record_or_insert(connection_id);
        self.tag(record);
        record.meta_mut().queued.push(op, DataId::from(edge_id));
        if created {
            store.metrics().record_created();
        }
        store.metrics().range_update(true);
        debug!(
            connection = connection_id,
            edge = edge_id,
            op = op.as_str(),
            created,
            "writer.apply_range_update: queued"
        );
        Ok(())
    }

    fn on_delete(&mut self, _store: &mut RecordStore, _id: &str, _removed: Option<&Record>) {}
}
