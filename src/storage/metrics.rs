use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking record store writes.
///
/// Implementations receive one call per logical write performed through a
/// [`super::RecordWriter`], optimistic or committed. They can be used for
/// monitoring how much a query layer churns the store.
pub trait StoreMetrics: Send + Sync {
    /// Records the creation of a record.
    fn record_created(&self);

    /// Records a record being tombstoned.
    fn record_deleted(&self);

    /// Records a field write or clear (scalar or linked).
    fn field_written(&self);

    /// Records a fetched page merged into a connection range.
    ///
    /// # Parameters
    /// * `inserted` - Number of edges placed by the merge.
    fn range_page_merged(&self, inserted: usize);

    /// Records a range update.
    ///
    /// # Parameters
    /// * `queued` - `true` when the update was queued by an optimistic write
    ///   rather than applied to the range.
    fn range_update(&self, queued: bool);
}

/// A no-op implementation of [`StoreMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {
    fn record_created(&self) {}
    fn record_deleted(&self) {}
    fn field_written(&self) {}
    fn range_page_merged(&self, _inserted: usize) {}
    fn range_update(&self, _queued: bool) {}
}

/// A thread-safe counter-based implementation of [`StoreMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of records created.
    pub records_created: AtomicU64,

    /// Number of records tombstoned.
    pub records_deleted: AtomicU64,

    /// Number of field writes.
    pub fields_written: AtomicU64,

    /// Number of pages merged into ranges.
    pub range_pages_merged: AtomicU64,

    /// Number of edges placed by page merges.
    pub range_edges_merged: AtomicU64,

    /// Number of range updates applied to ranges.
    pub range_updates_applied: AtomicU64,

    /// Number of range updates queued by optimistic writes.
    pub range_updates_queued: AtomicU64,
}

impl StoreMetrics for CounterMetrics {
    fn record_created(&self) {
        self.records_created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_deleted(&self) {
        self.records_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn field_written(&self) {
        self.fields_written.fetch_add(1, Ordering::Relaxed);
    }

    fn range_page_merged(&self, inserted: usize) {
        self.range_pages_merged.fetch_add(1, Ordering::Relaxed);
        self.range_edges_merged
            .fetch_add(inserted as u64, Ordering::Relaxed);
    }

    fn range_update(&self, queued: bool) {
        if queued {
            self.range_updates_queued.fetch_add(1, Ordering::Relaxed);
        } else {
            self.range_updates_applied.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which discards everything.
pub fn default_metrics() -> Arc<dyn StoreMetrics> {
    Arc::new(NoopMetrics)
}
