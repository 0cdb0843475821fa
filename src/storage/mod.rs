//! Normalized record store and its write paths.
//!
//! Records are addressed by [`DataId`](crate::types::DataId) and hold scalar
//! fields, links to other records, and for connections a [`Range`] of edges.
//! Reads go through [`RecordStore`]; every mutation goes through a
//! [`RecordWriter`] bound to either the committed or the optimistic mode.

/// Connection ranges and their segments.
///
/// Merges fetched pages by cursor position under force-index precedence.
pub mod range;

/// Field call lists and their pagination split.
pub mod calls;

/// Persisted JSON shape of records.
pub mod wire;

mod cache;
mod metrics;
mod node_index;
mod options;
mod record;
mod root_calls;
mod store;
mod writer;

/// Persistence collaborator.
pub use cache::{CacheLog, CacheValue, CacheWrite, CacheWriter};

/// Metrics hooks.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StoreMetrics};

/// Reverse index from nodes to connections.
pub use node_index::NodeConnectionIndex;

/// Store configuration.
pub use options::{
    default_config_path, ConfigError, StoreOptions, DEFAULT_CLIENT_ID_PREFIX,
    DEFAULT_NODE_ROOT_CALLS,
};

/// Record model.
pub use record::{
    FieldValue, QueuedRangeOps, RangeOperation, Record, RecordMeta, RecordPath, RecordSlot,
    RecordState, RecordStatus,
};

pub use range::{EdgeRef, PageInfo, Range, RangeChange, RangeInfo, Segment};
pub use root_calls::RootCallMap;
pub use store::{RangeMetadata, RecordStore, EDGE_CURSOR_FIELD, EDGE_NODE_FIELD};

/// Write paths.
pub use writer::{Committed, CommittedWriter, Optimistic, OptimisticWriter, RecordWriter, WriteMode};
