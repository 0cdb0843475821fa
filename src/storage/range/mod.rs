//! Connection ranges.
//!
//! A [`Range`] belongs to exactly one connection record and holds one
//! [`Segment`] per distinct filter-call signature. Pages fetched from the
//! server are merged into the matching segment by cursor position; the force
//! index decides whether a page merges into, replaces, or is ignored by the
//! content already known for that segment.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::storage::calls::{segment_key, Call, Pagination};
use crate::types::DataId;

mod segment;

pub use segment::{EdgeRef, PageInfo, RangeChange, RangeInfo, Segment};

use segment::Splice;

/// Ordered edge segments of one connection, keyed by filter calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Range {
    segments: BTreeMap<String, Segment>,
}

impl Range {
    /// Creates a range without segments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the segment selected by `filter_calls`, if one was ever written.
    pub fn segment(&self, filter_calls: &[Call]) -> Option<&Segment> {
        self.segments.get(&segment_key(filter_calls))
    }

    /// Iterates over `(segment key, segment)` pairs in key order.
    pub fn segments(&self) -> impl Iterator<Item = (&str, &Segment)> {
        self.segments.iter().map(|(key, segment)| (key.as_str(), segment))
    }

    /// Ensures a segment exists for `filter_calls`.
    pub(crate) fn ensure_segment(&mut self, filter_calls: &[Call], force_index: i32) -> &mut Segment {
        self.segments
            .entry(segment_key(filter_calls))
            .or_insert_with(|| Segment::new(filter_calls.to_vec(), force_index))
    }

    /// Merges one fetched page into the segment selected by `filter_calls`.
    ///
    /// `pagination` holds the paging arguments the page was fetched with and
    /// `force_index` the precedence of the fetch. A page with a lower force index
    /// than the segment is ignored; a higher one replaces the segment.
    pub fn add_items(
        &mut self,
        filter_calls: &[Call],
        pagination: &Pagination,
        edges: &[EdgeRef],
        page_info: PageInfo,
        force_index: i32,
    ) -> RangeChange {
        let key = segment_key(filter_calls);
        let existing = self.segments.get(&key);
        if let Some(segment) = existing {
            if force_index < segment.force_index() {
                warn!(
                    segment = %key,
                    force_index,
                    current = segment.force_index(),
                    "range.add_items: dropping stale page"
                );
                return RangeChange::default();
            }
        }
        let forced = existing.is_some_and(|segment| force_index > segment.force_index());
        let anchored = |cursor: &str| existing.and_then(|segment| segment.position_of_cursor(cursor));

        let at = if forced {
            None
        } else if let Some(after) = pagination.after.as_deref() {
            let Some(pos) = anchored(after) else {
                warn!(segment = %key, cursor = after, "range.add_items: unknown `after` cursor");
                return RangeChange::default();
            };
            Some(Splice::After(pos))
        } else if let Some(before) = pagination.before.as_deref() {
            let Some(pos) = anchored(before) else {
                warn!(segment = %key, cursor = before, "range.add_items: unknown `before` cursor");
                return RangeChange::default();
            };
            Some(Splice::Before(pos))
        } else if pagination.first.is_some() {
            Some(Splice::Head)
        } else if pagination.last.is_some() {
            Some(Splice::Tail)
        } else {
            None
        };

        let segment = self.ensure_segment(filter_calls, force_index);
        if forced {
            let evicted = segment.reset(force_index);
            let mut change = segment.replace(edges);
            change.evicted.extend(evicted);
            segment.set_page_info(page_info);
            debug!(
                segment = %key,
                force_index,
                inserted = change.inserted.len(),
                evicted = change.evicted.len(),
                "range.add_items: forced reset"
            );
            return change;
        }

        let change = match at {
            Some(at) => {
                let anchor = match at {
                    Splice::After(pos) | Splice::Before(pos) => Some(segment.edges()[pos].edge_id.clone()),
                    Splice::Head | Splice::Tail => None,
                };
                let change = segment.splice(at, edges);
                segment.adopt_page_info(&change.inserted, anchor.as_ref(), page_info);
                change
            }
            None => {
                let change = segment.replace(edges);
                segment.set_page_info(page_info);
                change
            }
        };
        debug!(
            segment = %key,
            inserted = change.inserted.len(),
            evicted = change.evicted.len(),
            "range.add_items: merged page"
        );
        change
    }

    /// Inserts `edge` at the tail of the segment selected by `filter_calls`.
    pub fn append_edge(&mut self, filter_calls: &[Call], edge: EdgeRef, force_index: i32) -> RangeChange {
        self.ensure_segment(filter_calls, force_index)
            .splice(Splice::Tail, std::slice::from_ref(&edge))
    }

    /// Inserts `edge` at the head of the segment selected by `filter_calls`.
    pub fn prepend_edge(&mut self, filter_calls: &[Call], edge: EdgeRef, force_index: i32) -> RangeChange {
        self.ensure_segment(filter_calls, force_index)
            .splice(Splice::Head, std::slice::from_ref(&edge))
    }

    /// Removes `edge_id` from every segment that holds it.
    pub fn remove_edge(&mut self, edge_id: &DataId) -> RangeChange {
        let mut change = RangeChange::default();
        for segment in self.segments.values_mut() {
            if let Some(edge) = segment.remove_edge(edge_id) {
                change.extend(RangeChange {
                    inserted: Vec::new(),
                    evicted: vec![edge],
                });
            }
        }
        change
    }

    /// Returns true when any segment has an edge pointing at `node_id`.
    pub fn contains_node(&self, node_id: &DataId) -> bool {
        self.segments.values().any(|segment| segment.contains_node(node_id))
    }

    /// Returns true when any segment holds `edge_id`.
    pub fn contains_edge(&self, edge_id: &DataId) -> bool {
        self.segments.values().any(|segment| segment.contains_edge(edge_id))
    }

    /// Every node referenced by any segment.
    pub fn node_ids(&self) -> BTreeSet<DataId> {
        self.segments
            .values()
            .flat_map(|segment| segment.edges().iter().map(|edge| edge.node_id.clone()))
            .collect()
    }

    /// Returns the page of the segment selected by `filter_calls` described by
    /// `pagination`, or `None` when that segment was never fetched.
    pub fn retrieve(&self, filter_calls: &[Call], pagination: &Pagination) -> Option<RangeInfo> {
        self.segment(filter_calls)
            .map(|segment| segment.retrieve(pagination))
    }
}
