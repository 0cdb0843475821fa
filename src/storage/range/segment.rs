use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::storage::calls::{Call, Pagination};
use crate::types::DataId;

/// One edge of a connection as the range engine sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// Id of the edge record.
    pub edge_id: DataId,
    /// Opaque server cursor of the edge.
    pub cursor: String,
    /// Id of the node the edge points at.
    pub node_id: DataId,
}

impl EdgeRef {
    /// Creates an edge reference.
    pub fn new(
        edge_id: impl Into<DataId>,
        cursor: impl Into<String>,
        node_id: impl Into<DataId>,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            cursor: cursor.into(),
            node_id: node_id.into(),
        }
    }
}

/// Continuation flags for the two ends of a segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// More edges exist after the last known edge.
    pub has_next_page: bool,
    /// More edges exist before the first known edge.
    pub has_previous_page: bool,
}

impl PageInfo {
    /// Creates page info from both flags.
    pub fn new(has_next_page: bool, has_previous_page: bool) -> Self {
        Self {
            has_next_page,
            has_previous_page,
        }
    }
}

/// Edges inserted into and evicted from a range by one mutation.
///
/// An edge moved by a newer page shows up in both lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeChange {
    /// Edges now present at their new position.
    pub inserted: Vec<EdgeRef>,
    /// Edges taken out of their previous position.
    pub evicted: Vec<EdgeRef>,
}

impl RangeChange {
    /// True when the mutation touched nothing.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.evicted.is_empty()
    }

    pub(crate) fn extend(&mut self, other: RangeChange) {
        self.inserted.extend(other.inserted);
        self.evicted.extend(other.evicted);
    }
}

/// Slice of a segment selected by pagination arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeInfo {
    /// Edges that satisfy the requested page, in range order.
    pub requested_edges: Vec<EdgeRef>,
    /// Whether more edges are known or reported beyond each end of the slice.
    pub page_info: PageInfo,
}

impl RangeInfo {
    /// Edge ids of the requested page.
    pub fn requested_edge_ids(&self) -> Vec<DataId> {
        self.requested_edges
            .iter()
            .map(|edge| edge.edge_id.clone())
            .collect()
    }
}

/// Where a page lands inside a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Splice {
    Head,
    Tail,
    After(usize),
    Before(usize),
}

/// Ordered edges fetched under one filter-call signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    filter_calls: Vec<Call>,
    edges: Vec<EdgeRef>,
    page_info: PageInfo,
    force_index: i32,
}

impl Segment {
    pub(crate) fn new(filter_calls: Vec<Call>, force_index: i32) -> Self {
        Self {
            filter_calls,
            edges: Vec::new(),
            page_info: PageInfo::default(),
            force_index,
        }
    }

    /// Filter calls that select this segment.
    pub fn filter_calls(&self) -> &[Call] {
        &self.filter_calls
    }

    /// Edges in range order.
    pub fn edges(&self) -> &[EdgeRef] {
        &self.edges
    }

    /// Current continuation flags.
    pub fn page_info(&self) -> PageInfo {
        self.page_info
    }

    /// Force index the current content was established with.
    pub fn force_index(&self) -> i32 {
        self.force_index
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when the segment holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn position_of_cursor(&self, cursor: &str) -> Option<usize> {
        self.edges.iter().position(|edge| edge.cursor == cursor)
    }

    fn position_of_edge(&self, edge_id: &DataId) -> Option<usize> {
        self.edges.iter().position(|edge| &edge.edge_id == edge_id)
    }

    pub(crate) fn contains_node(&self, node_id: &DataId) -> bool {
        self.edges.iter().any(|edge| &edge.node_id == node_id)
    }

    pub(crate) fn contains_edge(&self, edge_id: &DataId) -> bool {
        self.position_of_edge(edge_id).is_some()
    }

    pub(crate) fn set_page_info(&mut self, page_info: PageInfo) {
        self.page_info = page_info;
    }

    /// Adopts the flags of a spliced page only for the ends it reached.
    ///
    /// An end is reached when the page's outermost edge on that side, or the
    /// anchor when the page was empty, is now the segment's edge at that end.
    pub(crate) fn adopt_page_info(&mut self, inserted: &[EdgeRef], anchor: Option<&DataId>, page_info: PageInfo) {
        let page_head = inserted.first().map(|edge| &edge.edge_id).or(anchor);
        let page_tail = inserted.last().map(|edge| &edge.edge_id).or(anchor);
        if self.edges.first().map(|edge| &edge.edge_id) == page_head {
            self.page_info.has_previous_page = page_info.has_previous_page;
        }
        if self.edges.last().map(|edge| &edge.edge_id) == page_tail {
            self.page_info.has_next_page = page_info.has_next_page;
        }
    }

    /// Drops every edge and adopts `force_index`.
    pub(crate) fn reset(&mut self, force_index: i32) -> Vec<EdgeRef> {
        self.force_index = force_index;
        self.page_info = PageInfo::default();
        std::mem::take(&mut self.edges)
    }

    pub(crate) fn remove_edge(&mut self, edge_id: &DataId) -> Option<EdgeRef> {
        let pos = self.position_of_edge(edge_id)?;
        Some(self.edges.remove(pos))
    }

    /// Inserts `incoming` at `at`, first pulling any edge id it repeats out of
    /// its old slot. Anchored splices resolve the anchor after the pull, so the
    /// anchor edge itself is never part of `incoming`.
    pub(crate) fn splice(&mut self, at: Splice, incoming: &[EdgeRef]) -> RangeChange {
        let anchor = match at {
            Splice::After(pos) | Splice::Before(pos) => Some(self.edges[pos].edge_id.clone()),
            Splice::Head | Splice::Tail => None,
        };
        let incoming = dedup_edges(incoming, anchor.as_ref());
        let incoming_ids: FxHashSet<&DataId> = incoming.iter().map(|edge| &edge.edge_id).collect();

        let mut evicted = Vec::new();
        self.edges.retain(|edge| {
            if incoming_ids.contains(&edge.edge_id) {
                evicted.push(edge.clone());
                false
            } else {
                true
            }
        });

        let insert_at = match (at, anchor.as_ref()) {
            (Splice::Head, _) => 0,
            (Splice::Tail, _) => self.edges.len(),
            (Splice::After(_), Some(id)) => self.position_of_edge(id).map_or(self.edges.len(), |p| p + 1),
            (Splice::Before(_), Some(id)) => self.position_of_edge(id).unwrap_or(0),
            (_, None) => self.edges.len(),
        };
        self.edges.splice(insert_at..insert_at, incoming.iter().cloned());
        RangeChange {
            inserted: incoming,
            evicted,
        }
    }

    /// Replaces the whole content with `incoming`.
    pub(crate) fn replace(&mut self, incoming: &[EdgeRef]) -> RangeChange {
        let incoming = dedup_edges(incoming, None);
        let evicted = std::mem::replace(&mut self.edges, incoming.clone());
        RangeChange {
            inserted: incoming,
            evicted,
        }
    }

    /// Slices the segment according to `pagination`.
    pub(crate) fn retrieve(&self, pagination: &Pagination) -> RangeInfo {
        let len = self.edges.len();
        let mut start = 0;
        let mut end = len;
        if let Some(after) = pagination.after.as_deref() {
            match self.position_of_cursor(after) {
                Some(pos) => start = pos + 1,
                None => return self.unknown_cursor(),
            }
        }
        if let Some(before) = pagination.before.as_deref() {
            match self.position_of_cursor(before) {
                Some(pos) => end = pos,
                None => return self.unknown_cursor(),
            }
        }
        if end < start {
            end = start;
        }
        if let Some(first) = pagination.first {
            end = end.min(start.saturating_add(first));
        }
        if let Some(last) = pagination.last {
            start = start.max(end.saturating_sub(last));
        }
        let page_info = PageInfo {
            has_next_page: end < len || self.page_info.has_next_page,
            has_previous_page: start > 0 || self.page_info.has_previous_page,
        };
        RangeInfo {
            requested_edges: self.edges[start..end].to_vec(),
            page_info,
        }
    }

    fn unknown_cursor(&self) -> RangeInfo {
        RangeInfo {
            requested_edges: Vec::new(),
            page_info: self.page_info,
        }
    }
}

fn dedup_edges(edges: &[EdgeRef], skip: Option<&DataId>) -> Vec<EdgeRef> {
    let mut seen = FxHashSet::default();
    edges
        .iter()
        .filter(|edge| Some(&edge.edge_id) != skip && seen.insert(edge.edge_id.clone()))
        .cloned()
        .collect()
}
