use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::types::DataId;

/// Reverse index from a node to the connections whose committed ranges contain it.
///
/// Empty sets are never retained: removing the last connection of a node drops
/// the node's entry entirely.
#[derive(Clone, Debug, Default)]
pub struct NodeConnectionIndex {
    by_node: FxHashMap<DataId, BTreeSet<DataId>>,
}

impl NodeConnectionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `connection_id` contains `node_id`. Returns true if newly added.
    pub fn add(&mut self, node_id: &DataId, connection_id: &DataId) -> bool {
        self.by_node
            .entry(node_id.clone())
            .or_default()
            .insert(connection_id.clone())
    }

    /// Drops the membership of `node_id` in `connection_id`. Returns true if it was present.
    pub fn remove(&mut self, node_id: &str, connection_id: &str) -> bool {
        let Some(connections) = self.by_node.get_mut(node_id) else {
            return false;
        };
        let removed = connections.remove(connection_id);
        if connections.is_empty() {
            self.by_node.remove(node_id);
        }
        removed
    }

    /// Removes every membership of `node_id`.
    pub fn remove_node(&mut self, node_id: &str) -> Option<BTreeSet<DataId>> {
        self.by_node.remove(node_id)
    }

    /// Drops `connection_id` from the entries of each node in `node_ids`.
    pub fn remove_connection<'a>(
        &mut self,
        connection_id: &str,
        node_ids: impl IntoIterator<Item = &'a DataId>,
    ) {
        for node_id in node_ids {
            self.remove(node_id, connection_id);
        }
    }

    /// Connections currently containing `node_id`.
    pub fn connections(&self, node_id: &str) -> Option<&BTreeSet<DataId>> {
        self.by_node.get(node_id)
    }

    /// Returns true when `connection_id` is recorded for `node_id`.
    pub fn contains(&self, node_id: &str, connection_id: &str) -> bool {
        self.by_node
            .get(node_id)
            .is_some_and(|connections| connections.contains(connection_id))
    }

    /// Number of nodes with at least one connection.
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// True when no node is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Iterates over `(node, connections)` entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&DataId, &BTreeSet<DataId>)> {
        self.by_node.iter()
    }
}
