use rustc_hash::FxHashMap;

use crate::types::DataId;

/// Memo of root field lookups: `(storage key, identifying argument) -> record id`.
///
/// A missing identifying argument is stored under the empty string.
#[derive(Clone, Debug, Default)]
pub struct RootCallMap {
    calls: FxHashMap<String, FxHashMap<String, DataId>>,
}

impl RootCallMap {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a memoized root call.
    pub fn get(&self, storage_key: &str, identifying_arg: Option<&str>) -> Option<&DataId> {
        self.calls
            .get(storage_key)?
            .get(identifying_arg.unwrap_or(""))
    }

    /// Memoizes a root call, replacing any previous mapping.
    pub fn put(&mut self, storage_key: &str, identifying_arg: Option<&str>, id: DataId) -> Option<DataId> {
        self.calls
            .entry(storage_key.to_owned())
            .or_default()
            .insert(identifying_arg.unwrap_or("").to_owned(), id)
    }

    /// Number of memoized `(key, argument)` pairs.
    pub fn len(&self) -> usize {
        self.calls.values().map(FxHashMap::len).sum()
    }

    /// True when nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(storage key, argument, id)` triples in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &DataId)> {
        self.calls.iter().flat_map(|(key, args)| {
            args.iter()
                .map(move |(arg, id)| (key.as_str(), arg.as_str(), id))
        })
    }
}
