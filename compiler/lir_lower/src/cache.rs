//! At-most-once lowering per function.
//!
//! Interpreter threads may hit a function's first call at the same time.
//! The first caller for a key runs the lowering; the others block on the
//! same cell until the result is published and then share it. A failed
//! lowering is cached like a success and stays scoped to its key.

use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::lower::NodeTree;
use crate::LoweringError;

/// Published result for one function.
pub type Lowered<N> = Result<Arc<NodeTree<N>>, LoweringError>;

type Cell<N> = Arc<OnceLock<Lowered<N>>>;

/// Concurrent map from function key to its lowered tree.
///
/// An explicit value owned by whoever drives lowering; there is no global
/// instance.
pub struct LoweringCache<K, N> {
    cells: DashMap<K, Cell<N>>,
}

impl<K: Eq + Hash, N> Default for LoweringCache<K, N> {
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, N> LoweringCache<K, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tree for `key`, running `lower` if no caller has yet.
    ///
    /// Concurrent callers with the same key wait for the first one. If
    /// `lower` panics the cell stays empty and the next caller retries.
    pub fn get_or_lower(
        &self,
        key: K,
        lower: impl FnOnce() -> Result<NodeTree<N>, LoweringError>,
    ) -> Lowered<N> {
        // Clone the cell out so the shard lock is not held while lowering.
        let cell = Arc::clone(self.cells.entry(key).or_default().value());
        cell.get_or_init(|| {
            let result = lower().map(Arc::new);
            if let Err(error) = &result {
                tracing::debug!(%error, "lowering failed");
            }
            result
        })
        .clone()
    }

    /// The published result for `key`, without lowering.
    pub fn get(&self, key: &K) -> Option<Lowered<N>> {
        let cell = Arc::clone(self.cells.get(key)?.value());
        cell.get().cloned()
    }

    /// Number of keys that have been requested.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
