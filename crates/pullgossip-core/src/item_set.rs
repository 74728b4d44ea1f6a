//! The set of items a peer currently holds.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::types::ItemId;

/// Thread-safe set of item identifiers.
///
/// Guarded by its own lock so that membership checks made while filtering
/// digests and requests never contend with the engine's round lock.
#[derive(Debug, Default)]
pub struct ItemSet {
    inner: RwLock<HashSet<ItemId>>,
}

impl ItemSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Returns `true` if it was not already present.
    pub fn add(&self, item: ItemId) -> bool {
        self.inner.write().insert(item)
    }

    /// Add several items under one write lock. Returns how many were new.
    pub fn add_all<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut inner = self.inner.write();
        items.into_iter().map(|item| inner.insert(item)).filter(|inserted| *inserted).count()
    }

    /// Remove an item. Returns `true` if it was present.
    pub fn remove(&self, item: &ItemId) -> bool {
        self.inner.write().remove(item)
    }

    /// Remove several items under one write lock. Returns how many were present.
    pub fn remove_all<'a, I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        let mut inner = self.inner.write();
        items.into_iter().filter(|item| inner.remove(*item)).count()
    }

    /// Check membership.
    pub fn contains(&self, item: &ItemId) -> bool {
        self.inner.read().contains(item)
    }

    /// Copy the current contents. Order is unspecified.
    pub fn snapshot(&self) -> Vec<ItemId> {
        self.inner.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
