//! Transaction-aware cache.
//!
//! Positive results only; a key removed through [`TransactionalCache::remove_and_lock`]
//! stays locked until the owning transaction resolves, so a concurrent reader
//! cannot repopulate a value that is about to be superseded. Reads and writes
//! of other keys are unaffected.

use dashmap::DashMap;
use std::sync::Arc;

use crate::txn::Txn;

pub struct TransactionalCache<V> {
    map: DashMap<String, V>,
    locked: Arc<DashMap<String, ()>>,
}

impl<V: Clone + Send + Sync + 'static> TransactionalCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            locked: Arc::new(DashMap::new()),
        }
    }

    /// A locked key reports a miss even if a concurrent writer raced a value
    /// back in.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        if self.locked.contains_key(key) {
            return None;
        }
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Store a value. Ignored while the key is locked.
    pub fn put(&self, key: &str, value: V) {
        if self.locked.contains_key(key) {
            return;
        }
        self.map.insert(key.to_string(), value);
    }

    /// Plain removal, without any transactional locking.
    pub fn remove(&self, key: &str) {
        self.map.remove(key);
    }

    /// Remove the key and lock it for the remainder of `txn`. The lock is
    /// released when the transaction commits or rolls back.
    pub fn remove_and_lock(&self, key: &str, txn: &Txn) {
        self.map.remove(key);
        self.locked.insert(key.to_string(), ());
        let locked = Arc::clone(&self.locked);
        let key = key.to_string();
        txn.on_completion(move |_committed| {
            locked.remove(&key);
        });
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for TransactionalCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
