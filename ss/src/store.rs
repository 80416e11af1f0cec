//! Keyed record store
//!
//! A read/write-locked map of per-record mutexes. The map lock is only
//! held long enough to resolve a key to its slot; all record access goes
//! through the slot's own mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// A record that can live in a [`Store`]
pub trait Record: Clone + Send + Sync + 'static {
    /// Stable identifier of this record
    fn id(&self) -> Uuid;
}

/// Errors from store operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Uuid),

    #[error("record already exists: {0}")]
    Duplicate(Uuid),

    #[error("store lock poisoned")]
    Poisoned,
}

type Slot<T> = Arc<Mutex<T>>;

/// In-memory keyed store with per-key synchronization
#[derive(Clone)]
pub struct Store<T: Record> {
    entries: Arc<RwLock<HashMap<Uuid, Slot<T>>>>,
}

impl<T: Record> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Store<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a new record, keyed by its own id
    ///
    /// Fails with [`StoreError::Duplicate`] if the id is already present.
    /// Ids are never reused while the store is alive, even after removal
    /// of the record, as long as callers generate fresh ids.
    pub fn insert(&self, record: T) -> Result<Uuid, StoreError> {
        let id = record.id();
        debug!(%id, "Store::insert: called");
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if map.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        map.insert(id, Arc::new(Mutex::new(record)));
        Ok(id)
    }

    /// Get a cloned snapshot of a record
    pub fn get(&self, id: &Uuid) -> Result<T, StoreError> {
        let slot = self.slot(id)?;
        let record = slot.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(record.clone())
    }

    /// Apply an atomic mutation to a record under its own lock
    ///
    /// The mutator runs while holding only that record's mutex, so two
    /// concurrent `update` calls on the same id are serialized and calls
    /// on different ids are not.
    pub fn update<R>(&self, id: &Uuid, mutate: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        debug!(%id, "Store::update: called");
        let slot = self.slot(id)?;
        let mut record = slot.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(mutate(&mut record))
    }

    /// Remove a record, returning its final state
    pub fn remove(&self, id: &Uuid) -> Result<T, StoreError> {
        debug!(%id, "Store::remove: called");
        let slot = {
            let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
            map.remove(id).ok_or(StoreError::NotFound(*id))?
        };
        let record = slot.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(record.clone())
    }

    /// Whether a record with this id exists
    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.read().map(|m| m.contains_key(id)).unwrap_or(false)
    }

    /// Snapshot of all record ids
    pub fn ids(&self) -> Vec<Uuid> {
        self.entries.read().map(|m| m.keys().copied().collect()).unwrap_or_default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a key to its slot, holding the map lock only briefly
    fn slot(&self, id: &Uuid) -> Result<Slot<T>, StoreError> {
        let map = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        map.get(id).cloned().ok_or(StoreError::NotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: Uuid,
        value: u64,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                id: Uuid::now_v7(),
                value: 0,
            }
        }
    }

    impl Record for Counter {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = Store::new();
        let record = Counter::new();
        let id = store.insert(record.clone()).unwrap();
        assert_eq!(id, record.id);

        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let store = Store::new();
        let record = Counter::new();
        let id = store.insert(record.clone()).unwrap();

        let result = store.insert(record);
        assert_eq!(result, Err(StoreError::Duplicate(id)));
    }

    #[test]
    fn test_get_unknown_id() {
        let store: Store<Counter> = Store::new();
        let id = Uuid::now_v7();
        assert_eq!(store.get(&id), Err(StoreError::NotFound(id)));
    }

    #[test]
    fn test_update_applies_mutation() {
        let store = Store::new();
        let id = store.insert(Counter::new()).unwrap();

        let returned = store.update(&id, |c| {
            c.value = 42;
            c.value
        });
        assert_eq!(returned, Ok(42));
        assert_eq!(store.get(&id).unwrap().value, 42);
    }

    #[test]
    fn test_update_unknown_id() {
        let store: Store<Counter> = Store::new();
        let id = Uuid::now_v7();
        let result = store.update(&id, |c| c.value += 1);
        assert_eq!(result, Err(StoreError::NotFound(id)));
    }

    #[test]
    fn test_remove() {
        let store = Store::new();
        let id = store.insert(Counter::new()).unwrap();
        assert!(store.contains(&id));

        store.remove(&id).unwrap();
        assert!(!store.contains(&id));
        assert_eq!(store.get(&id), Err(StoreError::NotFound(id)));
    }

    #[test]
    fn test_len_and_ids() {
        let store = Store::new();
        assert!(store.is_empty());

        let a = store.insert(Counter::new()).unwrap();
        let b = store.insert(Counter::new()).unwrap();

        assert_eq!(store.len(), 2);
        let ids = store.ids();
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
    }

    #[test]
    fn test_concurrent_updates_are_serialized_per_key() {
        let store = Store::new();
        let id = store.insert(Counter::new()).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    store.update(&id, |c| c.value += 1).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // No lost updates: every increment lands
        assert_eq!(store.get(&id).unwrap().value, 800);
    }

    #[test]
    fn test_distinct_keys_do_not_interfere() {
        let store = Store::new();
        let a = store.insert(Counter::new()).unwrap();
        let b = store.insert(Counter::new()).unwrap();

        let store_a = store.clone();
        let writer = std::thread::spawn(move || {
            for _ in 0..500 {
                store_a.update(&a, |c| c.value += 1).unwrap();
            }
        });

        // Reads of b proceed while a is being hammered
        for _ in 0..500 {
            assert_eq!(store.get(&b).unwrap().value, 0);
        }
        writer.join().unwrap();
        assert_eq!(store.get(&a).unwrap().value, 500);
    }
}
