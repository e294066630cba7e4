use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::core::id::Id;

/// The local key/value store backing FIND_VALUE and STORE_VALUE.
///
/// Values are never overwritten: [`put`](Store::put) only inserts if the key is absent.
pub trait Store: Send + Sync + 'static {
    fn has(&self, key: &Id) -> bool;

    fn get(&self, key: &Id) -> Option<Bytes>;

    /// Stores the value if the key is absent, returns whether it was stored.
    fn put(&self, key: Id, value: Bytes) -> bool;
}

/// An in-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<Id, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn has(&self, key: &Id) -> bool {
        self.values.read().contains_key(key)
    }

    fn get(&self, key: &Id) -> Option<Bytes> {
        // Cheap as the backing storage is shared amongst instances.
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: Id, value: Bytes) -> bool {
        let mut values = self.values.write();
        if values.contains_key(&key) {
            return false;
        }

        values.insert(key, value);
        true
    }
}
