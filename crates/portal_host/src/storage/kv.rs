//! Durable key-value storage substrate contracts and adapters.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// Host key-value storage holding one raw JSON string per key.
///
/// The contract is synchronous because the browser substrate (`localStorage`) is synchronous;
/// async wrappers live in the dictionary providers built on top of it.
pub trait KeyValueStorage {
    /// Reads the raw string stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>, String>;

    /// Replaces the raw string stored under `key`.
    fn set_item(&self, key: &str, raw: &str) -> Result<(), String>;

    /// Removes `key` from storage. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op storage for unsupported targets; nothing survives a write.
pub struct NoopKeyValueStorage;

impl KeyValueStorage for NoopKeyValueStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _raw: &str) -> Result<(), String> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory storage keyed by string.
///
/// Clones share the same backing map, which lets tests model several realms reading one
/// browser storage area.
pub struct MemoryKeyValueStorage {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryKeyValueStorage {
    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl KeyValueStorage for MemoryKeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.inner.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, raw: &str) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .insert(key.to_string(), raw.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        self.inner.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn memory_storage_round_trip_and_remove() {
        let storage = MemoryKeyValueStorage::default();
        let storage_obj: &dyn KeyValueStorage = &storage;

        storage_obj.set_item("cache.key", "{\"k\":1}").expect("set");
        assert_eq!(
            storage_obj.get_item("cache.key").expect("get"),
            Some("{\"k\":1}".to_string())
        );
        storage_obj.remove_item("cache.key").expect("remove");
        assert_eq!(storage_obj.get_item("cache.key").expect("get"), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_clones_share_backing_map() {
        let first = MemoryKeyValueStorage::default();
        let second = first.clone();

        first.set_item("shared", "1").expect("set");
        assert_eq!(second.get_item("shared").expect("get"), Some("1".into()));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn noop_storage_is_empty_and_successful() {
        let storage = NoopKeyValueStorage;
        storage.set_item("k", "{}").expect("set");
        assert_eq!(storage.get_item("k").expect("get"), None);
        storage.remove_item("k").expect("remove");
    }
}
