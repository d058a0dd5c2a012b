//! Dictionary provider persisting one JSON object per base key in host key-value storage.
//!
//! The in-memory copy is a [`DistributedState`] under `LocalStorageProvider.<baseKey>`, so every
//! realm on the same hub sees writes immediately while storage keeps them across reloads.

use std::rc::Rc;

use portal_host::KeyValueStorage;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    provider::{DictionaryObject, ProviderFuture, ReliableDictionaryStorageProvider, StorageError},
    reviver::parse_with_dates,
};
use crate::{distributed_state::DistributedState, event_hub::EventHub, subscription::Subscription};

/// Topic prefix of the distributed cache behind each provider.
pub const LOCAL_STORAGE_TOPIC_PREFIX: &str = "LocalStorageProvider.";

/// Provider backed by the host key-value substrate.
#[derive(Clone)]
pub struct LocalStorageProvider {
    base_key: String,
    storage: Rc<dyn KeyValueStorage>,
    default: DictionaryObject,
    cache: DistributedState<Option<DictionaryObject>>,
}

impl LocalStorageProvider {
    /// Creates a provider for `base_key`, seeding from storage or `default`.
    ///
    /// A peer already holding the key on `hub` wins over the seeded value.
    pub fn new(
        base_key: impl Into<String>,
        storage: Rc<dyn KeyValueStorage>,
        hub: &EventHub,
        default: DictionaryObject,
    ) -> Self {
        let base_key = base_key.into();
        let seeded = load_object(storage.as_ref(), &base_key).unwrap_or_else(|| default.clone());
        let cache = DistributedState::new(
            format!("{LOCAL_STORAGE_TOPIC_PREFIX}{base_key}"),
            Some(seeded),
            hub,
        );
        Self {
            base_key,
            storage,
            default,
            cache,
        }
    }

    /// Returns the storage key the object is persisted under.
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    fn current_object(&self) -> DictionaryObject {
        if let Some(object) = self.cache.state() {
            return object;
        }
        debug!(base_key = %self.base_key, "rehydrating dictionary from storage");
        let object = load_object(self.storage.as_ref(), &self.base_key)
            .unwrap_or_else(|| self.default.clone());
        self.cache.set_state(Some(object.clone()));
        object
    }

    fn persist(&self, object: &DictionaryObject) -> Result<(), StorageError> {
        let raw = serde_json::to_string(object).map_err(|err| StorageError::Serialize {
            key: self.base_key.clone(),
            message: err.to_string(),
        })?;
        self.storage
            .set_item(&self.base_key, &raw)
            .map_err(|message| StorageError::Backend {
                key: self.base_key.clone(),
                message,
            })
    }

    fn mutate(&self, f: impl FnOnce(&mut DictionaryObject)) -> Result<(), StorageError> {
        let mut object = self.current_object();
        f(&mut object);
        self.persist(&object)?;
        self.cache.set_state(Some(object));
        Ok(())
    }
}

fn load_object(storage: &dyn KeyValueStorage, base_key: &str) -> Option<DictionaryObject> {
    let raw = match storage.get_item(base_key) {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(base_key, error = %err, "failed to read dictionary from storage");
            return None;
        }
    };
    match parse_with_dates(&raw) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => {
            warn!(base_key, "stored dictionary is not a JSON object; using default");
            None
        }
        Err(err) => {
            warn!(base_key, error = %err, "stored dictionary is corrupt; using default");
            None
        }
    }
}

impl ReliableDictionaryStorageProvider for LocalStorageProvider {
    fn get_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<Option<Value>, StorageError>> {
        Box::pin(async move { Ok(self.current_object().get(key).cloned()) })
    }

    fn set_item_async<'a>(
        &'a self,
        key: &'a str,
        value: Value,
    ) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.mutate(|object| {
                object.insert(key.to_string(), value);
            })
        })
    }

    fn remove_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.mutate(|object| {
                object.remove(key);
            })
        })
    }

    fn clear_async<'a>(&'a self) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.storage
                .remove_item(&self.base_key)
                .map_err(|message| StorageError::Backend {
                    key: self.base_key.clone(),
                    message,
                })?;
            self.cache.set_state(None);
            Ok(())
        })
    }

    fn to_object_async<'a>(&'a self) -> ProviderFuture<'a, Result<DictionaryObject, StorageError>> {
        Box::pin(async move { Ok(self.current_object()) })
    }

    fn to_object(&self) -> DictionaryObject {
        self.cache.state().unwrap_or_default()
    }

    fn on_change(&self, handler: Box<dyn Fn(&DictionaryObject)>) -> Subscription {
        self.cache.on_change(move |object| match object {
            Some(object) => handler(object),
            None => handler(&DictionaryObject::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;
    use portal_host::MemoryKeyValueStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn provider(
        storage: &MemoryKeyValueStorage,
        hub: &EventHub,
        default: Value,
    ) -> LocalStorageProvider {
        let default = match default {
            Value::Object(object) => object,
            _ => DictionaryObject::new(),
        };
        LocalStorageProvider::new("SETTINGS", Rc::new(storage.clone()), hub, default)
    }

    #[test]
    fn writes_persist_whole_object() {
        let storage = MemoryKeyValueStorage::default();
        let hub = EventHub::new();
        let settings = provider(&storage, &hub, json!({"theme": "light"}));

        block_on(settings.set_item_async("lang", json!("nb"))).expect("set");
        let raw = storage.get_item("SETTINGS").expect("read").expect("present");
        let stored: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(stored, json!({"theme": "light", "lang": "nb"}));
    }

    #[test]
    fn fresh_provider_reads_what_earlier_one_wrote() {
        let storage = MemoryKeyValueStorage::default();
        let first = provider(&storage, &EventHub::new(), json!({}));
        block_on(first.set_item_async("count", json!(3))).expect("set");

        let second = provider(&storage, &EventHub::new(), json!({}));
        assert_eq!(
            block_on(second.get_item_async("count")).expect("get"),
            Some(json!(3))
        );
    }

    #[test]
    fn corrupt_storage_falls_back_to_default() {
        let storage = MemoryKeyValueStorage::default();
        storage.set_item("SETTINGS", "{not json").expect("seed");

        let settings = provider(&storage, &EventHub::new(), json!({"theme": "dark"}));
        assert_eq!(Value::Object(settings.to_object()), json!({"theme": "dark"}));
    }

    #[test]
    fn clear_removes_storage_key_and_rehydrates_default() {
        let storage = MemoryKeyValueStorage::default();
        let settings = provider(&storage, &EventHub::new(), json!({"theme": "dark"}));
        block_on(settings.set_item_async("theme", json!("light"))).expect("set");

        block_on(settings.clear_async()).expect("clear");
        assert_eq!(storage.get_item("SETTINGS").expect("read"), None);
        assert!(settings.to_object().is_empty());

        let object = block_on(settings.to_object_async()).expect("object");
        assert_eq!(object.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn peers_on_same_hub_observe_changes() {
        let storage = MemoryKeyValueStorage::default();
        let hub = EventHub::new();
        let a = provider(&storage, &hub, json!({}));
        let b = provider(&storage, &hub, json!({}));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = b.on_change(Box::new(move |object| {
            sink.borrow_mut().push(object.get("k").cloned())
        }));

        block_on(a.set_item_async("k", json!("v"))).expect("set");
        assert_eq!(*seen.borrow(), vec![Some(json!("v"))]);
        assert_eq!(b.to_object().get("k"), Some(&json!("v")));
    }
}
