//! Per-scope user settings with defaults.

use std::rc::Rc;

use portal_host::KeyValueStorage;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    event_hub::EventHub,
    storage::{DictionaryObject, LocalStorageProvider, ReliableDictionary, StorageError},
    subscription::Subscription,
};

/// Storage key prefix of settings dictionaries.
pub const SETTINGS_CACHE_PREFIX: &str = "FUSION_SETTINGS_CACHE:";

/// Settings of one scope (the portal or a single app), persisted and shared across realms.
#[derive(Clone)]
pub struct SettingsContainer {
    base_key: String,
    dictionary: ReliableDictionary,
    defaults: DictionaryObject,
}

impl SettingsContainer {
    /// Opens the settings of `base_key`; `defaults` answer for keys never written.
    pub fn new(
        base_key: &str,
        storage: Rc<dyn KeyValueStorage>,
        hub: &EventHub,
        defaults: DictionaryObject,
    ) -> Self {
        let provider = LocalStorageProvider::new(
            format!("{SETTINGS_CACHE_PREFIX}{base_key}"),
            storage,
            hub,
            DictionaryObject::new(),
        );
        Self {
            base_key: base_key.to_string(),
            dictionary: ReliableDictionary::new(provider),
            defaults,
        }
    }

    /// Returns the scope key.
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    /// Reads a setting, falling back to its default.
    ///
    /// # Errors
    ///
    /// Returns storage failures or a type mismatch.
    pub async fn get_async<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, StorageError> {
        if let Some(value) = self.dictionary.get_async(key).await? {
            return Ok(Some(value));
        }
        match self.defaults.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                StorageError::Deserialize {
                    key: key.to_string(),
                    message: err.to_string(),
                }
            }),
        }
    }

    /// Writes a setting.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn set_async<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<(), StorageError> {
        self.dictionary.set_async(key, value).await
    }

    /// Restores a setting to its default.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn reset_async(&self, key: &str) -> Result<(), StorageError> {
        self.dictionary.remove_async(key).await
    }

    /// Returns defaults overlaid with stored values.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn to_object_async(&self) -> Result<DictionaryObject, StorageError> {
        let mut merged = self.defaults.clone();
        merged.extend(self.dictionary.to_object_async().await?);
        Ok(merged)
    }

    /// Registers a handler receiving the merged settings after every change.
    pub fn on_change(&self, handler: impl Fn(&DictionaryObject) + 'static) -> Subscription {
        let defaults = self.defaults.clone();
        self.dictionary.on_change(move |stored| {
            let mut merged = defaults.clone();
            merged.extend(stored.iter().map(|(key, value)| (key.clone(), value.clone())));
            handler(&merged);
        })
    }

    /// Returns the stored value of `key` without defaults.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn get_stored_async(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.dictionary.get_async(key).await
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

    fn defaults() -> DictionaryObject {
        match json!({"theme": "light", "pageSize": 20}) {
            Value::Object(object) => object,
            _ => DictionaryObject::new(),
        }
    }

    #[test]
    fn defaults_answer_until_overridden() {
        let storage = MemoryKeyValueStorage::default();
        let settings = SettingsContainer::new("meetings", Rc::new(storage.clone()), &EventHub::new(), defaults());

        assert_eq!(block_on(settings.get_async::<String>("theme")).expect("get").as_deref(), Some("light"));
        block_on(settings.set_async("theme", "dark")).expect("set");
        assert_eq!(block_on(settings.get_async::<String>("theme")).expect("get").as_deref(), Some("dark"));
        assert!(storage
            .get_item("FUSION_SETTINGS_CACHE:meetings")
            .expect("read")
            .is_some());

        block_on(settings.reset_async("theme")).expect("reset");
        assert_eq!(block_on(settings.get_stored_async("theme")).expect("get"), None);
        assert_eq!(
            Value::Object(block_on(settings.to_object_async()).expect("object")),
            json!({"theme": "light", "pageSize": 20})
        );
    }

    #[test]
    fn change_handler_sees_merged_settings() {
        let settings = SettingsContainer::new(
            "portal",
            Rc::new(MemoryKeyValueStorage::default()),
            &EventHub::new(),
            defaults(),
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = settings.on_change(move |merged| sink.borrow_mut().push(Value::Object(merged.clone())));

        block_on(settings.set_async("pageSize", &50)).expect("set");
        assert_eq!(*seen.borrow(), vec![json!({"theme": "light", "pageSize": 50})]);
    }
}
