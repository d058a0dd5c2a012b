//! Typed dictionary facade over a [`ReliableDictionaryStorageProvider`].

use std::rc::Rc;

use portal_host::KeyValueStorage;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{
    local_storage::LocalStorageProvider,
    provider::{
        DictionaryObject, MemoryStorageProvider, ReliableDictionaryStorageProvider, StorageError,
    },
};
use crate::{event_hub::EventHub, subscription::Subscription};

/// Keyed JSON dictionary with typed accessors and change notification.
///
/// Change events come from the provider, so writes made by peers sharing the provider's state
/// are observed here too.
#[derive(Clone)]
pub struct ReliableDictionary {
    provider: Rc<dyn ReliableDictionaryStorageProvider>,
}

impl ReliableDictionary {
    /// Wraps `provider`.
    pub fn new(provider: impl ReliableDictionaryStorageProvider + 'static) -> Self {
        Self {
            provider: Rc::new(provider),
        }
    }

    /// Wraps a shared provider.
    pub fn from_provider(provider: Rc<dyn ReliableDictionaryStorageProvider>) -> Self {
        Self { provider }
    }

    /// Dictionary persisted in host storage under `base_key`, starting empty.
    pub fn local(base_key: &str, storage: Rc<dyn KeyValueStorage>, hub: &EventHub) -> Self {
        Self::new(LocalStorageProvider::new(
            base_key,
            storage,
            hub,
            DictionaryObject::new(),
        ))
    }

    /// Ephemeral dictionary without durability.
    pub fn memory() -> Self {
        Self::new(MemoryStorageProvider::default())
    }

    /// Reads `key` as `V`; a missing key yields `None`.
    ///
    /// # Errors
    ///
    /// Returns provider failures and [`StorageError::Deserialize`] when the stored value does
    /// not match `V`.
    pub async fn get_async<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, StorageError> {
        match self.provider.get_item_async(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StorageError::Deserialize {
                    key: key.to_string(),
                    message: err.to_string(),
                }),
        }
    }

    /// Writes `value` under `key`, persisting before change handlers run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialize`] or provider failures.
    pub async fn set_async<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
    ) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|err| StorageError::Serialize {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        self.provider.set_item_async(key, value).await
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns provider failures.
    pub async fn remove_async(&self, key: &str) -> Result<(), StorageError> {
        self.provider.remove_item_async(key).await
    }

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns provider failures.
    pub async fn clear_async(&self) -> Result<(), StorageError> {
        self.provider.clear_async().await
    }

    /// Returns the whole dictionary.
    ///
    /// # Errors
    ///
    /// Returns provider failures.
    pub async fn to_object_async(&self) -> Result<DictionaryObject, StorageError> {
        self.provider.to_object_async().await
    }

    /// Returns the whole dictionary decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns provider failures and [`StorageError::Deserialize`] on shape mismatch.
    pub async fn to_typed_async<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        let object = self.provider.to_object_async().await?;
        serde_json::from_value(Value::Object(object)).map_err(|err| StorageError::Deserialize {
            key: "*".to_string(),
            message: err.to_string(),
        })
    }

    /// Returns the keys currently stored.
    ///
    /// # Errors
    ///
    /// Returns provider failures.
    pub async fn keys_async(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.provider.to_object_async().await?.into_iter().map(|(key, _)| key).collect())
    }

    /// Registers a handler receiving the full object after every change.
    pub fn on_change(&self, handler: impl Fn(&DictionaryObject) + 'static) -> Subscription {
        self.provider.on_change(Box::new(handler))
    }

    /// Returns a read-only view sharing this dictionary's provider.
    pub fn readonly(&self) -> ReadonlyReliableDictionary {
        ReadonlyReliableDictionary {
            inner: self.clone(),
        }
    }
}

/// Read-only view of a [`ReliableDictionary`].
#[derive(Clone)]
pub struct ReadonlyReliableDictionary {
    inner: ReliableDictionary,
}

impl ReadonlyReliableDictionary {
    /// See [`ReliableDictionary::get_async`].
    ///
    /// # Errors
    ///
    /// Same as [`ReliableDictionary::get_async`].
    pub async fn get_async<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, StorageError> {
        self.inner.get_async(key).await
    }

    /// See [`ReliableDictionary::to_object_async`].
    ///
    /// # Errors
    ///
    /// Same as [`ReliableDictionary::to_object_async`].
    pub async fn to_object_async(&self) -> Result<DictionaryObject, StorageError> {
        self.inner.to_object_async().await
    }

    /// See [`ReliableDictionary::keys_async`].
    ///
    /// # Errors
    ///
    /// Same as [`ReliableDictionary::keys_async`].
    pub async fn keys_async(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys_async().await
    }

    /// See [`ReliableDictionary::on_change`].
    pub fn on_change(&self, handler: impl Fn(&DictionaryObject) + 'static) -> Subscription {
        self.inner.on_change(handler)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Preferences {
        theme: String,
        #[serde(default)]
        pinned: Vec<String>,
    }

    #[test]
    fn typed_get_and_set() {
        let dictionary = ReliableDictionary::memory();
        block_on(dictionary.set_async("pinned", &vec!["a", "b"])).expect("set");

        let pinned: Option<Vec<String>> = block_on(dictionary.get_async("pinned")).expect("get");
        assert_eq!(pinned, Some(vec!["a".to_string(), "b".to_string()]));
        let missing: Option<u8> = block_on(dictionary.get_async("nope")).expect("get");
        assert_eq!(missing, None);
    }

    #[test]
    fn type_mismatch_is_a_deserialize_error() {
        let dictionary = ReliableDictionary::memory();
        block_on(dictionary.set_async("theme", "dark")).expect("set");

        let err = block_on(dictionary.get_async::<u32>("theme")).expect_err("mismatch");
        assert!(matches!(err, StorageError::Deserialize { ref key, .. } if key == "theme"));
    }

    #[test]
    fn whole_object_decodes_into_struct() {
        let dictionary = ReliableDictionary::memory();
        block_on(dictionary.set_async("theme", "dark")).expect("set");

        let prefs: Preferences = block_on(dictionary.to_typed_async()).expect("typed");
        assert_eq!(
            prefs,
            Preferences {
                theme: "dark".to_string(),
                pinned: Vec::new()
            }
        );
        assert_eq!(block_on(dictionary.keys_async()).expect("keys"), vec!["theme"]);
    }

    #[test]
    fn change_fires_after_write_with_full_object() {
        let dictionary = ReliableDictionary::memory();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = dictionary
            .readonly()
            .on_change(move |object| sink.borrow_mut().push(object.len()));

        block_on(dictionary.set_async("a", &1)).expect("set");
        block_on(dictionary.set_async("b", &2)).expect("set");
        block_on(dictionary.remove_async("a")).expect("remove");
        block_on(dictionary.clear_async()).expect("clear");

        assert_eq!(*seen.borrow(), vec![1, 2, 1, 0]);
    }
}
