//! Persistence backend contract for reliable dictionaries, plus an in-memory backend.

use std::{cell::RefCell, future::Future, pin::Pin, rc::Rc};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{emitter::Emitter, subscription::Subscription};

/// JSON object held by one dictionary.
pub type DictionaryObject = Map<String, Value>;

/// Object-safe boxed future used by [`ReliableDictionaryStorageProvider`] async methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Errors raised by dictionary storage providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The host storage substrate rejected the operation.
    #[error("storage backend failed for `{key}`: {message}")]
    Backend {
        /// Storage key involved.
        key: String,
        /// Backend message.
        message: String,
    },
    /// A value could not be encoded.
    #[error("failed to serialize `{key}`: {message}")]
    Serialize {
        /// Dictionary or storage key involved.
        key: String,
        /// Serializer message.
        message: String,
    },
    /// A stored value could not be decoded into the requested type.
    #[error("failed to deserialize `{key}`: {message}")]
    Deserialize {
        /// Dictionary or storage key involved.
        key: String,
        /// Deserializer message.
        message: String,
    },
}

/// Storage backend for a reliable dictionary.
///
/// Every dictionary operation funnels through this contract so the persistence medium can be
/// replaced without touching dependents. Providers do not retry.
pub trait ReliableDictionaryStorageProvider {
    /// Reads one entry.
    fn get_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<Option<Value>, StorageError>>;

    /// Writes one entry.
    fn set_item_async<'a>(
        &'a self,
        key: &'a str,
        value: Value,
    ) -> ProviderFuture<'a, Result<(), StorageError>>;

    /// Removes one entry.
    fn remove_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<(), StorageError>>;

    /// Removes every entry.
    fn clear_async<'a>(&'a self) -> ProviderFuture<'a, Result<(), StorageError>>;

    /// Returns the whole object, re-hydrating from durable storage when needed.
    fn to_object_async<'a>(&'a self) -> ProviderFuture<'a, Result<DictionaryObject, StorageError>>;

    /// Returns the in-memory object without touching storage when it is loaded.
    fn to_object(&self) -> DictionaryObject;

    /// Registers a handler called with the full object after every change, including changes
    /// made by other realms.
    fn on_change(&self, handler: Box<dyn Fn(&DictionaryObject)>) -> Subscription;
}

#[derive(Clone, Default)]
/// Non-durable provider for ephemeral dictionaries and tests.
pub struct MemoryStorageProvider {
    object: Rc<RefCell<DictionaryObject>>,
    changed: Emitter<DictionaryObject>,
}

impl MemoryStorageProvider {
    /// Creates a provider seeded with `initial`.
    pub fn with_object(initial: DictionaryObject) -> Self {
        Self {
            object: Rc::new(RefCell::new(initial)),
            changed: Emitter::new(),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut DictionaryObject)) {
        let snapshot = {
            let mut object = self.object.borrow_mut();
            f(&mut object);
            object.clone()
        };
        self.changed.emit(&snapshot);
    }
}

impl ReliableDictionaryStorageProvider for MemoryStorageProvider {
    fn get_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<Option<Value>, StorageError>> {
        Box::pin(async move { Ok(self.object.borrow().get(key).cloned()) })
    }

    fn set_item_async<'a>(
        &'a self,
        key: &'a str,
        value: Value,
    ) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.mutate(|object| {
                object.insert(key.to_string(), value);
            });
            Ok(())
        })
    }

    fn remove_item_async<'a>(
        &'a self,
        key: &'a str,
    ) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.mutate(|object| {
                object.remove(key);
            });
            Ok(())
        })
    }

    fn clear_async<'a>(&'a self) -> ProviderFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.mutate(DictionaryObject::clear);
            Ok(())
        })
    }

    fn to_object_async<'a>(&'a self) -> ProviderFuture<'a, Result<DictionaryObject, StorageError>> {
        Box::pin(async move { Ok(self.to_object()) })
    }

    fn to_object(&self) -> DictionaryObject {
        self.object.borrow().clone()
    }

    fn on_change(&self, handler: Box<dyn Fn(&DictionaryObject)>) -> Subscription {
        self.changed.subscribe(handler)
    }
}
