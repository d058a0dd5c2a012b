//! Persisted dictionaries and their storage providers.

pub mod local_storage;
pub mod provider;
pub mod reliable_dictionary;
pub mod reviver;

pub use local_storage::{LocalStorageProvider, LOCAL_STORAGE_TOPIC_PREFIX};
pub use provider::{
    DictionaryObject, MemoryStorageProvider, ProviderFuture, ReliableDictionaryStorageProvider,
    StorageError,
};
pub use reliable_dictionary::{ReadonlyReliableDictionary, ReliableDictionary};
pub use reviver::{is_iso_date, parse_iso_date, parse_with_dates, revive_dates};
