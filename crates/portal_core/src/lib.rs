//! Client-side core of the micro-frontend portal.
//!
//! Every realm (the shell and each loaded app) builds its handles on one shared [`EventHub`].
//! [`DistributedState`] keeps a value converged across those realms, [`ReliableDictionary`]
//! persists keyed state through a storage provider, and [`HttpClient`] adds auth, retry,
//! in-flight GET de-duplication and response caching on top of the host transport. The
//! [`Portal`] application context wires all of it from a [`portal_host::HostServices`]
//! bundle and a [`CoreConfig`].

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod config;
pub mod containers;
pub mod distributed_state;
pub mod emitter;
pub mod event_hub;
pub mod http;
pub mod portal;
pub mod storage;
pub mod subscription;

pub use auth::{AuthApp, AuthContainer, AuthError, AuthToken, AuthUser};
pub use config::{AuthConfig, ConfigError, CoreConfig, ServiceEndpoints};
pub use containers::{
    AppContainer, AppManifest, Context, ContextManager, NotificationCenter, NotificationLevel,
    NotificationRequest, NotificationResponse, SettingsContainer, Task, TasksContainer,
};
pub use distributed_state::{sync_topic, DistributedState};
pub use emitter::Emitter;
pub use event_hub::EventHub;
pub use http::{HttpClient, HttpClientError, HttpResponse, RequestInit, RetryPolicy};
pub use portal::{CoreError, Portal};
pub use storage::{ReliableDictionary, ReliableDictionaryStorageProvider, StorageError};
pub use subscription::Subscription;
