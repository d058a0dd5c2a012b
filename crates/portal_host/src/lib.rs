//! Typed host-collaborator contracts consumed by the portal core.
//!
//! This crate is the API-first boundary between the portal core and its environment: durable
//! key-value storage, fetch transport, timers, abort signals, top-level navigation, telemetry,
//! and app bundle loading. Browser adapters live in `portal_host_web`; the in-memory adapters
//! here back tests and headless tooling.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod abort;
pub mod app_loader;
pub mod fetch;
pub mod host;
pub mod navigation;
pub mod storage;
pub mod telemetry;
pub mod timer;

pub use abort::{AbortController, AbortSignal, Aborted};
pub use app_loader::{AppLoader, AppLoaderFuture, MemoryAppLoader, NoopAppLoader};
pub use fetch::{
    Headers, HttpMethod, HttpRequest, HttpResponse, HttpTransport, NoopHttpTransport,
    ScriptedTransport, TransportFuture, UploadProgress,
};
pub use host::{HostServices, HostStrategy, MemoryHost};
pub use navigation::{
    MemoryNavigationService, NavigationFuture, NavigationService, NoopNavigationService,
};
pub use storage::kv::{KeyValueStorage, MemoryKeyValueStorage, NoopKeyValueStorage};
pub use telemetry::{
    MemoryTelemetryLogger, NoopTelemetryLogger, TelemetryLogger, TelemetryRecord,
    TracingTelemetryLogger,
};
pub use timer::{InstantTimer, NeverTimer, Timer, TimerFuture};
