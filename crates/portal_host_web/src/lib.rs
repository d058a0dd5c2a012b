//! Browser (`wasm32`) implementations of [`portal_host`] service contracts.
//!
//! Storage is `localStorage`, transport is `reqwest` (the `fetch` API on `wasm32`), timers use
//! `setTimeout`, navigation drives `window.location`, and app bundles load through injected
//! `<script>` elements. Off `wasm32` the browser-only adapters degrade to no-ops so the
//! workspace builds and tests natively.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

/// Host-strategy selection and the browser service bundle.
pub mod adapters;
pub mod app_loader;
pub mod fetch;
pub mod navigation;
pub mod storage;
pub mod timer;

pub use adapters::{build_host_services, host_strategy_name, selected_host_strategy};
pub use app_loader::WebAppLoader;
pub use fetch::FetchTransport;
pub use navigation::WebNavigationService;
pub use storage::WebLocalStorage;
pub use timer::WebTimer;
