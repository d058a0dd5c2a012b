//! Caller-supplied request options.

use bytes::Bytes;
use portal_host::{AbortSignal, Headers, HttpMethod};
use serde::Serialize;

/// Header asking the backend to bypass its cache.
pub const REFRESH_HEADER: &str = "x-pp-refresh";

/// Options for one request; everything not set is filled by the client pipeline.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    /// Verb override; the calling method decides when `None`.
    pub method: Option<HttpMethod>,
    /// Extra request headers.
    pub headers: Headers,
    /// Request body.
    pub body: Option<Bytes>,
    /// Explicit abort signal; the active scope's signal is used when `None`.
    pub signal: Option<AbortSignal>,
}

impl RequestInit {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header and returns the options.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets a raw body and returns the options.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers.set("content-type", "application/json");
        Ok(self)
    }

    /// Sets the abort signal and returns the options.
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Returns a copy marked as a cache-bypassing refresh.
    pub fn to_refresh_request(&self) -> Self {
        self.clone().with_header(REFRESH_HEADER, "true")
    }
}

/// Normalises optional options and applies `transform`.
pub fn ensure_request_init(
    init: Option<RequestInit>,
    transform: impl FnOnce(RequestInit) -> RequestInit,
) -> RequestInit {
    transform(init.unwrap_or_default())
}
