//! HTTP client error taxonomy.

use portal_host::Headers;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Response body could not be parsed into the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to parse response from {url} (status {status}): {message}")]
pub struct HttpClientParseError {
    /// Request URL.
    pub url: String,
    /// Response status.
    pub status: u16,
    /// Parser message.
    pub message: String,
    /// Raw body, decoded lossily.
    pub body: String,
}

/// Non-OK response that was not retried or exhausted its retry budget.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request to {url} failed with status {status}")]
pub struct HttpClientRequestFailedError {
    /// Response status.
    pub status: u16,
    /// Request URL.
    pub url: String,
    /// Error body parsed as JSON, when the body was JSON.
    pub response: Option<Value>,
    /// Response headers.
    pub headers: Headers,
}

impl HttpClientRequestFailedError {
    /// Decodes the error body as `T`.
    pub fn error_body<T: DeserializeOwned>(&self) -> Option<T> {
        self.response
            .clone()
            .and_then(|body| serde_json::from_value(body).ok())
    }
}

/// Every failure surfaced by [`crate::http::HttpClient`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpClientError {
    /// Body was not in the expected format.
    #[error(transparent)]
    Parse(#[from] HttpClientParseError),
    /// Server answered with a failing status.
    #[error(transparent)]
    RequestFailed(#[from] HttpClientRequestFailedError),
    /// Transport-level failure.
    #[error("network request to {url} failed: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Transport message.
        message: String,
    },
    /// The active abort signal fired.
    #[error("request to {url} was aborted")]
    Aborted {
        /// Request URL.
        url: String,
    },
    /// Bearer token could not be resolved.
    #[error("failed to acquire token for {url}: {message}")]
    Auth {
        /// Request URL.
        url: String,
        /// Token collaborator message.
        message: String,
    },
    /// Request body could not be encoded.
    #[error("failed to encode request body for {url}: {message}")]
    Body {
        /// Request URL.
        url: String,
        /// Encoder message.
        message: String,
    },
}

impl HttpClientError {
    /// Returns the failing status when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed(err) => Some(err.status),
            Self::Parse(err) => Some(err.status),
            _ => None,
        }
    }

    /// Returns whether this error is reported to telemetry before it is returned.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::RequestFailed(_))
    }
}
