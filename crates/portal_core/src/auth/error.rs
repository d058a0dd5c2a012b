//! Auth resolution failures. None of them are retried.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Auth resolution failures.
pub enum AuthError {
    /// No registered app covers the resource or client id.
    #[error("no auth app registered for `{resource}`")]
    AppNotFound {
        /// Requested resource or client id.
        resource: String,
    },
    /// The login callback referenced an unknown nonce.
    #[error("auth nonce `{key}` not found")]
    NonceNotFound {
        /// Nonce key from the callback state.
        key: String,
    },
    /// The id token nonce does not match the login attempt.
    #[error("token nonce does not match login attempt `{expected}`")]
    NonceMismatch {
        /// Nonce key of the login attempt.
        expected: String,
    },
    /// The token could not be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The login callback lacked a required parameter.
    #[error("login callback is missing `{0}`")]
    MissingCallbackParameter(&'static str),
    /// The login redirect URL could not be encoded.
    #[error("failed to build authorize URL: {0}")]
    AuthorizeUrl(String),
    /// The top-level window could not be navigated.
    #[error("navigation failed: {0}")]
    Navigation(String),
    /// The auth cache failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
