use thiserror::Error;

use super::notifications::NotificationLevel;
use crate::{http::HttpClientError, storage::StorageError};

#[derive(Debug, Error, Clone, PartialEq)]
/// Failures of the domain containers.
pub enum ContainerError {
    /// No manifest is known for the app key.
    #[error("app `{key}` not found")]
    AppNotFound {
        /// Requested app key.
        key: String,
    },
    /// The app bundle loader failed.
    #[error("failed to load app `{key}`: {message}")]
    AppLoad {
        /// App key.
        key: String,
        /// Loader message.
        message: String,
    },
    /// Persisted container state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A backend call failed.
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Notification delivery failures.
pub enum NotificationError {
    /// No presenter was registered for the level.
    #[error("No presenter for notification level {0}")]
    NoPresenter(NotificationLevel),
    /// The notification log could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
