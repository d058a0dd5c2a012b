//! Domain containers built on distributed state, persisted dictionaries and the HTTP client.

pub mod apps;
pub mod context;
pub mod error;
pub mod notifications;
pub mod settings;
pub mod tasks;

pub use apps::{AppContainer, AppManifest, APP_CONTAINER_TOPIC, APP_REGISTERED_TOPIC};
pub use context::{Context, ContextManager, ContextType, CURRENT_CONTEXT_KEY};
pub use error::{ContainerError, NotificationError};
pub use notifications::{
    Notification, NotificationCenter, NotificationLevel, NotificationRequest,
    NotificationResponse, NOTIFICATION_CENTER_KEY, NOTIFICATION_PRESENTERS_TOPIC,
};
pub use settings::{SettingsContainer, SETTINGS_CACHE_PREFIX};
pub use tasks::{Task, TasksContainer, TASKS_TOPIC};
