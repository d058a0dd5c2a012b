//! Application context owning one realm's handles.

use std::rc::Rc;

use portal_host::HostServices;
use thiserror::Error;
use tracing::info;

use crate::{
    auth::{AuthContainer, AuthError},
    config::{ConfigError, CoreConfig},
    containers::{
        AppContainer, ContainerError, ContextManager, NotificationCenter, NotificationError,
        SettingsContainer, TasksContainer,
    },
    event_hub::EventHub,
    http::{HttpClient, HttpClientError},
    storage::{DictionaryObject, StorageError},
};

#[derive(Debug, Error, Clone, PartialEq)]
/// Any failure surfaced through the application context.
pub enum CoreError {
    /// Startup configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Persisted state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// A domain container failed.
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// Notification delivery failed.
    #[error(transparent)]
    Notification(#[from] NotificationError),
    /// A request failed.
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

/// One realm of the portal: the hub plus every handle built on it.
///
/// The shell calls [`Portal::init`] once; each app realm calls [`Portal::join`] on the
/// shell's portal so all realms converge through the same hub.
#[derive(Clone)]
pub struct Portal {
    config: CoreConfig,
    host: HostServices,
    hub: EventHub,
    auth: AuthContainer,
    http: HttpClient,
    settings: SettingsContainer,
    notifications: NotificationCenter,
    context: ContextManager,
    apps: AppContainer,
    tasks: TasksContainer,
}

impl Portal {
    /// Validates `config` and builds the first realm on a fresh hub.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when validation fails.
    pub fn init(host: HostServices, config: CoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        info!(
            environment = %config.environment,
            host_strategy = host.host_strategy.as_str(),
            "portal core starting"
        );
        Ok(Self::build(host, config, EventHub::new()))
    }

    /// Builds another realm on this portal's hub with its own host adapters.
    pub fn join(&self, host: HostServices) -> Self {
        Self::build(host, self.config.clone(), self.hub.clone())
    }

    fn build(host: HostServices, config: CoreConfig, hub: EventHub) -> Self {
        let auth = AuthContainer::new(
            config.auth.clone(),
            host.storage.clone(),
            host.navigation.clone(),
            &hub,
        );
        if !config.auth.client_id.is_empty() {
            auth.register_app(&config.auth.client_id, config.services.all());
        }
        let http = HttpClient::new(&host, &hub, Rc::new(auth.clone()), config.retry);
        let settings = SettingsContainer::new(
            &config.settings_key,
            host.storage.clone(),
            &hub,
            DictionaryObject::new(),
        );
        let notifications =
            NotificationCenter::new(host.storage.clone(), host.timer.clone(), &hub);
        let context = ContextManager::new(
            host.storage.clone(),
            &hub,
            http.clone(),
            &config.services.context,
            config.context_history_length,
        );
        let apps = AppContainer::new(
            &hub,
            http.clone(),
            host.app_loader.clone(),
            &config.services.portal,
        );
        let tasks = TasksContainer::new(&hub, http.clone(), &config.services.tasks);

        Self {
            config,
            host,
            hub,
            auth,
            http,
            settings,
            notifications,
            context,
            apps,
            tasks,
        }
    }

    /// Returns the validated configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Returns this realm's host adapters.
    pub fn host(&self) -> &HostServices {
        &self.host
    }

    /// Returns the shared hub.
    pub fn event_hub(&self) -> &EventHub {
        &self.hub
    }

    /// Auth container; also the token source of [`Portal::http`].
    pub fn auth(&self) -> &AuthContainer {
        &self.auth
    }

    /// HTTP client.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Portal-level settings.
    pub fn settings(&self) -> &SettingsContainer {
        &self.settings
    }

    /// Notification center.
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Context manager.
    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// App registry.
    pub fn apps(&self) -> &AppContainer {
        &self.apps
    }

    /// Task list.
    pub fn tasks(&self) -> &TasksContainer {
        &self.tasks
    }
}
