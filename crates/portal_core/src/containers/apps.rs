//! App manifest registry and the current app.

use std::{collections::BTreeMap, rc::Rc};

use portal_host::AppLoader;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ContainerError;
use crate::{
    distributed_state::DistributedState, event_hub::EventHub, http::HttpClient,
    subscription::Subscription,
};

/// Topic of the shared registry.
pub const APP_CONTAINER_TOPIC: &str = "AppContainer";
/// Topic announcing each app registration.
pub const APP_REGISTERED_TOPIC: &str = "AppContainer.registered";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Metadata describing one app.
pub struct AppManifest {
    /// Unique app key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Short name.
    #[serde(default)]
    pub short_name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bundle version.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AppRegistry {
    manifests: BTreeMap<String, AppManifest>,
    registered: Vec<String>,
    current: Option<String>,
}

/// Registry of app manifests shared by every realm.
///
/// Loaded app bundles call [`AppContainer::register_app`] from their own realm; the host sees
/// the registration through the hub.
#[derive(Clone)]
pub struct AppContainer {
    hub: EventHub,
    registry: DistributedState<AppRegistry>,
    http: HttpClient,
    loader: Rc<dyn AppLoader>,
    base_url: String,
}

impl AppContainer {
    /// Joins the registry on `hub`.
    pub fn new(hub: &EventHub, http: HttpClient, loader: Rc<dyn AppLoader>, base_url: &str) -> Self {
        Self {
            hub: hub.clone(),
            registry: DistributedState::new(APP_CONTAINER_TOPIC, AppRegistry::default(), hub),
            http,
            loader,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the manifests endpoint.
    pub fn apps_url(&self) -> String {
        format!("{}/api/apps", self.base_url)
    }

    /// Fetches the manifests from the portal service and merges them into the registry.
    ///
    /// # Errors
    ///
    /// Returns request failures.
    pub async fn fetch_apps_async(&self) -> Result<Vec<AppManifest>, ContainerError> {
        let response = self
            .http
            .get_async::<Vec<AppManifest>>(&self.apps_url(), None)
            .await?;
        self.registry.update(|registry| {
            for manifest in &response.data {
                registry
                    .manifests
                    .insert(manifest.key.clone(), manifest.clone());
            }
        });
        Ok(response.data)
    }

    /// Records that the bundle of `manifest.key` is loaded, adding or replacing its manifest.
    pub fn register_app(&self, manifest: AppManifest) {
        info!(app = %manifest.key, "app registered");
        self.registry.update(|registry| {
            if !registry.registered.contains(&manifest.key) {
                registry.registered.push(manifest.key.clone());
            }
            registry
                .manifests
                .insert(manifest.key.clone(), manifest.clone());
        });
        self.hub.publish(APP_REGISTERED_TOPIC, manifest);
    }

    /// Returns whether the bundle of `key` has registered.
    pub fn is_registered(&self, key: &str) -> bool {
        self.registry
            .with_state(|registry| registry.registered.iter().any(|registered| registered == key))
    }

    /// Returns the manifest of `key`.
    pub fn get(&self, key: &str) -> Option<AppManifest> {
        self.registry
            .with_state(|registry| registry.manifests.get(key).cloned())
    }

    /// Returns every manifest, ordered by key.
    pub fn get_all(&self) -> Vec<AppManifest> {
        self.registry
            .with_state(|registry| registry.manifests.values().cloned().collect())
    }

    /// Returns the current app.
    pub fn current_app(&self) -> Option<AppManifest> {
        self.registry.with_state(|registry| {
            registry
                .current
                .as_ref()
                .and_then(|key| registry.manifests.get(key).cloned())
        })
    }

    /// Makes `key` the current app, loading its bundle first when it has not registered.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::AppNotFound`] for unknown keys and
    /// [`ContainerError::AppLoad`] when the loader fails.
    pub async fn set_current_app_async(&self, key: &str) -> Result<AppManifest, ContainerError> {
        let manifest = self.get(key).ok_or_else(|| ContainerError::AppNotFound {
            key: key.to_string(),
        })?;
        if !self.is_registered(key) {
            debug!(app = key, "loading app bundle");
            self.loader
                .load_app_bundle(key)
                .await
                .map_err(|message| ContainerError::AppLoad {
                    key: key.to_string(),
                    message,
                })?;
        }
        self.registry
            .update(|registry| registry.current = Some(key.to_string()));
        Ok(self.get(key).unwrap_or(manifest))
    }

    /// Clears the current app.
    pub fn clear_current_app(&self) {
        self.registry.update(|registry| registry.current = None);
    }

    /// Registers a handler called for every app registration in any realm.
    pub fn on_app_registered(&self, handler: impl Fn(&AppManifest) + 'static) -> Subscription {
        self.hub
            .register_listener::<AppManifest>(APP_REGISTERED_TOPIC, handler)
    }
}
