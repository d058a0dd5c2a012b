//! Registered apps and the resources their tokens cover.

use serde::{Deserialize, Serialize};

/// Lower-cases and trims trailing slashes so equivalent resource URLs compare equal.
pub fn normalize_resource(resource: &str) -> String {
    resource
        .trim()
        .trim_end_matches('/')
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Registered application and the resources its tokens cover.
///
/// The resource list only grows.
pub struct AuthApp {
    /// Identity provider client id.
    pub client_id: String,
    resources: Vec<String>,
}

impl AuthApp {
    /// Creates an app with normalized, de-duplicated resources.
    pub fn new<S: AsRef<str>>(
        client_id: impl Into<String>,
        resources: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut app = Self {
            client_id: client_id.into(),
            resources: Vec::new(),
        };
        app.update_resources(resources);
        app
    }

    /// Returns the normalized resources.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Adds resources not yet covered; returns whether any was added.
    pub fn update_resources<S: AsRef<str>>(&mut self, resources: impl IntoIterator<Item = S>) -> bool {
        let before = self.resources.len();
        for resource in resources {
            let resource = normalize_resource(resource.as_ref());
            if !resource.is_empty() && !self.resources.contains(&resource) {
                self.resources.push(resource);
            }
        }
        self.resources.len() != before
    }

    /// Returns whether `resource` is this app's client id or falls under one of its resources.
    pub fn matches(&self, resource: &str) -> bool {
        let resource = normalize_resource(resource);
        resource == self.client_id.to_lowercase()
            || self.resources.iter().any(|registered| {
                resource
                    .strip_prefix(registered.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
            })
    }
}
