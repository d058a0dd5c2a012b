//! Startup configuration of the portal core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Configuration load and validation failures.
pub enum ConfigError {
    /// The configuration document is not valid JSON for [`CoreConfig`].
    #[error("invalid configuration document: {0}")]
    Parse(String),
    /// A field holds an unusable value.
    #[error("invalid configuration field `{field}`: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Base URLs of the backend services the containers call.
pub struct ServiceEndpoints {
    /// Portal service (app manifests).
    pub portal: String,
    /// Context service.
    pub context: String,
    /// Tasks service.
    pub tasks: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            portal: "https://pro-s-portal-ci.azurewebsites.net".to_string(),
            context: "https://pro-s-context-ci.azurewebsites.net".to_string(),
            tasks: "https://pro-s-tasks-ci.azurewebsites.net".to_string(),
        }
    }
}

impl ServiceEndpoints {
    /// Returns every endpoint, used as token resources of the portal app.
    pub fn all(&self) -> [&str; 3] {
        [
            self.portal.as_str(),
            self.context.as_str(),
            self.tasks.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Redirect-login settings.
pub struct AuthConfig {
    /// Identity provider base URL.
    pub authority: String,
    /// Directory tenant.
    pub tenant_id: String,
    /// Client id of the portal itself.
    pub client_id: String,
    /// Where the identity provider returns to; the current URL when `None`.
    pub redirect_uri: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authority: "https://login.microsoftonline.com".to_string(),
            tenant_id: "common".to_string(),
            client_id: String::new(),
            redirect_uri: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Top-level configuration consumed by [`crate::Portal::init`].
pub struct CoreConfig {
    /// Deployment environment label.
    pub environment: String,
    /// Backend services.
    pub services: ServiceEndpoints,
    /// Redirect-login settings.
    pub auth: AuthConfig,
    /// HTTP retry budget.
    pub retry: RetryPolicy,
    /// Number of contexts kept in the recent-context history.
    pub context_history_length: usize,
    /// Base key of the portal-level settings dictionary.
    pub settings_key: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            environment: "ci".to_string(),
            services: ServiceEndpoints::default(),
            auth: AuthConfig::default(),
            retry: RetryPolicy::default(),
            context_history_length: 5,
            settings_key: "portal".to_string(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON configuration document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`] when
    /// validation fails.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("services.portal", &self.services.portal)?;
        validate_url("services.context", &self.services.context)?;
        validate_url("services.tasks", &self.services.tasks)?;
        validate_url("auth.authority", &self.auth.authority)?;
        if self.auth.tenant_id.trim().is_empty() {
            return Err(invalid("auth.tenantId", "must not be empty"));
        }
        if self.retry.step_ms == 0 {
            return Err(invalid("retry.stepMs", "must be greater than zero"));
        }
        if self.context_history_length == 0 {
            return Err(invalid("contextHistoryLength", "must be greater than zero"));
        }
        if self.settings_key.trim().is_empty() {
            return Err(invalid("settingsKey", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(invalid(field, format!("`{value}` is not an http(s) URL")))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{"environment":"fprd","auth":{"clientId":"abc"},"retry":{"ceilingMs":9000}}"#,
        )
        .expect("config");

        assert_eq!(config.environment, "fprd");
        assert_eq!(config.auth.client_id, "abc");
        assert_eq!(config.auth.tenant_id, "common");
        assert_eq!(
            config.retry,
            RetryPolicy {
                ceiling_ms: 9_000,
                step_ms: 3_000
            }
        );
        assert_eq!(config.context_history_length, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = CoreConfig::from_json_str(r#"{"services":{"context":"ftp://x"}}"#)
            .expect_err("bad url");
        assert!(matches!(err, ConfigError::Invalid { field: "services.context", .. }));

        let err = CoreConfig::from_json_str(r#"{"contextHistoryLength":0}"#).expect_err("zero");
        assert!(matches!(err, ConfigError::Invalid { field: "contextHistoryLength", .. }));

        assert!(matches!(
            CoreConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
