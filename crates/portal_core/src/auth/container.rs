//! Registered apps and redirect-based token acquisition.
//!
//! Tokens are never refreshed silently: when no valid token is cached the whole top-level
//! window is sent to the identity provider and the current call gets `None`. The callback page
//! hands the returned fragment to [`AuthContainer::handle_window_callback_async`].

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use portal_host::{KeyValueStorage, NavigationService};
use tracing::{debug, info};

use super::{
    app::AuthApp,
    cache::{AuthCache, AuthNonce},
    error::AuthError,
    token::{AuthToken, AuthUser},
};
use crate::{
    config::AuthConfig,
    distributed_state::DistributedState,
    event_hub::EventHub,
    http::{TokenAcquirer, TokenFuture},
};

/// Topic of the shared app registry.
pub const AUTH_APPS_TOPIC: &str = "AuthContainer.apps";

struct AuthInner {
    config: AuthConfig,
    apps: DistributedState<Vec<AuthApp>>,
    cache: AuthCache,
    navigation: Rc<dyn NavigationService>,
    redirecting: RefCell<HashSet<String>>,
}

/// Auth entry point shared by every realm on the hub.
#[derive(Clone)]
pub struct AuthContainer {
    inner: Rc<AuthInner>,
}

impl AuthContainer {
    /// Creates the container.
    pub fn new(
        config: AuthConfig,
        storage: Rc<dyn KeyValueStorage>,
        navigation: Rc<dyn NavigationService>,
        hub: &EventHub,
    ) -> Self {
        Self {
            inner: Rc::new(AuthInner {
                config,
                apps: DistributedState::new(AUTH_APPS_TOPIC, Vec::new(), hub),
                cache: AuthCache::new(storage, hub),
                navigation,
                redirecting: RefCell::new(HashSet::new()),
            }),
        }
    }

    /// Returns the auth cache.
    pub fn cache(&self) -> &AuthCache {
        &self.inner.cache
    }

    /// Registers `client_id` or adds resources to an existing registration.
    pub async fn register_app_async<S: AsRef<str>>(
        &self,
        client_id: &str,
        resources: impl IntoIterator<Item = S>,
    ) -> AuthApp {
        self.register_app(client_id, resources)
    }

    /// Synchronous form of [`AuthContainer::register_app_async`].
    pub fn register_app<S: AsRef<str>>(
        &self,
        client_id: &str,
        resources: impl IntoIterator<Item = S>,
    ) -> AuthApp {
        let mut apps = self.inner.apps.state();
        let app = match apps.iter_mut().find(|app| app.client_id == client_id) {
            Some(existing) => {
                if !existing.update_resources(resources) {
                    return existing.clone();
                }
                existing.clone()
            }
            None => {
                let app = AuthApp::new(client_id, resources);
                apps.push(app.clone());
                app
            }
        };
        self.inner.apps.set_state(apps);
        app
    }

    /// Returns the app covering `resource` (a URL or client id).
    pub fn resolve_app(&self, resource: &str) -> Option<AuthApp> {
        self.inner
            .apps
            .with_state(|apps| apps.iter().find(|app| app.matches(resource)).cloned())
    }

    /// Returns every registered app.
    pub fn apps(&self) -> Vec<AuthApp> {
        self.inner.apps.state()
    }

    /// Returns a cached, unexpired token for `resource`; otherwise starts a redirect login
    /// and returns `None`.
    ///
    /// Only the first miss per client redirects; later misses wait on that login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AppNotFound`] for unregistered resources, or cache and navigation
    /// failures.
    pub async fn acquire_token_async(&self, resource: &str) -> Result<Option<String>, AuthError> {
        let app = self
            .resolve_app(resource)
            .ok_or_else(|| AuthError::AppNotFound {
                resource: resource.to_string(),
            })?;
        if let Some(token) = self.inner.cache.get_token_async(&app.client_id).await? {
            if token.is_valid() {
                return Ok(Some(token.original_token));
            }
            debug!(client_id = %app.client_id, "cached token expired");
        }
        if self.inner.redirecting.borrow().contains(&app.client_id) {
            debug!(client_id = %app.client_id, "login already in progress");
            return Ok(None);
        }
        self.start_login(&app.client_id, Some(resource)).await?;
        Ok(None)
    }

    /// Sends the top-level window to the identity provider for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AppNotFound`] for unregistered clients, or cache and navigation
    /// failures.
    pub async fn login_async(&self, client_id: &str) -> Result<(), AuthError> {
        let app = self
            .resolve_app(client_id)
            .ok_or_else(|| AuthError::AppNotFound {
                resource: client_id.to_string(),
            })?;
        self.start_login(&app.client_id, None).await
    }

    async fn start_login(&self, client_id: &str, resource: Option<&str>) -> Result<(), AuthError> {
        self.inner.cache.remove_pending_nonces_async(client_id).await?;
        let nonce = AuthNonce::create_new(client_id, resource);
        self.inner.cache.store_nonce_async(&nonce).await?;
        let current_url = self.inner.navigation.current_url();
        if let Some(url) = &current_url {
            self.inner.cache.store_redirect_url_async(url).await?;
        }

        let redirect_uri = self
            .inner
            .config
            .redirect_uri
            .clone()
            .or(current_url)
            .unwrap_or_default();
        let url = self.authorize_url(client_id, &redirect_uri, &nonce.key)?;
        info!(client_id, "redirecting to login");
        self.inner.redirecting.borrow_mut().insert(client_id.to_string());
        let navigated = self.navigate(&url).await;
        if navigated.is_err() {
            self.inner.redirecting.borrow_mut().remove(client_id);
        }
        navigated
    }

    fn authorize_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        nonce: &str,
    ) -> Result<String, AuthError> {
        let query = serde_urlencoded::to_string([
            ("client_id", client_id),
            ("response_type", "id_token"),
            ("redirect_uri", redirect_uri),
            ("nonce", nonce),
            ("state", nonce),
        ])
        .map_err(|err| AuthError::AuthorizeUrl(err.to_string()))?;
        Ok(format!(
            "{}/{}/oauth2/authorize?{query}",
            self.inner.config.authority.trim_end_matches('/'),
            self.inner.config.tenant_id
        ))
    }

    /// Completes a login from the callback URL fragment.
    ///
    /// Returns `false` when the fragment carries no id token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NonceNotFound`] or [`AuthError::NonceMismatch`] for unknown or
    /// mismatched logins, [`AuthError::InvalidToken`] for undecodable tokens, or cache and
    /// navigation failures.
    pub async fn handle_window_callback_async(&self, fragment: &str) -> Result<bool, AuthError> {
        let params: HashMap<String, String> =
            serde_urlencoded::from_str(fragment.trim_start_matches('#')).unwrap_or_default();
        let Some(id_token) = params.get("id_token") else {
            return Ok(false);
        };
        let state = params
            .get("state")
            .ok_or(AuthError::MissingCallbackParameter("state"))?;

        let nonce = AuthNonce::resolve_async(&self.inner.cache, state).await?;
        let token = AuthToken::parse(id_token)?;
        if token.nonce.as_deref().is_some_and(|value| value != nonce.key) {
            return Err(AuthError::NonceMismatch {
                expected: nonce.key,
            });
        }

        self.inner
            .cache
            .store_token_async(&nonce.client_id, &token)
            .await?;
        self.inner.cache.remove_pending_nonces_async(&nonce.client_id).await?;
        self.inner.redirecting.borrow_mut().remove(&nonce.client_id);
        let user = match self.inner.cache.get_user_async().await? {
            Some(existing) => existing.merge_with(&token.to_user()),
            None => token.to_user(),
        };
        self.inner.cache.store_user_async(&user).await?;

        if let Some(url) = self.inner.cache.take_redirect_url_async().await? {
            self.navigate(&url).await?;
        }
        Ok(true)
    }

    /// Returns the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns cache failures.
    pub async fn get_cached_user_async(&self) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.inner.cache.get_user_async().await?)
    }

    /// Forgets all auth state and signs out at the identity provider.
    ///
    /// # Errors
    ///
    /// Returns cache and navigation failures.
    pub async fn logout_async(&self) -> Result<(), AuthError> {
        self.inner.cache.clear_async().await?;
        self.inner.redirecting.borrow_mut().clear();
        let url = format!(
            "{}/{}/oauth2/logout",
            self.inner.config.authority.trim_end_matches('/'),
            self.inner.config.tenant_id
        );
        self.navigate(&url).await
    }

    async fn navigate(&self, url: &str) -> Result<(), AuthError> {
        self.inner
            .navigation
            .navigate(url)
            .await
            .map_err(AuthError::Navigation)
    }
}

impl TokenAcquirer for AuthContainer {
    fn acquire_token_async<'a>(&'a self, resource: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            AuthContainer::acquire_token_async(self, resource)
                .await
                .map_err(|err| err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use futures::executor::block_on;
    use portal_host::{MemoryKeyValueStorage, MemoryNavigationService};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::auth::token::encode_test_token;

    struct Fixture {
        navigation: MemoryNavigationService,
        auth: AuthContainer,
    }

    fn fixture() -> Fixture {
        let navigation = MemoryNavigationService::at("https://portal/apps/meetings");
        let auth = AuthContainer::new(
            AuthConfig {
                tenant_id: "tenant".to_string(),
                ..AuthConfig::default()
            },
            Rc::new(MemoryKeyValueStorage::default()),
            Rc::new(navigation.clone()),
            &EventHub::new(),
        );
        Fixture { navigation, auth }
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        let params: HashMap<String, String> = serde_urlencoded::from_str(query).ok()?;
        params.get(name).cloned()
    }

    #[test]
    fn unknown_resource_is_an_error() {
        let Fixture { auth, .. } = fixture();
        assert_eq!(
            block_on(auth.acquire_token_async("https://nowhere")),
            Err(AuthError::AppNotFound {
                resource: "https://nowhere".to_string()
            })
        );
    }

    #[test]
    fn missing_token_redirects_and_callback_completes_login() {
        let Fixture { navigation, auth } = fixture();
        block_on(auth.register_app_async("client-a", ["https://api.example.com"]));

        let token = block_on(auth.acquire_token_async("https://api.example.com/x")).expect("acquire");
        assert_eq!(token, None);

        let authorize = navigation.history().pop().expect("redirected");
        assert!(authorize.starts_with("https://login.microsoftonline.com/tenant/oauth2/authorize?"));
        assert_eq!(query_param(&authorize, "client_id").as_deref(), Some("client-a"));
        let state = query_param(&authorize, "state").expect("state");

        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let jwt = encode_test_token(&json!({
            "oid": "user-1",
            "exp": exp,
            "roles": ["Reader"],
            "name": "Ada",
            "nonce": state.as_str()
        }));
        let fragment = format!("#id_token={jwt}&state={state}");
        assert!(block_on(auth.handle_window_callback_async(&fragment)).expect("callback"));

        assert_eq!(
            navigation.current_url().as_deref(),
            Some("https://portal/apps/meetings")
        );
        assert_eq!(
            block_on(auth.acquire_token_async("https://api.example.com/x")).expect("acquire"),
            Some(jwt)
        );
        let user = block_on(auth.get_cached_user_async()).expect("user").expect("signed in");
        assert_eq!(user.roles, vec!["Reader"]);
    }

    #[test]
    fn repeated_misses_keep_one_pending_login() {
        let Fixture { navigation, auth } = fixture();
        block_on(auth.register_app_async("client-a", ["https://api.example.com"]));

        for _ in 0..5 {
            assert_eq!(
                block_on(auth.acquire_token_async("https://api.example.com/x")).expect("acquire"),
                None
            );
        }

        assert_eq!(navigation.history().len(), 1);
        let pending = block_on(auth.cache().pending_nonces_async("client-a")).expect("pending");
        assert_eq!(pending.len(), 1);
        let authorize = navigation.history().pop().expect("redirected");
        assert_eq!(query_param(&authorize, "state"), Some(pending[0].key.clone()));
    }

    #[test]
    fn reload_replaces_abandoned_login() {
        let hub = EventHub::new();
        let storage: Rc<dyn KeyValueStorage> = Rc::new(MemoryKeyValueStorage::default());
        let navigation = MemoryNavigationService::at("https://portal/apps/meetings");
        let open = || {
            let auth = AuthContainer::new(
                AuthConfig::default(),
                Rc::clone(&storage),
                Rc::new(navigation.clone()),
                &hub,
            );
            auth.register_app("client-a", ["https://api.example.com"]);
            auth
        };

        let first = open();
        block_on(first.acquire_token_async("https://api.example.com/x")).expect("acquire");
        let abandoned = block_on(first.cache().pending_nonces_async("client-a")).expect("pending");

        let reloaded = open();
        block_on(reloaded.acquire_token_async("https://api.example.com/x")).expect("acquire");
        let pending = block_on(reloaded.cache().pending_nonces_async("client-a")).expect("pending");

        assert_eq!(navigation.history().len(), 2);
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].key, abandoned[0].key);
    }

    #[test]
    fn authorize_url_encodes_redirect_target() {
        let Fixture { auth, .. } = fixture();
        let url = auth
            .authorize_url("client-a", "https://portal/apps?x=1&y=2", "nonce-1")
            .expect("url");
        assert_eq!(
            query_param(&url, "redirect_uri").as_deref(),
            Some("https://portal/apps?x=1&y=2")
        );
        assert_eq!(query_param(&url, "state").as_deref(), Some("nonce-1"));
    }

    #[test]
    fn callback_with_unknown_state_fails() {
        let Fixture { auth, .. } = fixture();
        let jwt = encode_test_token(&json!({"sub": "u", "exp": 4_000_000_000_i64}));
        let err = block_on(auth.handle_window_callback_async(&format!("id_token={jwt}&state=nope")))
            .expect_err("unknown nonce");
        assert_eq!(
            err,
            AuthError::NonceNotFound {
                key: "nope".to_string()
            }
        );
        assert!(!block_on(auth.handle_window_callback_async("#error=denied")).expect("no token"));
    }

    #[test]
    fn registration_is_shared_across_realms() {
        let hub = EventHub::new();
        let storage: Rc<dyn KeyValueStorage> = Rc::new(MemoryKeyValueStorage::default());
        let navigation: Rc<dyn NavigationService> = Rc::new(MemoryNavigationService::default());
        let host = AuthContainer::new(AuthConfig::default(), Rc::clone(&storage), Rc::clone(&navigation), &hub);
        let app = AuthContainer::new(AuthConfig::default(), storage, navigation, &hub);

        block_on(host.register_app_async("client", ["https://A/"]));
        block_on(host.register_app_async("client", ["https://b"]));
        assert_eq!(app.apps().len(), 1);
        assert_eq!(
            app.resolve_app("https://b/api").map(|app| app.resources().to_vec()),
            Some(vec!["https://a".to_string(), "https://b".to_string()])
        );
    }

    #[test]
    fn logout_clears_cache_and_navigates() {
        let Fixture { navigation, auth } = fixture();
        block_on(auth.cache().store_redirect_url_async("https://portal")).expect("store");

        block_on(auth.logout_async()).expect("logout");
        assert_eq!(block_on(auth.cache().take_redirect_url_async()).expect("take"), None);
        assert_eq!(
            navigation.current_url().as_deref(),
            Some("https://login.microsoftonline.com/tenant/oauth2/logout")
        );
    }
}
