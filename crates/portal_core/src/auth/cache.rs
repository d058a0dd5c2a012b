//! Persisted auth state: tokens per client, the signed-in user, redirect target and pending
//! nonces, all in one dictionary.

use std::rc::Rc;

use portal_host::KeyValueStorage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    error::AuthError,
    token::{AuthToken, AuthUser},
};
use crate::{
    event_hub::EventHub,
    storage::{ReliableDictionary, StorageError},
};

/// Storage key of the auth dictionary.
pub const AUTH_CACHE_KEY: &str = "FUSION_AUTH_CACHE";

const USER_KEY: &str = "USER";
const REDIRECT_URL_KEY: &str = "REDIRECT_URL";

fn token_key(client_id: &str) -> String {
    format!("TOKEN:{client_id}")
}

const NONCE_PREFIX: &str = "NONCE:";

fn nonce_key(key: &str) -> String {
    format!("{NONCE_PREFIX}{key}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Pending login attempt, kept until its callback resolves it.
pub struct AuthNonce {
    /// Random key sent as `nonce` and `state`.
    pub key: String,
    /// Client the login is for.
    pub client_id: String,
    /// Resource that triggered the login.
    pub resource: Option<String>,
}

impl AuthNonce {
    /// Creates a nonce with a fresh key.
    pub fn create_new(client_id: &str, resource: Option<&str>) -> Self {
        Self {
            key: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            resource: resource.map(str::to_string),
        }
    }

    /// Looks up and removes the nonce stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NonceNotFound`] for unknown keys, or storage failures.
    pub async fn resolve_async(cache: &AuthCache, key: &str) -> Result<AuthNonce, AuthError> {
        let nonce = cache
            .get_nonce_async(key)
            .await?
            .ok_or_else(|| AuthError::NonceNotFound {
                key: key.to_string(),
            })?;
        cache.remove_nonce_async(key).await?;
        Ok(nonce)
    }
}

/// Typed accessors over the auth dictionary.
#[derive(Clone)]
pub struct AuthCache {
    dictionary: ReliableDictionary,
}

impl AuthCache {
    /// Opens the auth dictionary.
    pub fn new(storage: Rc<dyn KeyValueStorage>, hub: &EventHub) -> Self {
        Self {
            dictionary: ReliableDictionary::local(AUTH_CACHE_KEY, storage, hub),
        }
    }

    /// Stores `token` for `client_id`.
    pub async fn store_token_async(
        &self,
        client_id: &str,
        token: &AuthToken,
    ) -> Result<(), StorageError> {
        self.dictionary.set_async(&token_key(client_id), token).await
    }

    /// Returns the stored token for `client_id`, valid or not.
    pub async fn get_token_async(&self, client_id: &str) -> Result<Option<AuthToken>, StorageError> {
        self.dictionary.get_async(&token_key(client_id)).await
    }

    /// Stores the signed-in user.
    pub async fn store_user_async(&self, user: &AuthUser) -> Result<(), StorageError> {
        self.dictionary.set_async(USER_KEY, user).await
    }

    /// Returns the signed-in user.
    pub async fn get_user_async(&self) -> Result<Option<AuthUser>, StorageError> {
        self.dictionary.get_async(USER_KEY).await
    }

    /// Remembers where to return after login.
    pub async fn store_redirect_url_async(&self, url: &str) -> Result<(), StorageError> {
        self.dictionary.set_async(REDIRECT_URL_KEY, url).await
    }

    /// Returns and forgets the post-login redirect target.
    pub async fn take_redirect_url_async(&self) -> Result<Option<String>, StorageError> {
        let url = self.dictionary.get_async(REDIRECT_URL_KEY).await?;
        if url.is_some() {
            self.dictionary.remove_async(REDIRECT_URL_KEY).await?;
        }
        Ok(url)
    }

    /// Stores a pending nonce.
    pub async fn store_nonce_async(&self, nonce: &AuthNonce) -> Result<(), StorageError> {
        self.dictionary.set_async(&nonce_key(&nonce.key), nonce).await
    }

    /// Returns a pending nonce.
    pub async fn get_nonce_async(&self, key: &str) -> Result<Option<AuthNonce>, StorageError> {
        self.dictionary.get_async(&nonce_key(key)).await
    }

    /// Removes a pending nonce.
    pub async fn remove_nonce_async(&self, key: &str) -> Result<(), StorageError> {
        self.dictionary.remove_async(&nonce_key(key)).await
    }

    /// Returns the pending nonces of `client_id`.
    pub async fn pending_nonces_async(&self, client_id: &str) -> Result<Vec<AuthNonce>, StorageError> {
        let mut pending = Vec::new();
        for key in self.dictionary.keys_async().await? {
            if !key.starts_with(NONCE_PREFIX) {
                continue;
            }
            if let Some(nonce) = self.dictionary.get_async::<AuthNonce>(&key).await? {
                if nonce.client_id == client_id {
                    pending.push(nonce);
                }
            }
        }
        Ok(pending)
    }

    /// Removes every pending nonce of `client_id`.
    pub async fn remove_pending_nonces_async(&self, client_id: &str) -> Result<(), StorageError> {
        for nonce in self.pending_nonces_async(client_id).await? {
            self.remove_nonce_async(&nonce.key).await?;
        }
        Ok(())
    }

    /// Forgets every token, the user, and pending logins.
    pub async fn clear_async(&self) -> Result<(), StorageError> {
        self.dictionary.clear_async().await
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use portal_host::MemoryKeyValueStorage;
    use pretty_assertions::assert_eq;

    use super::*;

    fn cache(storage: &MemoryKeyValueStorage) -> AuthCache {
        AuthCache::new(Rc::new(storage.clone()), &EventHub::new())
    }

    #[test]
    fn nonce_resolves_once() {
        let storage = MemoryKeyValueStorage::default();
        let cache = cache(&storage);
        let nonce = AuthNonce::create_new("client", Some("https://api"));
        block_on(cache.store_nonce_async(&nonce)).expect("store");

        let resolved = block_on(AuthNonce::resolve_async(&cache, &nonce.key)).expect("resolve");
        assert_eq!(resolved, nonce);
        assert!(matches!(
            block_on(AuthNonce::resolve_async(&cache, &nonce.key)),
            Err(AuthError::NonceNotFound { .. })
        ));
    }

    #[test]
    fn pending_nonces_are_scoped_to_client() {
        let storage = MemoryKeyValueStorage::default();
        let cache = cache(&storage);
        for client_id in ["a", "a", "b"] {
            block_on(cache.store_nonce_async(&AuthNonce::create_new(client_id, None))).expect("store");
        }
        assert_eq!(block_on(cache.pending_nonces_async("a")).expect("pending").len(), 2);

        block_on(cache.remove_pending_nonces_async("a")).expect("remove");
        assert!(block_on(cache.pending_nonces_async("a")).expect("pending").is_empty());
        let remaining = block_on(cache.pending_nonces_async("b")).expect("pending");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].client_id, "b");
    }

    #[test]
    fn redirect_url_is_taken_once_and_persisted() {
        let storage = MemoryKeyValueStorage::default();
        block_on(cache(&storage).store_redirect_url_async("https://portal/apps/x")).expect("store");

        let reopened = cache(&storage);
        assert_eq!(
            block_on(reopened.take_redirect_url_async()).expect("take"),
            Some("https://portal/apps/x".to_string())
        );
        assert_eq!(block_on(reopened.take_redirect_url_async()).expect("take"), None);
    }
}
