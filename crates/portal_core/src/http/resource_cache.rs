//! Per-URL response cache and fetch-state tracker.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use portal_host::Headers;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{error::HttpClientParseError, response::HttpResponse};
use crate::{
    distributed_state::DistributedState, event_hub::EventHub, storage::parse_iso_date,
    subscription::Subscription,
};

/// Topic of the shared cache map.
pub const RESOURCE_CACHE_TOPIC: &str = "ResourceCache";
/// Topic carrying one changed entry per mutation.
pub const RESOURCE_CACHE_UPDATE_TOPIC: &str = "ResourceCache.update";

/// Response header carrying when the backend cached the payload.
pub const CACHE_AGE_HEADER: &str = "x-pp-cache-age";
/// Response header carrying the backend cache duration.
pub const CACHE_DURATION_HEADER: &str = "x-pp-cache-duration-minutes";
/// Response header naming where the payload came from.
pub const CACHE_SOURCE_HEADER: &str = "x-pp-cache-source";

/// Backend cache metadata of one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// When the backend cached the payload.
    pub age: Option<DateTime<Utc>>,
    /// Cache source label.
    pub source: Option<String>,
    /// Cache duration in minutes.
    pub duration_minutes: Option<f64>,
}

impl CacheStatus {
    /// Reads cache metadata from response headers.
    pub fn from_headers(headers: &Headers) -> Self {
        Self {
            age: headers.get(CACHE_AGE_HEADER).and_then(parse_cache_age),
            source: headers.get(CACHE_SOURCE_HEADER).map(str::to_string),
            duration_minutes: headers
                .get(CACHE_DURATION_HEADER)
                .and_then(|raw| raw.trim().parse().ok()),
        }
    }
}

fn parse_cache_age(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    parse_iso_date(raw).or_else(|| {
        DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    })
}

/// One cached URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResource {
    /// Resource URL.
    pub resource: String,
    /// Last payload, kept while a refetch runs.
    pub data: Option<Value>,
    /// Whether a fetch is in flight.
    pub is_fetching: bool,
    /// Backend cache metadata.
    pub cache_status: CacheStatus,
}

impl CachedResource {
    /// Empty entry for `resource`.
    pub fn empty(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            data: None,
            is_fetching: false,
            cache_status: CacheStatus::default(),
        }
    }
}

/// Typed view of a cached entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedCachedResource<T> {
    /// Resource URL.
    pub resource: String,
    /// Decoded payload.
    pub data: Option<T>,
    /// Whether a fetch is in flight.
    pub is_fetching: bool,
    /// Backend cache metadata.
    pub cache_status: CacheStatus,
}

/// Response cache shared by every client on the hub. Entries are never evicted.
#[derive(Clone)]
pub struct ResourceCache {
    hub: EventHub,
    entries: DistributedState<HashMap<String, CachedResource>>,
}

impl ResourceCache {
    /// Joins the cache on `hub`.
    pub fn new(hub: &EventHub) -> Self {
        Self {
            hub: hub.clone(),
            entries: DistributedState::new(RESOURCE_CACHE_TOPIC, HashMap::new(), hub),
        }
    }

    /// Returns the entry for `url`, creating an empty one when missing.
    pub async fn get_async(&self, url: &str) -> CachedResource {
        if let Some(entry) = self.entries.with_state(|entries| entries.get(url).cloned()) {
            return entry;
        }
        let entry = CachedResource::empty(url);
        self.entries.update(|entries| {
            entries.insert(url.to_string(), entry.clone());
        });
        entry
    }

    /// Returns the entry for `url` with its payload decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientParseError`] when the cached payload does not match `T`.
    pub async fn get_typed_async<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<TypedCachedResource<T>, HttpClientParseError> {
        let entry = self.get_async(url).await;
        let data = match entry.data {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value.clone()).map_err(|err| {
                HttpClientParseError {
                    url: url.to_string(),
                    status: 200,
                    message: err.to_string(),
                    body: value.to_string(),
                }
            })?),
        };
        Ok(TypedCachedResource {
            resource: entry.resource,
            data,
            is_fetching: entry.is_fetching,
            cache_status: entry.cache_status,
        })
    }

    /// Marks `url` as fetching, keeping the previous payload visible.
    pub async fn set_is_fetching_async(&self, url: &str) {
        self.mutate(url, |entry| entry.is_fetching = true);
    }

    /// Clears the fetching flag after a failed fetch.
    pub async fn clear_is_fetching_async(&self, url: &str) {
        self.mutate(url, |entry| entry.is_fetching = false);
    }

    /// Stores a fresh payload and its cache metadata.
    pub async fn update_async(&self, url: &str, response: &HttpResponse<Value>) {
        let cache_status = CacheStatus::from_headers(&response.headers);
        let data = response.data.clone();
        self.mutate(url, move |entry| {
            entry.data = Some(data);
            entry.is_fetching = false;
            entry.cache_status = cache_status;
        });
    }

    /// Registers a handler receiving each changed entry.
    pub fn on_update(&self, handler: impl Fn(&CachedResource) + 'static) -> Subscription {
        self.hub
            .register_listener::<CachedResource>(RESOURCE_CACHE_UPDATE_TOPIC, handler)
    }

    /// Returns every cached URL.
    pub fn resources(&self) -> Vec<String> {
        self.entries.with_state(|entries| entries.keys().cloned().collect())
    }

    fn mutate(&self, url: &str, f: impl FnOnce(&mut CachedResource)) {
        let mut entries = self.entries.state();
        let entry = entries
            .entry(url.to_string())
            .or_insert_with(|| CachedResource::empty(url));
        f(entry);
        let changed = entry.clone();
        self.entries.set_state(entries);
        self.hub.publish(RESOURCE_CACHE_UPDATE_TOPIC, changed);
    }
}
