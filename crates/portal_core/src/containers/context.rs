//! Current context, recent-context history, and per-app context links.

use std::{collections::HashMap, rc::Rc};

use portal_host::KeyValueStorage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::ContainerError;
use crate::{
    event_hub::EventHub,
    http::{HttpClient, HttpClientError},
    storage::{ReliableDictionary, StorageError},
    subscription::Subscription,
};

/// Storage key of the context dictionary.
pub const CURRENT_CONTEXT_KEY: &str = "FUSION_CURRENT_CONTEXT";

const CURRENT_KEY: &str = "current";
const HISTORY_KEY: &str = "history";
const LINKS_KEY: &str = "links";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Kind of a context, e.g. `ProjectMaster`.
pub struct ContextType {
    /// Type id.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Business object the portal is scoped to.
pub struct Context {
    /// Context id.
    pub id: String,
    /// Id in the source system.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Context kind.
    #[serde(rename = "type")]
    pub context_type: ContextType,
    /// Display title.
    pub title: String,
    /// Type-specific payload.
    #[serde(default)]
    pub value: Value,
}

/// Context selection shared by every realm and persisted across reloads.
#[derive(Clone)]
pub struct ContextManager {
    dictionary: ReliableDictionary,
    http: HttpClient,
    base_url: String,
    history_length: usize,
}

impl ContextManager {
    /// Opens the context dictionary.
    pub fn new(
        storage: Rc<dyn KeyValueStorage>,
        hub: &EventHub,
        http: HttpClient,
        base_url: &str,
        history_length: usize,
    ) -> Self {
        Self {
            dictionary: ReliableDictionary::local(CURRENT_CONTEXT_KEY, storage, hub),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            history_length: history_length.max(1),
        }
    }

    /// Returns the URL of one context.
    pub fn context_url(&self, id: &str) -> String {
        format!("{}/contexts/{id}", self.base_url)
    }

    /// Returns the current context.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn get_current_context_async(&self) -> Result<Option<Context>, ContainerError> {
        Ok(self.dictionary.get_async(CURRENT_KEY).await?)
    }

    /// Sets or clears the current context, recording it in the history.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn set_current_context_async(&self, context: Option<&Context>) -> Result<(), ContainerError> {
        match context {
            None => self.dictionary.remove_async(CURRENT_KEY).await?,
            Some(context) => {
                self.dictionary.set_async(CURRENT_KEY, context).await?;
                let mut history = self.get_history_async().await?;
                history.retain(|entry| entry.id != context.id);
                history.insert(0, context.clone());
                history.truncate(self.history_length);
                self.dictionary.set_async(HISTORY_KEY, &history).await?;
            }
        }
        Ok(())
    }

    /// Fetches the context `id` and makes it current. An unknown id yields `Ok(None)` and
    /// leaves the current context untouched.
    ///
    /// # Errors
    ///
    /// Returns request failures other than `404`, and storage failures.
    pub async fn set_current_context_by_id_async(&self, id: &str) -> Result<Option<Context>, ContainerError> {
        let context = match self.http.get_async::<Context>(&self.context_url(id), None).await {
            Ok(response) => response.data,
            Err(HttpClientError::RequestFailed(failed)) if failed.status == 404 => {
                debug!(context_id = id, "context not found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        self.set_current_context_async(Some(&context)).await?;
        Ok(Some(context))
    }

    /// Returns recent contexts, most recent first.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn get_history_async(&self) -> Result<Vec<Context>, ContainerError> {
        Ok(self
            .dictionary
            .get_async(HISTORY_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Remembers `context_id` as the last context used by `app_key`.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn link_app_context_async(&self, app_key: &str, context_id: &str) -> Result<(), ContainerError> {
        let mut links = self.links().await?;
        links.insert(app_key.to_string(), context_id.to_string());
        Ok(self.dictionary.set_async(LINKS_KEY, &links).await?)
    }

    /// Returns the context last used by `app_key`.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn get_linked_context_async(&self, app_key: &str) -> Result<Option<String>, ContainerError> {
        Ok(self.links().await?.remove(app_key))
    }

    async fn links(&self) -> Result<HashMap<String, String>, StorageError> {
        Ok(self
            .dictionary
            .get_async(LINKS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Registers a handler receiving the current context after every dictionary change.
    pub fn on_current_context_changed(&self, handler: impl Fn(Option<&Context>) + 'static) -> Subscription {
        self.dictionary.on_change(move |object| {
            let current = object
                .get(CURRENT_KEY)
                .and_then(|value| serde_json::from_value::<Context>(value.clone()).ok());
            handler(current.as_ref());
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;
    use portal_host::{HttpResponse as RawResponse, MemoryHost};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::http::{AnonymousTokenAcquirer, RetryPolicy};

    fn context(id: &str) -> Context {
        Context {
            id: id.to_string(),
            external_id: None,
            context_type: ContextType {
                id: "ProjectMaster".to_string(),
            },
            title: format!("Project {id}"),
            value: Value::Null,
        }
    }

    fn manager(host: &MemoryHost, history_length: usize) -> ContextManager {
        let hub = EventHub::new();
        let services = host.services();
        let http = HttpClient::new(&services, &hub, Rc::new(AnonymousTokenAcquirer), RetryPolicy::default());
        ContextManager::new(services.storage, &hub, http, "https://context/", history_length)
    }

    #[test]
    fn history_is_bounded_recent_first_and_deduplicated() {
        let host = MemoryHost::default();
        let contexts = manager(&host, 3);
        for id in ["a", "b", "a", "c", "d"] {
            block_on(contexts.set_current_context_async(Some(&context(id)))).expect("set");
        }

        let ids: Vec<String> = block_on(contexts.get_history_async())
            .expect("history")
            .into_iter()
            .map(|context| context.id)
            .collect();
        assert_eq!(ids, vec!["d", "c", "a"]);
        assert_eq!(
            block_on(contexts.get_current_context_async()).expect("current").map(|c| c.id),
            Some("d".to_string())
        );
    }

    #[test]
    fn fetch_by_id_sets_current_and_unknown_id_is_none() {
        let host = MemoryHost::default();
        host.transport.enqueue(
            "https://context/contexts/p1",
            RawResponse::json(&json!({
                "id": "p1",
                "type": {"id": "ProjectMaster"},
                "title": "Project p1"
            })),
        );
        host.transport
            .enqueue("https://context/contexts/gone", RawResponse::new(404));
        let contexts = manager(&host, 5);

        let fetched = block_on(contexts.set_current_context_by_id_async("p1")).expect("fetch");
        assert_eq!(fetched, Some(context("p1")));

        assert_eq!(
            block_on(contexts.set_current_context_by_id_async("gone")).expect("missing"),
            None
        );
        assert_eq!(
            block_on(contexts.get_current_context_async()).expect("current"),
            Some(context("p1"))
        );
    }

    #[test]
    fn links_and_change_events() {
        let host = MemoryHost::default();
        let contexts = manager(&host, 5);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = contexts.on_current_context_changed(move |current| {
            sink.borrow_mut().push(current.map(|c| c.id.clone()))
        });

        block_on(contexts.link_app_context_async("meetings", "p9")).expect("link");
        block_on(contexts.set_current_context_async(Some(&context("p9")))).expect("set");
        block_on(contexts.set_current_context_async(None)).expect("clear");

        assert_eq!(
            block_on(contexts.get_linked_context_async("meetings")).expect("linked"),
            Some("p9".to_string())
        );
        assert_eq!(
            *seen.borrow(),
            vec![None, Some("p9".to_string()), Some("p9".to_string()), None]
        );
    }
}
