//! The signed-in user's tasks.

use chrono::{DateTime, Utc};
use portal_host::HttpMethod;
use serde::{Deserialize, Serialize};

use super::error::ContainerError;
use crate::{
    distributed_state::DistributedState,
    event_hub::EventHub,
    http::{HttpClient, ListParser},
    subscription::Subscription,
};

/// Topic of the shared task list.
pub const TASKS_TOPIC: &str = "TasksContainer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One assigned task.
pub struct Task {
    /// Task id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Deep link into the source system.
    #[serde(default)]
    pub url: Option<String>,
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
    /// Source-system state.
    #[serde(default)]
    pub state: Option<String>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Task list shared by every realm.
#[derive(Clone)]
pub struct TasksContainer {
    tasks: DistributedState<Vec<Task>>,
    http: HttpClient,
    base_url: String,
}

impl TasksContainer {
    /// Joins the task list on `hub`.
    pub fn new(hub: &EventHub, http: HttpClient, base_url: &str) -> Self {
        Self {
            tasks: DistributedState::new(TASKS_TOPIC, Vec::new(), hub),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the tasks endpoint.
    pub fn tasks_url(&self) -> String {
        format!("{}/persons/me/tasks", self.base_url)
    }

    /// Reloads the task list. Unparseable bodies yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns request failures.
    pub async fn refresh_tasks_async(&self) -> Result<Vec<Task>, ContainerError> {
        let response = self
            .http
            .fetch_async(HttpMethod::Get, &self.tasks_url(), None, ListParser::<Task>::default())
            .await?;
        self.tasks.set_state(response.data.clone());
        Ok(response.data)
    }

    /// Returns the last loaded tasks.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.state()
    }

    /// Registers a handler receiving the list after every refresh in any realm.
    pub fn on_change(&self, handler: impl Fn(&Vec<Task>) + 'static) -> Subscription {
        self.tasks.on_change(handler)
    }
}
