//! Notification routing to host-registered presenters, with a persisted log.

use std::{fmt, rc::Rc, time::Duration};

use chrono::{DateTime, Utc};
use futures::future::{select, Either, LocalBoxFuture};
use portal_host::{KeyValueStorage, Timer};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::NotificationError;
use crate::{
    distributed_state::DistributedState, event_hub::EventHub, storage::ReliableDictionary,
    subscription::Subscription,
};

/// Storage key of the notification log.
pub const NOTIFICATION_CENTER_KEY: &str = "NOTIFICATION_CENTER";
/// Topic of the shared presenter registry.
pub const NOTIFICATION_PRESENTERS_TOPIC: &str = "NotificationCenter.presenters";

const NOTIFICATIONS_KEY: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Urgency, which selects the presenter.
pub enum NotificationLevel {
    /// Passive, e.g. a snackbar.
    Low,
    /// Needs attention, e.g. a banner.
    Medium,
    /// Blocking, e.g. a dialog.
    High,
}

impl NotificationLevel {
    /// Returns the stable token for the level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Notification requested by a consumer.
pub struct NotificationRequest {
    /// Urgency.
    pub level: NotificationLevel,
    /// Headline.
    pub title: String,
    /// Optional detail text.
    #[serde(default)]
    pub body: Option<String>,
    /// Auto-dismiss delay in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Label of the confirming action.
    #[serde(default)]
    pub confirm_label: Option<String>,
    /// Label of the cancelling action.
    #[serde(default)]
    pub cancel_label: Option<String>,
}

impl NotificationRequest {
    /// Creates a request with only a level and title.
    pub fn new(level: NotificationLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: None,
            timeout_ms: None,
            confirm_label: None,
            cancel_label: None,
        }
    }

    /// Sets the auto-dismiss delay.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// How the user resolved a notification.
pub enum NotificationResponse {
    /// Confirming action chosen.
    Confirmed,
    /// Cancelling action chosen.
    Cancelled,
    /// Closed without a choice.
    Dismissed,
    /// Auto-dismissed after its timeout.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Logged notification.
pub struct Notification {
    /// Unique id.
    pub id: String,
    /// Original request.
    pub request: NotificationRequest,
    /// When it was sent.
    pub created: DateTime<Utc>,
    /// Resolution, once known.
    #[serde(default)]
    pub response: Option<NotificationResponse>,
}

type Presenter = Rc<dyn Fn(NotificationRequest) -> LocalBoxFuture<'static, NotificationResponse>>;

#[derive(Clone)]
struct PresenterEntry {
    id: Uuid,
    level: NotificationLevel,
    present: Presenter,
}

/// Routes notifications to the presenter registered for their level.
#[derive(Clone)]
pub struct NotificationCenter {
    dictionary: ReliableDictionary,
    presenters: DistributedState<Vec<PresenterEntry>>,
    timer: Rc<dyn Timer>,
}

impl NotificationCenter {
    /// Opens the notification log and joins the presenter registry.
    pub fn new(storage: Rc<dyn KeyValueStorage>, timer: Rc<dyn Timer>, hub: &EventHub) -> Self {
        Self {
            dictionary: ReliableDictionary::local(NOTIFICATION_CENTER_KEY, storage, hub),
            presenters: DistributedState::new(NOTIFICATION_PRESENTERS_TOPIC, Vec::new(), hub),
            timer,
        }
    }

    /// Registers the presenter for `level`; the latest registration wins until disposed.
    pub fn register_presenter(
        &self,
        level: NotificationLevel,
        present: impl Fn(NotificationRequest) -> LocalBoxFuture<'static, NotificationResponse> + 'static,
    ) -> Subscription {
        let id = Uuid::new_v4();
        self.presenters.update(|presenters| {
            presenters.push(PresenterEntry {
                id,
                level,
                present: Rc::new(present),
            })
        });
        let presenters = self.presenters.clone();
        Subscription::new(move || {
            presenters.update(|presenters| presenters.retain(|entry| entry.id != id));
        })
    }

    /// Returns whether a presenter handles `level`.
    pub fn has_presenter(&self, level: NotificationLevel) -> bool {
        self.presenter(level).is_some()
    }

    fn presenter(&self, level: NotificationLevel) -> Option<Presenter> {
        self.presenters.with_state(|presenters| {
            presenters
                .iter()
                .rev()
                .find(|entry| entry.level == level)
                .map(|entry| Rc::clone(&entry.present))
        })
    }

    /// Presents `request`, logs it, and resolves with the user's response.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::NoPresenter`] when nothing handles the level, or log
    /// storage failures.
    pub async fn send_notification_async(
        &self,
        request: NotificationRequest,
    ) -> Result<NotificationResponse, NotificationError> {
        let present = self
            .presenter(request.level)
            .ok_or(NotificationError::NoPresenter(request.level))?;

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            request: request.clone(),
            created: Utc::now(),
            response: None,
        };
        let mut log = self.get_notifications_async().await?;
        log.push(notification.clone());
        self.dictionary.set_async(NOTIFICATIONS_KEY, &log).await?;

        let presented = present(request.clone());
        let response = match request.timeout_ms {
            None => presented.await,
            Some(timeout) => {
                let expiry = self.timer.sleep(Duration::from_millis(timeout));
                match select(presented, expiry).await {
                    Either::Left((response, _)) => response,
                    Either::Right(_) => {
                        debug!(id = %notification.id, "notification timed out");
                        NotificationResponse::TimedOut
                    }
                }
            }
        };

        let mut log = self.get_notifications_async().await?;
        if let Some(entry) = log.iter_mut().find(|entry| entry.id == notification.id) {
            entry.response = Some(response);
        }
        self.dictionary.set_async(NOTIFICATIONS_KEY, &log).await?;
        Ok(response)
    }

    /// Returns the notification log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn get_notifications_async(&self) -> Result<Vec<Notification>, NotificationError> {
        Ok(self
            .dictionary
            .get_async(NOTIFICATIONS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Empties the notification log.
    ///
    /// # Errors
    ///
    /// Returns storage failures.
    pub async fn clear_notifications_async(&self) -> Result<(), NotificationError> {
        Ok(self.dictionary.remove_async(NOTIFICATIONS_KEY).await?)
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::block_on, future::FutureExt};
    use portal_host::{InstantTimer, MemoryKeyValueStorage, NeverTimer};
    use pretty_assertions::assert_eq;

    use super::*;

    fn center(timer: Rc<dyn Timer>) -> NotificationCenter {
        NotificationCenter::new(Rc::new(MemoryKeyValueStorage::default()), timer, &EventHub::new())
    }

    #[test]
    fn missing_presenter_is_a_hard_failure() {
        let center = center(Rc::new(NeverTimer));
        let err = block_on(center.send_notification_async(NotificationRequest::new(
            NotificationLevel::High,
            "Delete?",
        )))
        .expect_err("no presenter");
        assert_eq!(err.to_string(), "No presenter for notification level high");
    }

    #[test]
    fn presenter_response_is_logged() {
        let center = center(Rc::new(NeverTimer));
        let _presenter = center.register_presenter(NotificationLevel::Medium, |_| {
            async { NotificationResponse::Confirmed }.boxed_local()
        });

        let response = block_on(center.send_notification_async(NotificationRequest::new(
            NotificationLevel::Medium,
            "Saved",
        )))
        .expect("sent");
        assert_eq!(response, NotificationResponse::Confirmed);

        let log = block_on(center.get_notifications_async()).expect("log");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].request.title, "Saved");
        assert_eq!(log[0].response, Some(NotificationResponse::Confirmed));

        block_on(center.clear_notifications_async()).expect("clear");
        assert!(block_on(center.get_notifications_async()).expect("log").is_empty());
    }

    #[test]
    fn timeout_auto_dismisses() {
        let timer = InstantTimer::default();
        let center = center(Rc::new(timer.clone()));
        let _presenter = center.register_presenter(NotificationLevel::Low, |_| {
            futures::future::pending().boxed_local()
        });

        let response = block_on(center.send_notification_async(
            NotificationRequest::new(NotificationLevel::Low, "Copied").with_timeout(Duration::from_secs(5)),
        ))
        .expect("sent");
        assert_eq!(response, NotificationResponse::TimedOut);
        assert_eq!(timer.requested(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn disposing_presenter_unregisters_it_everywhere() {
        let hub = EventHub::new();
        let storage: Rc<dyn KeyValueStorage> = Rc::new(MemoryKeyValueStorage::default());
        let host = NotificationCenter::new(Rc::clone(&storage), Rc::new(NeverTimer), &hub);
        let app = NotificationCenter::new(storage, Rc::new(NeverTimer), &hub);

        let presenter = host.register_presenter(NotificationLevel::High, |_| {
            async { NotificationResponse::Dismissed }.boxed_local()
        });
        assert!(app.has_presenter(NotificationLevel::High));
        drop(presenter);
        assert!(!app.has_presenter(NotificationLevel::High));
    }
}
