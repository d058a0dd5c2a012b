//! A single typed value shared by every instance constructed with the same key on one hub.
//!
//! Construction runs a join handshake: the new instance listens on `key`, publishes a sync
//! request on `key + "InitialState"`, and only then answers sync requests itself. Existing
//! instances answer by re-publishing their current value, which the newcomer adopts.
//!
//! Every published value carries a version. An instance adopts an incoming value when its
//! version is at least the local one, so peers that already converged answer with equal
//! versions (last delivered wins) while stale answers are dropped.

use std::{cell::RefCell, rc::Rc};

use tracing::debug;

use crate::{emitter::Emitter, event_hub::EventHub, subscription::Subscription};

/// Suffix appended to a state key to form its sync-request topic.
pub const INITIAL_STATE_SUFFIX: &str = "InitialState";

/// Returns the sync-request topic for `key`.
pub fn sync_topic(key: &str) -> String {
    format!("{key}{INITIAL_STATE_SUFFIX}")
}

#[derive(Clone)]
struct StatePayload<T> {
    version: u64,
    value: T,
}

struct SyncRequest;

struct StateInner<T> {
    key: String,
    hub: EventHub,
    current: RefCell<StatePayload<T>>,
    changed: Emitter<T>,
    listeners: RefCell<Vec<Subscription>>,
}

impl<T: Clone + 'static> StateInner<T> {
    fn adopt(&self, payload: &StatePayload<T>) {
        {
            let mut current = self.current.borrow_mut();
            if payload.version < current.version {
                debug!(
                    key = %self.key,
                    incoming = payload.version,
                    local = current.version,
                    "ignoring stale distributed state"
                );
                return;
            }
            *current = payload.clone();
        }
        self.changed.emit(&payload.value);
    }

    fn broadcast(&self) {
        let payload = self.current.borrow().clone();
        self.hub.publish(&self.key, payload);
    }
}

/// Handle to one instance of a shared value.
///
/// Clones address the same instance. Dropping the last clone unregisters the instance from
/// the hub; peers keep the value.
pub struct DistributedState<T: Clone + 'static> {
    inner: Rc<StateInner<T>>,
}

impl<T: Clone + 'static> Clone for DistributedState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> DistributedState<T> {
    /// Creates an instance for `key`, reconciling with peers already on `hub`.
    ///
    /// `initial` is kept only when no peer answers the sync request.
    pub fn new(key: impl Into<String>, initial: T, hub: &EventHub) -> Self {
        let key = key.into();
        let inner = Rc::new(StateInner {
            key: key.clone(),
            hub: hub.clone(),
            current: RefCell::new(StatePayload {
                version: 0,
                value: initial,
            }),
            changed: Emitter::new(),
            listeners: RefCell::new(Vec::with_capacity(2)),
        });

        let weak = Rc::downgrade(&inner);
        let on_value = hub.register_listener::<StatePayload<T>>(&key, move |payload| {
            if let Some(inner) = weak.upgrade() {
                inner.adopt(payload);
            }
        });
        inner.listeners.borrow_mut().push(on_value);

        let sync = sync_topic(&key);
        hub.publish(&sync, SyncRequest);

        let weak = Rc::downgrade(&inner);
        let on_sync = hub.register_listener::<SyncRequest>(&sync, move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.broadcast();
            }
        });
        inner.listeners.borrow_mut().push(on_sync);

        Self { inner }
    }

    /// Returns the topic key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Returns the version of the local value.
    pub fn version(&self) -> u64 {
        self.inner.current.borrow().version
    }

    /// Returns a clone of the local value.
    pub fn state(&self) -> T {
        self.inner.current.borrow().value.clone()
    }

    /// Runs `f` against the local value without cloning it.
    ///
    /// `f` must not write to this state.
    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.current.borrow().value)
    }

    /// Replaces the value and publishes it to every instance, this one included.
    pub fn set_state(&self, value: T) {
        let payload = {
            let mut current = self.inner.current.borrow_mut();
            current.version += 1;
            current.value = value;
            current.clone()
        };
        self.inner.hub.publish(&self.inner.key, payload);
    }

    /// Applies `f` to a copy of the value and publishes the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.state();
        f(&mut value);
        self.set_state(value);
    }

    /// Registers a change handler, called on every adopted publish including this instance's
    /// own writes.
    pub fn on_change(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.inner.changed.subscribe(handler)
    }
}
