//! Process-wide topic publish/subscribe bus.
//!
//! The hub is the substrate every [`crate::DistributedState`] instance synchronizes through.
//! Payloads are type-erased on the wire and downcast per listener, so one hub carries any
//! number of differently-typed topics.

use std::{
    any::{type_name, Any},
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use tracing::warn;

use crate::subscription::Subscription;

type Listener = Rc<dyn Fn(&dyn Any)>;

#[derive(Default)]
struct HubState {
    next_id: u64,
    topics: HashMap<String, Vec<(u64, Listener)>>,
}

#[derive(Clone, Default)]
/// Synchronous topic bus shared by every realm constructed on the same handle.
pub struct EventHub {
    state: Rc<RefCell<HubState>>,
}

impl EventHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    ///
    /// Payloads published on `topic` with a type other than `T` are skipped for this listener.
    pub fn register_listener<T: 'static>(
        &self,
        topic: &str,
        handler: impl Fn(&T) + 'static,
    ) -> Subscription {
        let topic_name = topic.to_string();
        let listener: Listener = Rc::new(move |payload: &dyn Any| {
            match payload.downcast_ref::<T>() {
                Some(value) => handler(value),
                None => warn!(
                    topic = %topic_name,
                    expected = type_name::<T>(),
                    "hub payload type mismatch; listener skipped"
                ),
            }
        });

        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state
                .topics
                .entry(topic.to_string())
                .or_default()
                .push((id, listener));
            id
        };

        let weak = Rc::downgrade(&self.state);
        let topic = topic.to_string();
        Subscription::new(move || {
            let Some(hub_state) = weak.upgrade() else {
                return;
            };
            let mut state = hub_state.borrow_mut();
            if let Some(listeners) = state.topics.get_mut(&topic) {
                listeners.retain(|(listener_id, _)| *listener_id != id);
                if listeners.is_empty() {
                    state.topics.remove(&topic);
                }
            }
        })
    }

    /// Delivers `value` to every listener registered on `topic` when the call starts, in
    /// registration order.
    pub fn publish<T: 'static>(&self, topic: &str, value: T) {
        let listeners: Vec<Listener> = self
            .state
            .borrow()
            .topics
            .get(topic)
            .map(|listeners| {
                listeners
                    .iter()
                    .map(|(_, listener)| Rc::clone(listener))
                    .collect()
            })
            .unwrap_or_default();

        for listener in listeners {
            listener(&value);
        }
    }

    /// Returns the number of listeners registered on `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.state
            .borrow()
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Returns whether both handles address the same hub.
    pub fn same_as(&self, other: &EventHub) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}
