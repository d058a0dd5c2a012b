//! Strongly-typed synchronous event emitter.

use std::{cell::RefCell, rc::Rc};

use crate::subscription::Subscription;

type Handler<E> = Rc<dyn Fn(&E)>;

struct EmitterState<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

/// Fan-out of one event type to every subscribed handler, in subscription order.
///
/// Clones share the handler list. Handlers run synchronously inside [`Emitter::emit`] and may
/// subscribe, unsubscribe, or emit re-entrantly.
pub struct Emitter<E> {
    state: Rc<RefCell<EmitterState<E>>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(EmitterState {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }
}

impl<E: 'static> Emitter<E> {
    /// Creates an emitter without handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler`; dropping the returned [`Subscription`] removes it.
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.handlers.push((id, Rc::new(handler)));
            id
        };
        let weak = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .borrow_mut()
                    .handlers
                    .retain(|(handler_id, _)| *handler_id != id);
            }
        })
    }

    /// Delivers `event` to every handler registered when the call starts.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .state
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.state.borrow().handlers.len()
    }
}
