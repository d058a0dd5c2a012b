//! The current cancelable scope, shared across realms.

use portal_host::{AbortController, AbortSignal};
use tracing::debug;

use crate::{distributed_state::DistributedState, event_hub::EventHub};

/// Topic of the shared abort scope.
pub const ABORT_CONTROLLER_TOPIC: &str = "AbortControllerManager";

/// Holds at most one active [`AbortController`].
///
/// Starting a scope does not abort the previous one; callers track and cancel scopes
/// themselves.
#[derive(Clone)]
pub struct AbortControllerManager {
    current: DistributedState<Option<AbortController>>,
}

impl AbortControllerManager {
    /// Joins the shared scope on `hub`.
    pub fn new(hub: &EventHub) -> Self {
        Self {
            current: DistributedState::new(ABORT_CONTROLLER_TOPIC, None, hub),
        }
    }

    /// Starts a new scope and returns its controller.
    pub fn begin_scope(&self) -> AbortController {
        let controller = AbortController::new();
        self.current.set_state(Some(controller.clone()));
        controller
    }

    /// Leaves the current scope without aborting it.
    pub fn end_scope(&self) {
        self.current.set_state(None);
    }

    /// Aborts the current scope, if any, and clears it.
    pub fn abort_current(&self) {
        if let Some(controller) = self.current.state() {
            debug!("aborting current request scope");
            controller.abort();
            self.current.set_state(None);
        }
    }

    /// Returns the active controller.
    pub fn get_current_controller(&self) -> Option<AbortController> {
        self.current.state()
    }

    /// Returns the active scope's signal.
    pub fn get_current_signal(&self) -> Option<AbortSignal> {
        self.current.with_state(|current| current.as_ref().map(AbortController::signal))
    }
}
