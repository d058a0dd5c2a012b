//! Timer contracts used for retry backoff and notification timeouts.

use std::{cell::RefCell, future::Future, pin::Pin, rc::Rc, time::Duration};

/// Object-safe boxed future used by [`Timer`].
pub type TimerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host timer service.
pub trait Timer {
    /// Resolves after `duration` has elapsed.
    fn sleep<'a>(&'a self, duration: Duration) -> TimerFuture<'a, ()>;
}

#[derive(Debug, Clone, Default)]
/// Timer that resolves immediately and records every requested delay.
///
/// Used by tests and headless hosts that must not block on wall-clock time.
pub struct InstantTimer {
    requested: Rc<RefCell<Vec<Duration>>>,
}

impl InstantTimer {
    /// Returns every delay requested so far, in call order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.borrow().clone()
    }

    /// Returns the sum of every requested delay.
    pub fn total(&self) -> Duration {
        self.requested.borrow().iter().sum()
    }
}

impl Timer for InstantTimer {
    fn sleep<'a>(&'a self, duration: Duration) -> TimerFuture<'a, ()> {
        self.requested.borrow_mut().push(duration);
        Box::pin(async {})
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Timer that never resolves; models a delay longer than any awaited work.
pub struct NeverTimer;

impl Timer for NeverTimer {
    fn sleep<'a>(&'a self, _duration: Duration) -> TimerFuture<'a, ()> {
        Box::pin(futures::future::pending())
    }
}
