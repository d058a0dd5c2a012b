//! Abort controller/signal primitives shared by transports, timers, and the HTTP client.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

#[derive(Default)]
struct AbortState {
    aborted: Cell<bool>,
    wakers: RefCell<Vec<Waker>>,
}

#[derive(Clone, Default)]
/// Read side of an [`AbortController`]; clones observe the same cancellation.
pub struct AbortSignal {
    state: Rc<AbortState>,
}

impl AbortSignal {
    /// Returns whether the owning controller has aborted.
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.get()
    }

    /// Returns a future that resolves once the signal is aborted.
    pub fn aborted(&self) -> Aborted {
        Aborted {
            signal: self.clone(),
        }
    }

    /// Returns whether both handles observe the same controller.
    pub fn same_as(&self, other: &AbortSignal) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Future returned by [`AbortSignal::aborted`].
pub struct Aborted {
    signal: AbortSignal,
}

impl Future for Aborted {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.signal.is_aborted() {
            return Poll::Ready(());
        }
        let mut wakers = self.signal.state.wakers.borrow_mut();
        if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[derive(Clone, Debug, Default)]
/// Owner of one cancelable scope.
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Creates a controller whose signal is not aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal observed by work running inside this scope.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Aborts the scope and wakes every pending [`Aborted`] future. Aborting twice is a no-op.
    pub fn abort(&self) {
        if self.signal.state.aborted.replace(true) {
            return;
        }
        let wakers = std::mem::take(&mut *self.signal.state.wakers.borrow_mut());
        for waker in wakers {
            waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{
        executor::LocalPool,
        task::LocalSpawnExt,
    };

    use super::*;

    #[test]
    fn abort_wakes_pending_waiters() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let resolved = Rc::new(Cell::new(false));

        let mut pool = LocalPool::new();
        let flag = Rc::clone(&resolved);
        pool.spawner()
            .spawn_local(async move {
                signal.aborted().await;
                flag.set(true);
            })
            .expect("spawn waiter");

        pool.run_until_stalled();
        assert!(!resolved.get());

        controller.abort();
        pool.run_until_stalled();
        assert!(resolved.get());
    }

    #[test]
    fn signal_clones_share_state() {
        let controller = AbortController::new();
        let first = controller.signal();
        let second = controller.signal();
        assert!(first.same_as(&second));
        assert!(!AbortController::new().signal().same_as(&first));

        controller.abort();
        controller.abort();
        assert!(first.is_aborted() && second.is_aborted());
    }
}
