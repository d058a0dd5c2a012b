//! Disposer handles returned by every listener registration.

/// Registration handle; dropping it removes the listener.
///
/// Call [`Subscription::detach`] to keep a listener registered for the lifetime of its source.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wraps a disposer run exactly once on [`Subscription::dispose`] or drop.
    pub fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Subscription with nothing to dispose.
    pub fn empty() -> Self {
        Self { dispose: None }
    }

    /// Unregisters the listener now.
    pub fn dispose(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Keeps the listener registered for as long as its source lives.
    pub fn detach(mut self) {
        self.dispose = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}
