//! Top-level window navigation contracts used by the redirect login flow.

use std::{cell::RefCell, future::Future, pin::Pin, rc::Rc};

/// Object-safe boxed future used by [`NavigationService`].
pub type NavigationFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host service controlling the top-level window location.
pub trait NavigationService {
    /// Returns the current top-level URL.
    fn current_url(&self) -> Option<String>;

    /// Navigates the top-level window to `url`, leaving the current page.
    fn navigate<'a>(&'a self, url: &'a str) -> NavigationFuture<'a, Result<(), String>>;
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op navigation service for unsupported targets.
pub struct NoopNavigationService;

impl NavigationService for NoopNavigationService {
    fn current_url(&self) -> Option<String> {
        None
    }

    fn navigate<'a>(&'a self, _url: &'a str) -> NavigationFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory navigation service recording every navigation.
pub struct MemoryNavigationService {
    current: Rc<RefCell<Option<String>>>,
    history: Rc<RefCell<Vec<String>>>,
}

impl MemoryNavigationService {
    /// Creates a service positioned at `url`.
    pub fn at(url: impl Into<String>) -> Self {
        let service = Self::default();
        *service.current.borrow_mut() = Some(url.into());
        service
    }

    /// Returns every URL navigated to, in order.
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

impl NavigationService for MemoryNavigationService {
    fn current_url(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    fn navigate<'a>(&'a self, url: &'a str) -> NavigationFuture<'a, Result<(), String>> {
        Box::pin(async move {
            *self.current.borrow_mut() = Some(url.to_string());
            self.history.borrow_mut().push(url.to_string());
            Ok(())
        })
    }
}
