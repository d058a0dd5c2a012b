//! App bundle loader contracts.

use std::{cell::RefCell, future::Future, pin::Pin, rc::Rc};

/// Object-safe boxed future used by [`AppLoader`].
pub type AppLoaderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host service injecting an app bundle into the current document.
///
/// A loaded bundle registers itself with the app container from its own realm; the loader
/// only has to start that process.
pub trait AppLoader {
    /// Loads the bundle for `app_key`.
    fn load_app_bundle<'a>(&'a self, app_key: &'a str) -> AppLoaderFuture<'a, Result<(), String>>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Loader for hosts without dynamic bundles; loading always fails.
pub struct NoopAppLoader;

impl AppLoader for NoopAppLoader {
    fn load_app_bundle<'a>(&'a self, app_key: &'a str) -> AppLoaderFuture<'a, Result<(), String>> {
        Box::pin(async move { Err(format!("no app loader available for `{app_key}`")) })
    }
}

#[derive(Clone, Default)]
/// In-memory loader recording requests and running an optional hook per load.
pub struct MemoryAppLoader {
    loaded: Rc<RefCell<Vec<String>>>,
    on_load: Rc<RefCell<Option<Box<dyn Fn(&str)>>>>,
}

impl MemoryAppLoader {
    /// Installs a hook invoked with the app key on every load, standing in for the bundle's
    /// own registration code.
    pub fn set_on_load(&self, hook: impl Fn(&str) + 'static) {
        *self.on_load.borrow_mut() = Some(Box::new(hook));
    }

    /// Returns every requested app key, in order.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }
}

impl AppLoader for MemoryAppLoader {
    fn load_app_bundle<'a>(&'a self, app_key: &'a str) -> AppLoaderFuture<'a, Result<(), String>> {
        Box::pin(async move {
            self.loaded.borrow_mut().push(app_key.to_string());
            if let Some(hook) = self.on_load.borrow().as_ref() {
                hook(app_key);
            }
            Ok(())
        })
    }
}
