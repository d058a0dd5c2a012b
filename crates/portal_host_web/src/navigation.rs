//! Window-location navigation for the redirect login flow.

use portal_host::{NavigationFuture, NavigationService};

#[derive(Debug, Clone, Copy, Default)]
/// Navigation service driving `window.location`.
pub struct WebNavigationService;

impl NavigationService for WebNavigationService {
    fn current_url(&self) -> Option<String> {
        #[cfg(target_arch = "wasm32")]
        {
            web_sys::window()?.location().href().ok()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            None
        }
    }

    fn navigate<'a>(&'a self, url: &'a str) -> NavigationFuture<'a, Result<(), String>> {
        Box::pin(async move {
            #[cfg(target_arch = "wasm32")]
            {
                let window = web_sys::window().ok_or_else(|| "window unavailable".to_string())?;
                window
                    .location()
                    .assign(url)
                    .map_err(|e| format!("navigation to {url} failed: {e:?}"))
            }

            #[cfg(not(target_arch = "wasm32"))]
            {
                Err(format!("navigation to {url} requires a browser window"))
            }
        })
    }
}
