//! Script-tag app bundle loader.

use portal_host::{AppLoader, AppLoaderFuture};
use tracing::debug;

#[derive(Debug, Clone)]
/// Loads `{base_url}/{app_key}.js` by appending a `<script>` element to the document head.
pub struct WebAppLoader {
    base_url: String,
}

impl WebAppLoader {
    /// Creates a loader resolving bundles under `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the bundle URL of `app_key`.
    pub fn bundle_url(&self, app_key: &str) -> String {
        format!("{}/{app_key}.js", self.base_url)
    }
}

#[cfg(target_arch = "wasm32")]
async fn inject_script(src: &str) -> Result<(), String> {
    use wasm_bindgen::JsCast;

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| "document unavailable".to_string())?;
    let head = document
        .head()
        .ok_or_else(|| "document head unavailable".to_string())?;
    let script: web_sys::HtmlScriptElement = document
        .create_element("script")
        .map_err(|e| format!("create script failed: {e:?}"))?
        .dyn_into()
        .map_err(|_| "created element is not a script".to_string())?;
    script.set_src(src);
    script.set_async(true);

    let loaded = js_sys::Promise::new(&mut |resolve, reject| {
        script.set_onload(Some(&resolve));
        script.set_onerror(Some(&reject));
    });
    head.append_child(&script)
        .map_err(|e| format!("append script failed: {e:?}"))?;
    wasm_bindgen_futures::JsFuture::from(loaded)
        .await
        .map(|_| ())
        .map_err(|_| format!("failed to load {src}"))
}

impl AppLoader for WebAppLoader {
    fn load_app_bundle<'a>(&'a self, app_key: &'a str) -> AppLoaderFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let src = self.bundle_url(app_key);
            debug!(app = app_key, %src, "loading app bundle");

            #[cfg(target_arch = "wasm32")]
            {
                inject_script(&src).await
            }

            #[cfg(not(target_arch = "wasm32"))]
            {
                Err(format!("loading {src} requires a browser document"))
            }
        })
    }
}
