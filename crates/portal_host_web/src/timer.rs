//! `setTimeout`-backed timer.

use std::time::Duration;

use portal_host::{Timer, TimerFuture};

#[derive(Debug, Clone, Copy, Default)]
/// Timer resolving through `window.setTimeout`.
///
/// Off `wasm32` sleeps resolve immediately.
pub struct WebTimer;

impl Timer for WebTimer {
    fn sleep<'a>(&'a self, duration: Duration) -> TimerFuture<'a, ()> {
        Box::pin(async move {
            #[cfg(target_arch = "wasm32")]
            {
                let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
                let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                    let scheduled = web_sys::window().map(|window| {
                        window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                    });
                    if !matches!(scheduled, Some(Ok(_))) {
                        let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
                    }
                });
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            }

            #[cfg(not(target_arch = "wasm32"))]
            {
                let _ = duration;
            }
        })
    }
}
