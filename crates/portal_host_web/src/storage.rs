//! `localStorage`-backed key-value storage.

use portal_host::KeyValueStorage;

#[derive(Debug, Clone, Copy, Default)]
/// Key-value storage backed by `window.localStorage`.
///
/// Off `wasm32` nothing is stored: reads miss and writes succeed.
pub struct WebLocalStorage;

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Result<web_sys::Storage, String> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .ok_or_else(|| "localStorage unavailable".to_string())
}

impl KeyValueStorage for WebLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        #[cfg(target_arch = "wasm32")]
        {
            local_storage()?
                .get_item(key)
                .map_err(|e| format!("localStorage get_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(None)
        }
    }

    fn set_item(&self, key: &str, raw: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            local_storage()?
                .set_item(key, raw)
                .map_err(|e| format!("localStorage set_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (key, raw);
            Ok(())
        }
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            local_storage()?
                .remove_item(key)
                .map_err(|e| format!("localStorage remove_item failed: {e:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn non_wasm_storage_forgets_writes() {
        let storage: &dyn KeyValueStorage = &WebLocalStorage;

        storage
            .set_item("FUSION_AUTH_CACHE", "{}")
            .expect("set");
        assert_eq!(storage.get_item("FUSION_AUTH_CACHE").expect("get"), None);
        storage.remove_item("FUSION_AUTH_CACHE").expect("remove");
    }
}
