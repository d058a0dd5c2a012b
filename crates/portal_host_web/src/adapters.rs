use std::rc::Rc;

use portal_host::{HostServices, HostStrategy, TracingTelemetryLogger};

use crate::{FetchTransport, WebAppLoader, WebLocalStorage, WebNavigationService, WebTimer};

/// Returns the host strategy selected for the active build.
pub const fn selected_host_strategy() -> HostStrategy {
    HostStrategy::Browser
}

/// Returns the selected host strategy as a stable string token.
pub fn host_strategy_name() -> &'static str {
    selected_host_strategy().as_str()
}

/// Builds the browser service bundle; app bundles are loaded from `bundle_base_url`.
pub fn build_host_services(bundle_base_url: &str) -> HostServices {
    HostServices {
        storage: Rc::new(WebLocalStorage),
        transport: Rc::new(FetchTransport::new()),
        timer: Rc::new(WebTimer),
        navigation: Rc::new(WebNavigationService),
        telemetry: Rc::new(TracingTelemetryLogger),
        app_loader: Rc::new(WebAppLoader::new(bundle_base_url)),
        host_strategy: selected_host_strategy(),
    }
}
