//! Host service bundle injected into the portal core at startup.

use std::rc::Rc;

use crate::{
    AppLoader, HttpTransport, InstantTimer, KeyValueStorage, MemoryAppLoader,
    MemoryKeyValueStorage, MemoryNavigationService, MemoryTelemetryLogger, NavigationService,
    ScriptedTransport, TelemetryLogger, Timer,
};

/// Stable host strategy selected for the current build/runtime composition path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStrategy {
    /// Browser-backed composition.
    Browser,
    /// In-memory composition used by tests and headless tooling.
    Memory,
}

impl HostStrategy {
    /// Returns a stable string token for diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Memory => "memory",
        }
    }
}

/// Runtime-selected host service bundle.
///
/// Environment-specific adapter selection happens before this bundle reaches `portal_core`,
/// which keeps the core independent of browser APIs.
#[derive(Clone)]
pub struct HostServices {
    /// Durable key-value storage substrate.
    pub storage: Rc<dyn KeyValueStorage>,
    /// Network transport.
    pub transport: Rc<dyn HttpTransport>,
    /// Timer used for backoff and timeouts.
    pub timer: Rc<dyn Timer>,
    /// Top-level navigation for redirect login.
    pub navigation: Rc<dyn NavigationService>,
    /// Telemetry sink.
    pub telemetry: Rc<dyn TelemetryLogger>,
    /// App bundle loader.
    pub app_loader: Rc<dyn AppLoader>,
    /// Stable strategy identifier for diagnostics.
    pub host_strategy: HostStrategy,
}

/// Concrete in-memory adapters behind a [`HostServices`] bundle, kept for test inspection.
#[derive(Clone, Default)]
pub struct MemoryHost {
    /// Shared storage area.
    pub storage: MemoryKeyValueStorage,
    /// Scripted transport.
    pub transport: ScriptedTransport,
    /// Recording timer.
    pub timer: InstantTimer,
    /// Recording navigation.
    pub navigation: MemoryNavigationService,
    /// Recording telemetry.
    pub telemetry: MemoryTelemetryLogger,
    /// Recording loader.
    pub app_loader: MemoryAppLoader,
}

impl MemoryHost {
    /// Builds a service bundle sharing this host's adapters.
    pub fn services(&self) -> HostServices {
        HostServices {
            storage: Rc::new(self.storage.clone()),
            transport: Rc::new(self.transport.clone()),
            timer: Rc::new(self.timer.clone()),
            navigation: Rc::new(self.navigation.clone()),
            telemetry: Rc::new(self.telemetry.clone()),
            app_loader: Rc::new(self.app_loader.clone()),
            host_strategy: HostStrategy::Memory,
        }
    }
}
