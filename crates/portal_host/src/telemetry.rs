//! Telemetry collaborator contracts.

use std::{cell::RefCell, rc::Rc};

/// One tracked exception or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    /// Exception message or event name.
    pub name: String,
    /// Free-form properties attached by the reporter.
    pub properties: Vec<(String, String)>,
}

/// Host telemetry sink. Reporting is fire-and-forget and never fails the caller.
pub trait TelemetryLogger {
    /// Records an exception observed by the core.
    fn track_exception(&self, message: &str, properties: &[(&str, &str)]);

    /// Records a named event.
    fn track_event(&self, name: &str, properties: &[(&str, &str)]);
}

#[derive(Debug, Clone, Copy, Default)]
/// Telemetry logger discarding everything.
pub struct NoopTelemetryLogger;

impl TelemetryLogger for NoopTelemetryLogger {
    fn track_exception(&self, _message: &str, _properties: &[(&str, &str)]) {}

    fn track_event(&self, _name: &str, _properties: &[(&str, &str)]) {}
}

#[derive(Debug, Clone, Copy, Default)]
/// Telemetry logger forwarding to `tracing`.
pub struct TracingTelemetryLogger;

impl TelemetryLogger for TracingTelemetryLogger {
    fn track_exception(&self, message: &str, properties: &[(&str, &str)]) {
        tracing::error!(?properties, "{message}");
    }

    fn track_event(&self, name: &str, properties: &[(&str, &str)]) {
        tracing::info!(?properties, "{name}");
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory telemetry logger for tests.
pub struct MemoryTelemetryLogger {
    exceptions: Rc<RefCell<Vec<TelemetryRecord>>>,
    events: Rc<RefCell<Vec<TelemetryRecord>>>,
}

impl MemoryTelemetryLogger {
    /// Returns every tracked exception.
    pub fn exceptions(&self) -> Vec<TelemetryRecord> {
        self.exceptions.borrow().clone()
    }

    /// Returns every tracked event.
    pub fn events(&self) -> Vec<TelemetryRecord> {
        self.events.borrow().clone()
    }
}

fn record(name: &str, properties: &[(&str, &str)]) -> TelemetryRecord {
    TelemetryRecord {
        name: name.to_string(),
        properties: properties
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

impl TelemetryLogger for MemoryTelemetryLogger {
    fn track_exception(&self, message: &str, properties: &[(&str, &str)]) {
        self.exceptions
            .borrow_mut()
            .push(record(message, properties));
    }

    fn track_event(&self, name: &str, properties: &[(&str, &str)]) {
        self.events.borrow_mut().push(record(name, properties));
    }
}
