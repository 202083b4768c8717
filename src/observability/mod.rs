//! Observability for the route engine
//!
//! - Structured logging (single-line JSON, deterministic key order)
//! - Typed lifecycle events
//! - Counter-only metrics
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on the refresh or request path
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! Logging failure is never an error: the engine keeps serving and
//! refreshing even when stdout is gone.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at its default severity.
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields at its default severity.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = event.severity();
    if severity >= Severity::Error {
        Logger::log_stderr(severity, event.as_str(), fields);
    } else {
        Logger::log(severity, event.as_str(), fields);
    }
}
