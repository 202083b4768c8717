//! Observable events of the route engine
//!
//! Every log line names one of these events. Events are explicit and
//! typed; free-form event strings do not exist.

use std::fmt;

use super::logger::Severity;

/// Observable engine events
///
/// Covers:
/// - Refresh timeline (poll, apply, watermark)
/// - Route and schema lifecycle
/// - Consistency gate outcomes
/// - Privilege resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Refresh timeline
    /// Background refresher started
    RefresherStarted,
    /// Background refresher stopped
    RefresherStopped,
    /// A refresh cycle begins
    RefreshTickBegin,
    /// A refresh cycle applied its batch and advanced the watermark
    RefreshTickComplete,
    /// A refresh cycle failed; the watermark is unchanged
    RefreshTickFailed,
    /// The global publish toggle flipped
    ServiceStateChanged,

    // Route lifecycle
    /// A route was created
    RouteCreated,
    /// A route's descriptor was replaced
    RouteUpdated,
    /// A route's request path identity changed
    RouteIdentityChanged,
    /// A route was removed
    RouteRemoved,
    /// A deleted object was observed as a tombstone
    TombstoneObserved,
    /// A route's column cache was loaded
    ColumnCacheLoaded,

    // Schema lifecycle
    /// A schema gained its first route
    SchemaCreated,
    /// A schema lost its last route and was released
    SchemaReleased,

    // Consistency gate
    /// A wait for a replication position ran out of time
    AsOfTimeout,
    /// A wait for a replication position was cancelled
    GateWaitCancelled,

    // Privileges
    /// A user's privilege set was computed
    PrivilegesResolved,
    /// The role or group graph contains a cycle
    PrivilegeCycleDetected,

    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RefresherStarted => "REFRESHER_STARTED",
            Event::RefresherStopped => "REFRESHER_STOPPED",
            Event::RefreshTickBegin => "REFRESH_TICK_BEGIN",
            Event::RefreshTickComplete => "REFRESH_TICK_COMPLETE",
            Event::RefreshTickFailed => "REFRESH_TICK_FAILED",
            Event::ServiceStateChanged => "SERVICE_STATE_CHANGED",

            Event::RouteCreated => "ROUTE_CREATED",
            Event::RouteUpdated => "ROUTE_UPDATED",
            Event::RouteIdentityChanged => "ROUTE_IDENTITY_CHANGED",
            Event::RouteRemoved => "ROUTE_REMOVED",
            Event::TombstoneObserved => "TOMBSTONE_OBSERVED",
            Event::ColumnCacheLoaded => "COLUMN_CACHE_LOADED",

            Event::SchemaCreated => "SCHEMA_CREATED",
            Event::SchemaReleased => "SCHEMA_RELEASED",

            Event::AsOfTimeout => "ASOF_TIMEOUT",
            Event::GateWaitCancelled => "GATE_WAIT_CANCELLED",

            Event::PrivilegesResolved => "PRIVILEGES_RESOLVED",
            Event::PrivilegeCycleDetected => "PRIVILEGE_CYCLE_DETECTED",

            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Default severity the event is logged at.
    ///
    /// Nothing here is fatal: a failed refresh cycle retries on the next
    /// tick and gate timeouts are per-request outcomes.
    pub fn severity(&self) -> Severity {
        match self {
            Event::RefreshTickBegin | Event::ColumnCacheLoaded | Event::PrivilegesResolved => {
                Severity::Trace
            }
            Event::RefreshTickFailed => Severity::Error,
            Event::AsOfTimeout
            | Event::GateWaitCancelled
            | Event::PrivilegeCycleDetected
            | Event::TombstoneObserved => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
