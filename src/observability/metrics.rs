//! Metrics registry for the route engine
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase, reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters
///
/// # Thread Safety
///
/// All counters use atomic operations with Relaxed ordering. Counters are
/// advisory; they never order or gate engine work.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Refresh cycles run (successful or not)
    refresh_ticks: AtomicU64,
    /// Refresh cycles that failed and left the watermark unchanged
    refresh_failures: AtomicU64,
    /// Audit rows scanned across all polls
    audit_events_seen: AtomicU64,
    /// Routes created
    routes_created: AtomicU64,
    /// Routes whose descriptor was replaced
    routes_updated: AtomicU64,
    /// Routes removed
    routes_removed: AtomicU64,
    /// Route updates that changed the request path identity
    route_identity_changes: AtomicU64,
    /// Schemas created
    schemas_created: AtomicU64,
    /// Schemas released after losing their last route
    schemas_released: AtomicU64,
    /// Tombstones observed for deleted objects
    tombstones_observed: AtomicU64,
    /// Privilege sets computed
    privilege_resolutions: AtomicU64,
    /// Resolutions that hit a role or group cycle
    privilege_cycles: AtomicU64,
    /// Blocking waits on the consistency gate
    gate_waits: AtomicU64,
    /// Gate waits that ran out of time
    asof_timeouts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Refresh metrics

    pub fn increment_refresh_ticks(&self) {
        self.refresh_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_refresh_failures(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the number of audit rows a poll scanned.
    pub fn add_audit_events(&self, count: u64) {
        self.audit_events_seen.fetch_add(count, Ordering::Relaxed);
    }

    // Route metrics

    pub fn increment_routes_created(&self) {
        self.routes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_routes_updated(&self) {
        self.routes_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_routes_removed(&self) {
        self.routes_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_route_identity_changes(&self) {
        self.route_identity_changes.fetch_add(1, Ordering::Relaxed);
    }

    // Schema metrics

    pub fn increment_schemas_created(&self) {
        self.schemas_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_schemas_released(&self) {
        self.schemas_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tombstones(&self) {
        self.tombstones_observed.fetch_add(1, Ordering::Relaxed);
    }

    // Privilege metrics

    pub fn increment_privilege_resolutions(&self) {
        self.privilege_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_privilege_cycles(&self) {
        self.privilege_cycles.fetch_add(1, Ordering::Relaxed);
    }

    // Gate metrics

    pub fn increment_gate_waits(&self) {
        self.gate_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_asof_timeouts(&self) {
        self.asof_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current values of all metrics as JSON
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"refresh_ticks":{},"refresh_failures":{},"audit_events_seen":{},"routes_created":{},"routes_updated":{},"routes_removed":{},"route_identity_changes":{},"schemas_created":{},"schemas_released":{},"tombstones_observed":{},"privilege_resolutions":{},"privilege_cycles":{},"gate_waits":{},"asof_timeouts":{}}}"#,
            self.refresh_ticks.load(Ordering::Relaxed),
            self.refresh_failures.load(Ordering::Relaxed),
            self.audit_events_seen.load(Ordering::Relaxed),
            self.routes_created.load(Ordering::Relaxed),
            self.routes_updated.load(Ordering::Relaxed),
            self.routes_removed.load(Ordering::Relaxed),
            self.route_identity_changes.load(Ordering::Relaxed),
            self.schemas_created.load(Ordering::Relaxed),
            self.schemas_released.load(Ordering::Relaxed),
            self.tombstones_observed.load(Ordering::Relaxed),
            self.privilege_resolutions.load(Ordering::Relaxed),
            self.privilege_cycles.load(Ordering::Relaxed),
            self.gate_waits.load(Ordering::Relaxed),
            self.asof_timeouts.load(Ordering::Relaxed),
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refresh_ticks: self.refresh_ticks.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            audit_events_seen: self.audit_events_seen.load(Ordering::Relaxed),
            routes_created: self.routes_created.load(Ordering::Relaxed),
            routes_updated: self.routes_updated.load(Ordering::Relaxed),
            routes_removed: self.routes_removed.load(Ordering::Relaxed),
            route_identity_changes: self.route_identity_changes.load(Ordering::Relaxed),
            schemas_created: self.schemas_created.load(Ordering::Relaxed),
            schemas_released: self.schemas_released.load(Ordering::Relaxed),
            tombstones_observed: self.tombstones_observed.load(Ordering::Relaxed),
            privilege_resolutions: self.privilege_resolutions.load(Ordering::Relaxed),
            privilege_cycles: self.privilege_cycles.load(Ordering::Relaxed),
            gate_waits: self.gate_waits.load(Ordering::Relaxed),
            asof_timeouts: self.asof_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub refresh_ticks: u64,
    pub refresh_failures: u64,
    pub audit_events_seen: u64,
    pub routes_created: u64,
    pub routes_updated: u64,
    pub routes_removed: u64,
    pub route_identity_changes: u64,
    pub schemas_created: u64,
    pub schemas_released: u64,
    pub tombstones_observed: u64,
    pub privilege_resolutions: u64,
    pub privilege_cycles: u64,
    pub gate_waits: u64,
    pub asof_timeouts: u64,
}
