//! Gate wait logic
//!
//! Waits are sliced: instead of one long blocking probe call, the gate
//! issues bounded slices and re-checks cancellation between them. A
//! cancelled wait returns within one slice of the cancel, whatever the
//! overall deadline was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{GateError, GateResult};
use super::probe::ReplicationProbe;
use super::txid::TransactionSet;

/// Cooperative cancellation handle for gate waits.
///
/// Clones share the flag, so the request side can cancel a wait running
/// on a worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags the wait as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Gates reads behind replication positions.
pub struct ConsistencyGate {
    probe: Arc<dyn ReplicationProbe>,
    wait_slice: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ConsistencyGate {
    /// Default length of one wait slice.
    pub const DEFAULT_WAIT_SLICE: Duration = Duration::from_millis(250);

    pub fn new(probe: Arc<dyn ReplicationProbe>) -> Self {
        Self {
            probe,
            wait_slice: Self::DEFAULT_WAIT_SLICE,
            metrics: None,
        }
    }

    /// Overrides the wait slice. A zero slice is clamped to one
    /// millisecond so the wait loop always makes progress.
    pub fn with_wait_slice(mut self, slice: Duration) -> Self {
        self.wait_slice = slice.max(Duration::from_millis(1));
        self
    }

    /// Attaches a metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Instant check, never blocks.
    pub fn is_applied(&self, position: &TransactionSet) -> GateResult<bool> {
        Ok(self.probe.applied_set()?.contains(position))
    }

    /// Waits until `position` is applied or `timeout` elapses. A zero
    /// timeout degrades to a single instant check.
    pub fn wait_until_applied(
        &self,
        position: &TransactionSet,
        timeout: Duration,
    ) -> GateResult<bool> {
        self.wait_until_applied_cancellable(position, timeout, &CancelToken::new())
    }

    /// Like `wait_until_applied`, honoring `cancel` between slices.
    pub fn wait_until_applied_cancellable(
        &self,
        position: &TransactionSet,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> GateResult<bool> {
        if cancel.is_cancelled() {
            return Err(self.cancelled(position));
        }
        if timeout.is_zero() {
            return self.is_applied(position);
        }
        if let Some(metrics) = &self.metrics {
            metrics.increment_gate_waits();
        }
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let slice = self.wait_slice.min(deadline - now);
            if self.probe.wait_applied(position, slice)? {
                return Ok(true);
            }
            if cancel.is_cancelled() {
                return Err(self.cancelled(position));
            }
        }
    }

    /// Demands the position, turning "not applied in time" into
    /// `AsOfTimeout`. `timeout` of `None` means check once, never wait.
    pub fn require_applied(
        &self,
        position: &TransactionSet,
        timeout: Option<Duration>,
    ) -> GateResult<()> {
        let started = Instant::now();
        let applied = match timeout {
            None => self.is_applied(position)?,
            Some(timeout) => self.wait_until_applied(position, timeout)?,
        };
        if applied {
            return Ok(());
        }
        let waited_ms = started.elapsed().as_millis() as u64;
        let token = position.to_string();
        let waited_text = waited_ms.to_string();
        log_event_with_fields(
            Event::AsOfTimeout,
            &[
                ("position", token.as_str()),
                ("waited_ms", waited_text.as_str()),
            ],
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_asof_timeouts();
        }
        Err(GateError::AsOfTimeout {
            position: token,
            waited_ms,
        })
    }

    fn cancelled(&self, position: &TransactionSet) -> GateError {
        let token = position.to_string();
        log_event_with_fields(Event::GateWaitCancelled, &[("position", token.as_str())]);
        GateError::Cancelled
    }
}
