//! Replication probe seam
//!
//! The gate asks its probe two questions: "what is applied right now" and
//! "block until this much is applied or the slice ends". A SQL backend
//! answers the second server-side; the in-memory probe answers with a
//! condition variable.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::errors::{GateError, GateResult};
use super::txid::TransactionSet;

/// Backend seam for replication position checks.
pub trait ReplicationProbe: Send + Sync {
    /// The set of transactions applied on this endpoint right now.
    fn applied_set(&self) -> GateResult<TransactionSet>;

    /// Blocks until `position` is applied or `timeout` elapses. Returns
    /// whether the position was applied. Must not exceed the timeout by
    /// more than scheduling noise.
    fn wait_applied(&self, position: &TransactionSet, timeout: Duration) -> GateResult<bool>;
}

/// In-memory probe for tests.
///
/// `advance` and `install` move the applied set forward and wake blocked
/// waiters.
#[derive(Default)]
pub struct MemoryProbe {
    applied: Mutex<TransactionSet>,
    changed: Condvar,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one more transaction applied and wakes waiters.
    pub fn advance(&self, source: &str, txno: u64) {
        let mut applied = match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        applied.add(source, txno);
        self.changed.notify_all();
    }

    /// Replaces the applied set and wakes waiters.
    pub fn install(&self, set: TransactionSet) {
        let mut applied = match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *applied = set;
        self.changed.notify_all();
    }
}

impl ReplicationProbe for MemoryProbe {
    fn applied_set(&self) -> GateResult<TransactionSet> {
        let applied = self
            .applied
            .lock()
            .map_err(|_| GateError::Probe("probe state poisoned".into()))?;
        Ok(applied.clone())
    }

    fn wait_applied(&self, position: &TransactionSet, timeout: Duration) -> GateResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut applied = self
            .applied
            .lock()
            .map_err(|_| GateError::Probe("probe state poisoned".into()))?;
        loop {
            if applied.contains(position) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, _) = self
                .changed
                .wait_timeout(applied, deadline - now)
                .map_err(|_| GateError::Probe("probe state poisoned".into()))?;
            applied = guard;
        }
    }
}
