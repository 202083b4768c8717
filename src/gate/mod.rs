//! Consistency Gate
//!
//! Lets a request demand "read your writes" against a replica:
//! - `TransactionSet` - normalized replication-position token
//! - `ReplicationProbe` - the backend seam (blocking wait + instant check)
//! - `ConsistencyGate` - sliced, cancellable waits with a hard deadline
//!
//! Invariants:
//! - `is_applied` never blocks
//! - A zero timeout degrades `wait_until_applied` to a single check
//! - Waits are sliced so cancellation is honored within one slice
//! - Gate waits run on request workers, never on the refresh timeline

mod consistency;
mod errors;
mod probe;
mod txid;

pub use consistency::{CancelToken, ConsistencyGate};
pub use errors::{GateError, GateResult};
pub use probe::{MemoryProbe, ReplicationProbe};
pub use txid::TransactionSet;
