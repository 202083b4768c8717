//! Background refresh service
//!
//! Drives the poll / apply / commit cycle on a timer:
//! - One tick = one poll, one batch application, one watermark commit
//! - The poller sits behind a mutex, so ticks can never overlap
//! - A failed tick leaves the watermark alone; the next tick retries
//! - Shutdown interrupts the timer instead of waiting it out
//!
//! The service never touches the consistency gate. Replication waits
//! belong to request workers; the refresh timeline must stay free to
//! apply the writes those workers are waiting for.

mod errors;
mod service;

pub use errors::{RefreshError, RefreshResult};
pub use service::{Refresher, TickOutcome};
