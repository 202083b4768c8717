//! Change detection over the metadata audit trail
//!
//! The engine never diffs metadata tables directly. Every change to a
//! watched table leaves a row in an append-only audit trail; the poller
//! reads rows past its watermark, resolves each one to the top-level
//! objects it makes route-worthy and hands back one [`ChangeBatch`].
//!
//! # Invariants
//!
//! - One snapshot per poll; a poll observes a single consistent view
//! - `poll` never mutates the watermark; `commit` runs after the batch
//!   was applied, so a failed cycle re-reads the same rows next time
//! - One descriptor per object per batch, however many events touched it
//! - A tombstone carries only the id; the row is already gone

mod batch;
mod errors;
mod poller;

pub use batch::ChangeBatch;
pub use errors::{ChangeError, ChangeResult};
pub use poller::ChangePoller;
