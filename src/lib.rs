//! restgate - metadata-driven REST route engine
//!
//! Watches an append-only audit trail for metadata changes, keeps a table of
//! live REST routes in sync with it, resolves caller privileges over the
//! role/group graph, and gates reads on replication positions.

pub mod changes;
pub mod config;
pub mod gate;
pub mod metadata;
pub mod observability;
pub mod privileges;
pub mod refresh;
pub mod routes;
