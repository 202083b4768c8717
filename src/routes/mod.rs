//! Route and schema lifecycle
//!
//! A [`Route`] serves one database object or content file. Routes live in
//! a [`RouteManager`] keyed by [`RouteKey`]; object routes additionally
//! register with the [`RouteSchema`] owning their path prefix.
//!
//! # Invariants
//!
//! - One writer: batches apply under a single write lock, a request never
//!   observes a half-applied batch
//! - Requests read through `Arc` clones; a torn-down route finishes its
//!   in-flight requests before its handlers drop
//! - A schema is released exactly when its last member unregisters
//! - Ownership runs one way: schemas own member keys, routes refer back
//!   by schema key only

mod errors;
mod handler;
mod manager;
mod route;
mod schema;

pub use errors::{RouteError, RouteResult};
pub use handler::{HandlerFactory, HandlerKind, RecordingHandlerFactory, RouteHandler};
pub use manager::{ApplySummary, RouteManager};
pub use route::{ColumnCache, EntryKind, IdentityChange, Route, RouteKey, RouteTarget, RouteVersion};
pub use schema::RouteSchema;
