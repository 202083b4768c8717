//! Handler seam between route lifecycle and request serving.
//!
//! The engine decides only when handlers exist; what they answer lives
//! with the collaborator that implements [`HandlerFactory`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::route::Route;
use super::schema::RouteSchema;

/// What a handler serves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Rows of a table or view.
    Data,
    /// The per-object metadata document.
    Metadata,
    /// A stored procedure invocation.
    Invoke,
    /// Bytes of a static content file.
    Static,
    /// The schema-level metadata catalog.
    SchemaMetadata,
}

impl HandlerKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Data => "data",
            HandlerKind::Metadata => "metadata",
            HandlerKind::Invoke => "invoke",
            HandlerKind::Static => "static",
            HandlerKind::SchemaMetadata => "schema_metadata",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A live request handler.
///
/// In-flight requests hold their handler through an `Arc` clone, so a
/// handler dropped by the lifecycle keeps serving until the last
/// request finishes.
pub trait RouteHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;
}

/// Builds handlers when the lifecycle asks for them.
pub trait HandlerFactory: Send + Sync {
    fn data_handler(&self, route: &Arc<Route>) -> Arc<dyn RouteHandler>;

    fn metadata_handler(&self, route: &Arc<Route>) -> Arc<dyn RouteHandler>;

    fn invoke_handler(&self, route: &Arc<Route>) -> Arc<dyn RouteHandler>;

    fn static_handler(&self, route: &Arc<Route>) -> Arc<dyn RouteHandler>;

    fn schema_metadata_handler(&self, schema: &Arc<RouteSchema>) -> Arc<dyn RouteHandler>;
}

/// Factory double that counts what the lifecycle builds and drops.
///
/// Handlers record their kind and decrement the live counter on drop, so
/// tests can assert both handler composition and deferred destruction.
/// Handlers hold no reference back to their route.
#[derive(Debug, Default)]
pub struct RecordingHandlerFactory {
    built: AtomicUsize,
    live: Arc<AtomicUsize>,
}

impl RecordingHandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers built since construction.
    pub fn built_count(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    /// Handlers currently alive (built minus dropped).
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    fn build(&self, kind: HandlerKind) -> Arc<dyn RouteHandler> {
        self.built.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
        Arc::new(RecordingHandler {
            kind,
            live: self.live.clone(),
        })
    }
}

impl HandlerFactory for RecordingHandlerFactory {
    fn data_handler(&self, _route: &Arc<Route>) -> Arc<dyn RouteHandler> {
        self.build(HandlerKind::Data)
    }

    fn metadata_handler(&self, _route: &Arc<Route>) -> Arc<dyn RouteHandler> {
        self.build(HandlerKind::Metadata)
    }

    fn invoke_handler(&self, _route: &Arc<Route>) -> Arc<dyn RouteHandler> {
        self.build(HandlerKind::Invoke)
    }

    fn static_handler(&self, _route: &Arc<Route>) -> Arc<dyn RouteHandler> {
        self.build(HandlerKind::Static)
    }

    fn schema_metadata_handler(&self, _schema: &Arc<RouteSchema>) -> Arc<dyn RouteHandler> {
        self.build(HandlerKind::SchemaMetadata)
    }
}

struct RecordingHandler {
    kind: HandlerKind,
    live: Arc<AtomicUsize>,
}

impl RouteHandler for RecordingHandler {
    fn kind(&self) -> HandlerKind {
        self.kind
    }
}

impl Drop for RecordingHandler {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}
