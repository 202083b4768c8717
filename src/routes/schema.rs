//! Schema grouping for object routes.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock, Weak};

use regex::Regex;

use crate::metadata::{ObjectEntry, ObjectId, ServiceState};

use super::errors::{RouteError, RouteResult};
use super::handler::{HandlerFactory, RouteHandler};
use super::route::RouteKey;

/// One schema path prefix and the routes registered under it.
///
/// Schemas own their member keys; member routes refer back only through
/// the schema key, so schema lifetime is governed by the member set
/// alone. The manager releases a schema exactly when `unregister`
/// reports the set became empty.
pub struct RouteSchema {
    me: Weak<RouteSchema>,
    key: String,
    name: String,
    service_id: ObjectId,
    schema_id: ObjectId,
    requires_auth: bool,
    catalog_matcher: Regex,
    url: String,
    members: Mutex<BTreeSet<RouteKey>>,
    handler: RwLock<Option<Arc<dyn RouteHandler>>>,
    state: Mutex<ServiceState>,
    factory: Arc<dyn HandlerFactory>,
}

impl RouteSchema {
    const METADATA_SEGMENT: &'static str = "/metadata-catalog";

    /// Builds the schema an object entry belongs to.
    pub fn new(
        entry: &ObjectEntry,
        https: bool,
        factory: Arc<dyn HandlerFactory>,
    ) -> RouteResult<Arc<Self>> {
        let key = format!("{}{}", entry.service_path, entry.schema_path);
        let catalog_matcher = Regex::new(&format!(
            "^{}{}{}/?$",
            regex::escape(&entry.service_path),
            regex::escape(&entry.schema_path),
            Self::METADATA_SEGMENT
        ))
        .map_err(|err| RouteError::Internal(format!("Catalog matcher: {err}")))?;
        let scheme = if https { "https" } else { "http" };
        let url = format!(
            "{scheme}://{}{}{}{}",
            entry.host,
            entry.service_path,
            entry.schema_path,
            Self::METADATA_SEGMENT
        );
        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            key,
            name: entry.schema_path.clone(),
            service_id: entry.service_id,
            schema_id: entry.schema_id,
            requires_auth: entry.schema_requires_auth,
            catalog_matcher,
            url,
            members: Mutex::new(BTreeSet::new()),
            handler: RwLock::new(None),
            state: Mutex::new(ServiceState::Off),
            factory,
        }))
    }

    /// Service path plus schema path; the manager's table key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Schema path segment.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute URL of the schema's metadata catalog.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn service_id(&self) -> ObjectId {
        self.service_id
    }

    #[inline]
    pub fn schema_id(&self) -> ObjectId {
        self.schema_id
    }

    #[inline]
    pub fn requires_authentication(&self) -> bool {
        self.requires_auth
    }

    /// Whether a request path addresses this schema's catalog.
    pub fn matches_path(&self, path: &str) -> bool {
        self.catalog_matcher.is_match(path)
    }

    /// Adds a member route key. Registering twice is a no-op.
    pub fn register(&self, key: RouteKey) {
        let mut members = self.members.lock().unwrap_or_else(|p| p.into_inner());
        members.insert(key);
    }

    /// Removes a member route key. Returns true exactly when this call
    /// took the member set from one to zero; the caller releases the
    /// schema then and only then.
    pub fn unregister(&self, key: RouteKey) -> bool {
        let mut members = self.members.lock().unwrap_or_else(|p| p.into_inner());
        let removed = members.remove(&key);
        removed && members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Current catalog handler, if the schema is serving.
    pub fn handler(&self) -> Option<Arc<dyn RouteHandler>> {
        self.handler.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Creates or drops the catalog handler for the given state.
    /// Idempotent: turning to the current state changes nothing.
    pub fn turn(&self, state: ServiceState) {
        {
            let mut current = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *current == state {
                return;
            }
            *current = state;
        }
        if state.is_on() {
            let Some(this) = self.me.upgrade() else {
                return;
            };
            let handler = self.factory.schema_metadata_handler(&this);
            let mut guard = self.handler.write().unwrap_or_else(|p| p.into_inner());
            *guard = Some(handler);
        } else {
            let mut guard = self.handler.write().unwrap_or_else(|p| p.into_inner());
            *guard = None;
        }
    }
}
