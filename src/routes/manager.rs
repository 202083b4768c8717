//! The route table and batch application.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::changes::ChangeBatch;
use crate::metadata::{
    ContentChange, ContentFileEntry, MetadataStore, ObjectChange, ObjectEntry, ServiceState,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{RouteError, RouteResult};
use super::handler::HandlerFactory;
use super::route::{Route, RouteKey, RouteTarget};
use super::schema::RouteSchema;

/// What one batch application did to the table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub identity_changed: usize,
    pub schemas_created: usize,
    pub schemas_released: usize,
}

impl ApplySummary {
    /// True when the batch left the table untouched.
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }
}

#[derive(Default)]
struct RouteTables {
    routes: BTreeMap<RouteKey, Arc<Route>>,
    schemas: BTreeMap<String, Arc<RouteSchema>>,
    state: ServiceState,
}

/// Owns every route and schema, and applies change batches to them.
///
/// Writes happen on the single refresh timeline; request workers only
/// read. One write lock spans a whole batch, so a request sees the
/// table before or after a batch, never in between. Readers clone the
/// `Arc`s they need and drop the lock before doing anything else.
pub struct RouteManager {
    tables: RwLock<RouteTables>,
    store: Arc<dyn MetadataStore>,
    factory: Arc<dyn HandlerFactory>,
    https: bool,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RouteManager {
    pub fn new(store: Arc<dyn MetadataStore>, factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            tables: RwLock::new(RouteTables::default()),
            store,
            factory,
            https: false,
            metrics: None,
        }
    }

    /// Serve absolute URLs with the https scheme.
    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Mirror lifecycle counts into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Applies one change batch under a single write lock.
    ///
    /// The batch's service state applies first, then every object and
    /// content change. Inactive or deleted entries tear their route
    /// down; a tombstone for an id the table never held is a no-op.
    pub fn apply(&self, batch: &ChangeBatch) -> RouteResult<ApplySummary> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| RouteError::Internal("Lock poisoned".into()))?;
        let mut summary = ApplySummary::default();

        self.apply_state(&mut tables, batch.state);

        for change in &batch.objects {
            match change {
                ObjectChange::Changed(entry) if entry.active => {
                    self.upsert_object(&mut tables, entry, &mut summary)?;
                }
                // An inactive descriptor tears down like a tombstone; it
                // is never instantiated fresh.
                ObjectChange::Changed(entry) => {
                    self.remove_route(&mut tables, RouteKey::object(entry.id), &mut summary);
                }
                ObjectChange::Deleted(id) => {
                    self.remove_route(&mut tables, RouteKey::object(*id), &mut summary);
                }
            }
        }
        for change in &batch.content {
            match change {
                ContentChange::Changed(entry) if entry.active => {
                    self.upsert_content(&mut tables, entry, &mut summary)?;
                }
                ContentChange::Changed(entry) => {
                    self.remove_route(&mut tables, RouteKey::content(entry.id), &mut summary);
                }
                ContentChange::Deleted(id) => {
                    self.remove_route(&mut tables, RouteKey::content(*id), &mut summary);
                }
            }
        }

        Ok(summary)
    }

    /// Flips the global state and cascades to every schema and route.
    /// Idempotent when the state is unchanged.
    pub fn turn(&self, state: ServiceState) -> RouteResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| RouteError::Internal("Lock poisoned".into()))?;
        self.apply_state(&mut tables, state);
        Ok(())
    }

    /// Current global state.
    pub fn state(&self) -> ServiceState {
        self.tables.read().unwrap_or_else(|p| p.into_inner()).state
    }

    /// Route by table key.
    pub fn route(&self, key: &RouteKey) -> Option<Arc<Route>> {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .routes
            .get(key)
            .cloned()
    }

    /// First route whose matcher accepts the path.
    pub fn route_for_path(&self, path: &str) -> Option<Arc<Route>> {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .routes
            .values()
            .find(|route| route.matches_path(path))
            .cloned()
    }

    /// Like [`RouteManager::route_for_path`] but answers `NotFound` for
    /// unmatched paths.
    pub fn resolve_path(&self, path: &str) -> RouteResult<Arc<Route>> {
        self.route_for_path(path)
            .ok_or_else(|| RouteError::NotFound(path.to_string()))
    }

    /// Schema by table key (service path plus schema path).
    pub fn schema(&self, key: &str) -> Option<Arc<RouteSchema>> {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .schemas
            .get(key)
            .cloned()
    }

    /// Schema whose metadata-catalog path matches.
    pub fn schema_for_path(&self, path: &str) -> Option<Arc<RouteSchema>> {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .schemas
            .values()
            .find(|schema| schema.matches_path(path))
            .cloned()
    }

    pub fn route_count(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .routes
            .len()
    }

    pub fn schema_count(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .schemas
            .len()
    }

    fn apply_state(&self, tables: &mut RouteTables, state: ServiceState) {
        if tables.state == state {
            return;
        }
        tables.state = state;
        for schema in tables.schemas.values() {
            schema.turn(state);
        }
        for route in tables.routes.values() {
            route.turn(state);
        }
        log_event_with_fields(Event::ServiceStateChanged, &[("state", state.as_str())]);
    }

    fn upsert_object(
        &self,
        tables: &mut RouteTables,
        entry: &ObjectEntry,
        summary: &mut ApplySummary,
    ) -> RouteResult<()> {
        let key = RouteKey::object(entry.id);
        let Some(route) = tables.routes.get(&key).cloned() else {
            let route = Route::new(
                RouteTarget::Object(entry.clone()),
                self.store.clone(),
                self.factory.clone(),
                self.https,
            )?;
            let schema = self.ensure_schema(tables, entry, summary)?;
            schema.register(key);
            route.turn(tables.state);
            tables.routes.insert(key, route);
            summary.created += 1;
            self.note_route_event(Event::RouteCreated, entry.request_path());
            if let Some(metrics) = &self.metrics {
                metrics.increment_routes_created();
            }
            return Ok(());
        };

        // Read the old schema key before the descriptor swap.
        let old_schema_key = route.schema_key();
        let change = route.update(RouteTarget::Object(entry.clone()))?;

        let new_schema_key = format!("{}{}", entry.service_path, entry.schema_path);
        if old_schema_key.as_deref() != Some(new_schema_key.as_str()) {
            if let Some(old_key) = old_schema_key {
                self.detach_member(tables, &old_key, key, summary);
            }
            let schema = self.ensure_schema(tables, entry, summary)?;
            schema.register(key);
        }

        summary.updated += 1;
        self.note_route_event(Event::RouteUpdated, entry.request_path());
        if let Some(metrics) = &self.metrics {
            metrics.increment_routes_updated();
        }
        if change.is_changed() {
            summary.identity_changed += 1;
            self.note_route_event(Event::RouteIdentityChanged, entry.request_path());
            if let Some(metrics) = &self.metrics {
                metrics.increment_route_identity_changes();
            }
        }
        Ok(())
    }

    fn upsert_content(
        &self,
        tables: &mut RouteTables,
        entry: &ContentFileEntry,
        summary: &mut ApplySummary,
    ) -> RouteResult<()> {
        let key = RouteKey::content(entry.id);
        let Some(route) = tables.routes.get(&key).cloned() else {
            let route = Route::new(
                RouteTarget::Content(entry.clone()),
                self.store.clone(),
                self.factory.clone(),
                self.https,
            )?;
            route.turn(tables.state);
            tables.routes.insert(key, route);
            summary.created += 1;
            self.note_route_event(Event::RouteCreated, entry.full_path());
            if let Some(metrics) = &self.metrics {
                metrics.increment_routes_created();
            }
            return Ok(());
        };

        let change = route.update(RouteTarget::Content(entry.clone()))?;
        summary.updated += 1;
        self.note_route_event(Event::RouteUpdated, entry.full_path());
        if let Some(metrics) = &self.metrics {
            metrics.increment_routes_updated();
        }
        if change.is_changed() {
            summary.identity_changed += 1;
            self.note_route_event(Event::RouteIdentityChanged, entry.full_path());
            if let Some(metrics) = &self.metrics {
                metrics.increment_route_identity_changes();
            }
        }
        Ok(())
    }

    fn remove_route(
        &self,
        tables: &mut RouteTables,
        key: RouteKey,
        summary: &mut ApplySummary,
    ) {
        let Some(route) = tables.routes.remove(&key) else {
            return;
        };
        if let Some(schema_key) = route.schema_key() {
            self.detach_member(tables, &schema_key, key, summary);
        }
        // Drops our handler references; in-flight requests keep theirs.
        route.turn(ServiceState::Off);
        summary.removed += 1;
        self.note_route_event(Event::RouteRemoved, route.request_path());
        if let Some(metrics) = &self.metrics {
            metrics.increment_routes_removed();
        }
    }

    fn detach_member(
        &self,
        tables: &mut RouteTables,
        schema_key: &str,
        key: RouteKey,
        summary: &mut ApplySummary,
    ) {
        let Some(schema) = tables.schemas.get(schema_key).cloned() else {
            return;
        };
        if schema.unregister(key) {
            schema.turn(ServiceState::Off);
            tables.schemas.remove(schema_key);
            summary.schemas_released += 1;
            log_event_with_fields(Event::SchemaReleased, &[("path", schema_key)]);
            if let Some(metrics) = &self.metrics {
                metrics.increment_schemas_released();
            }
        }
    }

    fn ensure_schema(
        &self,
        tables: &mut RouteTables,
        entry: &ObjectEntry,
        summary: &mut ApplySummary,
    ) -> RouteResult<Arc<RouteSchema>> {
        let key = format!("{}{}", entry.service_path, entry.schema_path);
        if let Some(schema) = tables.schemas.get(&key) {
            return Ok(schema.clone());
        }
        let schema = RouteSchema::new(entry, self.https, self.factory.clone())?;
        schema.turn(tables.state);
        tables.schemas.insert(key.clone(), schema.clone());
        summary.schemas_created += 1;
        log_event_with_fields(Event::SchemaCreated, &[("path", key.as_str())]);
        if let Some(metrics) = &self.metrics {
            metrics.increment_schemas_created();
        }
        Ok(schema)
    }

    fn note_route_event(&self, event: Event, path: String) {
        log_event_with_fields(event, &[("path", path.as_str())]);
    }
}
