//! One served route and its derived artifacts.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use regex::Regex;

use crate::metadata::{
    Column, ContentFileEntry, CrudOps, MetadataStore, ObjectEntry, ObjectId, ObjectKind,
    Operation, ServiceState,
};
use crate::observability::{log_event_with_fields, Event};
use crate::privileges::PrivilegeSet;

use super::errors::{RouteError, RouteResult};
use super::handler::{HandlerFactory, RouteHandler};

/// Which entry family a route serves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    Object,
    Content,
}

/// Ordered key of a route in the manager's table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteKey {
    pub kind: EntryKind,
    pub id: ObjectId,
}

impl RouteKey {
    pub fn object(id: ObjectId) -> Self {
        Self {
            kind: EntryKind::Object,
            id,
        }
    }

    pub fn content(id: ObjectId) -> Self {
        Self {
            kind: EntryKind::Content,
            id,
        }
    }
}

/// The descriptor a route currently serves.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteTarget {
    Object(ObjectEntry),
    Content(ContentFileEntry),
}

impl RouteTarget {
    pub fn key(&self) -> RouteKey {
        match self {
            RouteTarget::Object(entry) => RouteKey::object(entry.id),
            RouteTarget::Content(entry) => RouteKey::content(entry.id),
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            RouteTarget::Object(entry) => entry.id,
            RouteTarget::Content(entry) => entry.id,
        }
    }

    pub fn service_id(&self) -> ObjectId {
        match self {
            RouteTarget::Object(entry) => entry.service_id,
            RouteTarget::Content(entry) => entry.service_id,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            RouteTarget::Object(entry) => entry.active,
            RouteTarget::Content(entry) => entry.active,
        }
    }

    pub fn requires_authentication(&self) -> bool {
        match self {
            RouteTarget::Object(entry) => entry.requires_authentication(),
            RouteTarget::Content(entry) => entry.requires_auth,
        }
    }

    /// Operations the descriptor carries. Content files are read-only.
    pub fn access(&self) -> CrudOps {
        match self {
            RouteTarget::Object(entry) => entry.crud,
            RouteTarget::Content(_) => CrudOps::READ,
        }
    }

    /// The three path segments making up the route identity. Content
    /// files have no middle segment.
    pub fn path_triplet(&self) -> (&str, &str, &str) {
        match self {
            RouteTarget::Object(entry) => entry.path_segments(),
            RouteTarget::Content(entry) => (&entry.service_path, "", &entry.request_path),
        }
    }

    /// Tier addressed when checking privileges against this route.
    /// Content files sit under their content set the way objects sit
    /// under a schema.
    pub fn privilege_scope(&self) -> (ObjectId, ObjectId, ObjectId) {
        match self {
            RouteTarget::Object(entry) => (entry.service_id, entry.schema_id, entry.id),
            RouteTarget::Content(entry) => (entry.service_id, entry.content_set_id, entry.id),
        }
    }

    /// Whether a caller may supply a parameter of this name.
    pub fn accepts_parameter(&self, name: &str) -> bool {
        match self {
            RouteTarget::Object(entry) => entry.input_fields().any(|f| f.name == name),
            RouteTarget::Content(_) => false,
        }
    }

    pub fn options(&self) -> &serde_json::Value {
        match self {
            RouteTarget::Object(entry) => &entry.options,
            RouteTarget::Content(entry) => &entry.options,
        }
    }
}

/// Whether an update moved the route to a different request path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdentityChange {
    /// Same path triplet; only descriptor contents changed.
    Same,
    /// A path segment differs; absolute URLs and links must be rebuilt.
    Changed,
}

impl IdentityChange {
    #[inline]
    pub fn is_changed(&self) -> bool {
        matches!(self, IdentityChange::Changed)
    }
}

/// Immutable descriptor plus everything derived from it.
///
/// A request clones the current version once and reads only from the
/// clone, so a concurrent update can never show it half of an old and
/// half of a new descriptor.
pub struct RouteVersion {
    target: RouteTarget,
    raw_path: String,
    path_matcher: Regex,
    canonical_matcher: Option<Regex>,
    url: String,
    canonical_url: Option<String>,
    describe: Option<String>,
}

impl RouteVersion {
    const METADATA_SEGMENT: &'static str = "/metadata-catalog";

    fn build(target: RouteTarget, https: bool) -> RouteResult<Self> {
        let scheme = if https { "https" } else { "http" };
        match &target {
            RouteTarget::Object(entry) => {
                let (svc, schema, obj) = entry.path_segments();
                let raw_path = entry.request_path();
                // Item requests append a numeric key segment.
                let path_matcher = compile(&format!(
                    "^{}{}{}(/[0-9]*/?)?$",
                    regex::escape(svc),
                    regex::escape(schema),
                    regex::escape(obj)
                ))?;
                let canonical_matcher = compile(&format!(
                    "^{}{}{}{}/?$",
                    regex::escape(svc),
                    regex::escape(schema),
                    Self::METADATA_SEGMENT,
                    regex::escape(obj)
                ))?;
                let url = format!("{scheme}://{}{raw_path}", entry.host);
                let canonical_url = format!(
                    "{scheme}://{}{}{}{}{}",
                    entry.host,
                    svc,
                    schema,
                    Self::METADATA_SEGMENT,
                    obj
                );
                let describe = format!(
                    r#"{{"name":"{}","links":[{{"rel":"describes","href":"{}"}},{{"rel":"canonical","href":"{}"}}]}}"#,
                    entry.object_path, url, canonical_url
                );
                Ok(Self {
                    target,
                    raw_path,
                    path_matcher,
                    canonical_matcher: Some(canonical_matcher),
                    url,
                    canonical_url: Some(canonical_url),
                    describe: Some(describe),
                })
            }
            RouteTarget::Content(entry) => {
                let raw_path = entry.full_path();
                let path_matcher = compile(&format!("^{}$", regex::escape(&raw_path)))?;
                let url = format!("{scheme}://{}{raw_path}", entry.host);
                Ok(Self {
                    target,
                    raw_path,
                    path_matcher,
                    canonical_matcher: None,
                    url,
                    canonical_url: None,
                    describe: None,
                })
            }
        }
    }

    #[inline]
    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    /// Request path without matcher decoration.
    #[inline]
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Absolute URL of the route.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute URL of the metadata-catalog entry, object routes only.
    pub fn canonical_url(&self) -> Option<&str> {
        self.canonical_url.as_deref()
    }

    /// JSON self-description with `describes` and `canonical` links,
    /// object routes only.
    pub fn describe(&self) -> Option<&str> {
        self.describe.as_deref()
    }

    /// Whether a request path addresses this route, either directly or
    /// through its metadata-catalog entry.
    pub fn matches(&self, path: &str) -> bool {
        if self.path_matcher.is_match(path) {
            return true;
        }
        self.canonical_matcher
            .as_ref()
            .map(|m| m.is_match(path))
            .unwrap_or(false)
    }
}

fn compile(pattern: &str) -> RouteResult<Regex> {
    Regex::new(pattern).map_err(|err| RouteError::Internal(format!("Path matcher: {err}")))
}

/// Cached column set of the backing table.
///
/// Ownership-binding columns are hidden from callers unless they are
/// part of the primary key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnCache {
    columns: Vec<Column>,
    primary: Option<Column>,
}

impl ColumnCache {
    fn build(store: &dyn MetadataStore, version: &RouteVersion) -> RouteResult<Self> {
        let RouteTarget::Object(entry) = version.target() else {
            // Content routes have no backing table.
            return Ok(Self::default());
        };
        let mut columns = store
            .table_columns(&entry.schema_name, &entry.object_name)
            .map_err(|err| RouteError::ColumnCache(err.to_string()))?;

        let mut hidden: Vec<&str> = Vec::new();
        if let Some(own) = &entry.row_ownership {
            hidden.push(own.column.as_str());
        }
        for group in &entry.group_ownership {
            hidden.push(group.column.as_str());
        }
        columns.retain(|column| column.is_primary || !hidden.contains(&column.name.as_str()));

        let primary = columns.iter().find(|column| column.is_primary).cloned();
        Ok(Self { columns, primary })
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn primary(&self) -> Option<&Column> {
        self.primary.as_ref()
    }
}

/// A route serving one object or content file.
///
/// The descriptor and everything derived from it live in an `Arc`-swapped
/// [`RouteVersion`]; handlers and the column cache change independently.
/// Requests hold `Arc` clones of whatever they read, so teardown never
/// interrupts a request already in flight.
pub struct Route {
    me: Weak<Route>,
    key: RouteKey,
    https: bool,
    store: Arc<dyn MetadataStore>,
    factory: Arc<dyn HandlerFactory>,
    version: RwLock<Arc<RouteVersion>>,
    handlers: RwLock<Vec<Arc<dyn RouteHandler>>>,
    column_cache: Mutex<Option<Arc<ColumnCache>>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({:?})", self.key)
    }
}

impl Route {
    /// Builds a route around a descriptor. Handlers are not created
    /// until the first `turn`.
    pub fn new(
        target: RouteTarget,
        store: Arc<dyn MetadataStore>,
        factory: Arc<dyn HandlerFactory>,
        https: bool,
    ) -> RouteResult<Arc<Self>> {
        let key = target.key();
        let version = Arc::new(RouteVersion::build(target, https)?);
        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            key,
            https,
            store,
            factory,
            version: RwLock::new(version),
            handlers: RwLock::new(Vec::new()),
            column_cache: Mutex::new(None),
        }))
    }

    #[inline]
    pub fn key(&self) -> RouteKey {
        self.key
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.key.id
    }

    /// The version a request should read all descriptor fields from.
    pub fn current(&self) -> Arc<RouteVersion> {
        self.version.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn service_id(&self) -> ObjectId {
        self.current().target().service_id()
    }

    pub fn request_path(&self) -> String {
        self.current().raw_path().to_string()
    }

    pub fn url(&self) -> String {
        self.current().url().to_string()
    }

    pub fn access(&self) -> CrudOps {
        self.current().target().access()
    }

    pub fn requires_authentication(&self) -> bool {
        self.current().target().requires_authentication()
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.current().matches(path)
    }

    /// Key of the schema owning this route, `None` for content routes.
    pub fn schema_key(&self) -> Option<String> {
        match self.current().target() {
            RouteTarget::Object(entry) => {
                Some(format!("{}{}", entry.service_path, entry.schema_path))
            }
            RouteTarget::Content(_) => None,
        }
    }

    /// Whether the route currently serves anything.
    pub fn has_handlers(&self) -> bool {
        !self
            .handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_empty()
    }

    /// Current handler set, cloned for the caller.
    pub fn handlers(&self) -> Vec<Arc<dyn RouteHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Kinds of the current handler set.
    pub fn handler_kinds(&self) -> Vec<super::handler::HandlerKind> {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|handler| handler.kind())
            .collect()
    }

    /// Rebuilds or drops the handler set for the given global state.
    ///
    /// Off or an inactive descriptor drops the exposed surface only;
    /// descriptor and column cache survive so a later On is cheap.
    pub fn turn(&self, state: ServiceState) {
        let version = self.current();
        if !state.is_on() || !version.target().is_active() {
            self.set_handlers(Vec::new());
            return;
        }
        let Some(this) = self.me.upgrade() else {
            return;
        };
        let built: Vec<Arc<dyn RouteHandler>> = match version.target() {
            RouteTarget::Object(entry) => match entry.kind {
                ObjectKind::Table => vec![
                    self.factory.data_handler(&this),
                    self.factory.metadata_handler(&this),
                ],
                ObjectKind::Procedure => vec![
                    self.factory.invoke_handler(&this),
                    self.factory.metadata_handler(&this),
                ],
            },
            RouteTarget::Content(_) => vec![self.factory.static_handler(&this)],
        };
        self.set_handlers(built);
    }

    /// Swaps in a new descriptor and recomputes the derived artifacts.
    ///
    /// The column cache is cleared unconditionally; `Changed` is
    /// reported only when a path segment differs from the previous
    /// descriptor.
    pub fn update(&self, target: RouteTarget) -> RouteResult<IdentityChange> {
        let next = Arc::new(RouteVersion::build(target, self.https)?);
        let previous = {
            let mut guard = self
                .version
                .write()
                .map_err(|_| RouteError::Internal("Lock poisoned".into()))?;
            std::mem::replace(&mut *guard, next.clone())
        };
        self.clear_column_cache();
        if previous.target().path_triplet() != next.target().path_triplet() {
            Ok(IdentityChange::Changed)
        } else {
            Ok(IdentityChange::Same)
        }
    }

    /// Columns of the backing table, loaded on first use and kept until
    /// the next descriptor update.
    pub fn columns(&self) -> RouteResult<Arc<ColumnCache>> {
        let mut guard = self
            .column_cache
            .lock()
            .map_err(|_| RouteError::Internal("Lock poisoned".into()))?;
        if let Some(cache) = guard.as_ref() {
            return Ok(cache.clone());
        }
        let cache = Arc::new(ColumnCache::build(&*self.store, &self.current())?);
        *guard = Some(cache.clone());

        let count = cache.columns().len().to_string();
        let path = self.request_path();
        log_event_with_fields(
            Event::ColumnCacheLoaded,
            &[("columns", count.as_str()), ("path", path.as_str())],
        );
        Ok(cache)
    }

    /// Primary-key column of the backing table, if it has one.
    pub fn primary_column(&self) -> RouteResult<Option<Column>> {
        Ok(self.columns()?.primary().cloned())
    }

    /// Checks a request against state, descriptor and privileges.
    ///
    /// Rejection order: a route serving nothing answers `Disabled`; an
    /// operation the descriptor does not carry answers
    /// `UnsupportedOperation`; an anonymous caller on a protected route
    /// answers `AuthRequired`; a caller without the grant answers
    /// `Forbidden`. Public routes skip the privilege check.
    pub fn authorize(&self, op: Operation, user: Option<&PrivilegeSet>) -> RouteResult<()> {
        if !self.has_handlers() {
            return Err(RouteError::Disabled);
        }
        let version = self.current();
        if !version.target().access().allows(op) {
            return Err(RouteError::UnsupportedOperation { operation: op });
        }
        if !version.target().requires_authentication() {
            return Ok(());
        }
        let Some(privileges) = user else {
            return Err(RouteError::AuthRequired);
        };
        let (service, schema, object) = version.target().privilege_scope();
        if privileges.allows(service, schema, object, op) {
            Ok(())
        } else {
            Err(RouteError::Forbidden)
        }
    }

    /// Rejects parameters the object does not declare, before any
    /// database work happens.
    pub fn check_parameters(&self, names: &[&str]) -> RouteResult<()> {
        let version = self.current();
        for name in names {
            if !version.target().accepts_parameter(name) {
                return Err(RouteError::UnresolvedParameter {
                    name: (*name).to_string(),
                });
            }
        }
        Ok(())
    }

    fn set_handlers(&self, next: Vec<Arc<dyn RouteHandler>>) {
        let mut guard = self.handlers.write().unwrap_or_else(|p| p.into_inner());
        *guard = next;
    }

    fn clear_column_cache(&self) {
        let mut guard = self.column_cache.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::handler::{HandlerKind, RecordingHandlerFactory};
    use super::*;
    use crate::metadata::{
        FieldEntry, FieldType, GroupOwnership, MemoryMetadataStore, ParamMode, ResultFormat,
        RowOwnership,
    };

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 16];
        bytes[15] = n;
        ObjectId::from_bytes(bytes)
    }

    fn object_entry(n: u8) -> ObjectEntry {
        ObjectEntry {
            id: oid(n),
            service_id: oid(200),
            schema_id: oid(201),
            service_path: "/svc".to_string(),
            schema_path: "/db".to_string(),
            object_path: format!("/t{n}"),
            host: "api.example.com".to_string(),
            schema_name: "db".to_string(),
            object_name: format!("t{n}"),
            kind: ObjectKind::Table,
            format: ResultFormat::Feed,
            active: true,
            requires_auth: false,
            schema_requires_auth: false,
            crud: CrudOps::READ,
            items_per_page: 25,
            media_type: None,
            autodetect_media: false,
            row_ownership: None,
            group_ownership: Vec::new(),
            fields: Vec::new(),
            options: serde_json::Value::Null,
        }
    }

    fn content_entry(n: u8) -> ContentFileEntry {
        ContentFileEntry {
            id: oid(n),
            service_id: oid(200),
            content_set_id: oid(202),
            service_path: "/svc".to_string(),
            request_path: format!("/files/f{n}.html"),
            host: "api.example.com".to_string(),
            active: true,
            requires_auth: false,
            size: 64,
            options: serde_json::Value::Null,
        }
    }

    fn route_for(entry: ObjectEntry) -> (Arc<Route>, Arc<RecordingHandlerFactory>) {
        let store = Arc::new(MemoryMetadataStore::new());
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Object(entry),
            store,
            factory.clone(),
            false,
        )
        .unwrap();
        (route, factory)
    }

    #[test]
    fn test_derived_paths_and_urls() {
        let (route, _) = route_for(object_entry(1));
        let version = route.current();
        assert_eq!(version.raw_path(), "/svc/db/t1");
        assert_eq!(version.url(), "http://api.example.com/svc/db/t1");
        assert_eq!(
            version.canonical_url(),
            Some("http://api.example.com/svc/db/metadata-catalog/t1")
        );
        let describe = version.describe().unwrap();
        assert!(describe.contains(r#""name":"/t1""#));
        assert!(describe.contains(r#""rel":"describes""#));
        assert!(describe.contains(r#""rel":"canonical""#));
    }

    #[test]
    fn test_path_matcher_accepts_item_keys() {
        let (route, _) = route_for(object_entry(1));
        assert!(route.matches_path("/svc/db/t1"));
        assert!(route.matches_path("/svc/db/t1/42"));
        assert!(route.matches_path("/svc/db/t1/42/"));
        assert!(route.matches_path("/svc/db/t1/"));
        assert!(!route.matches_path("/svc/db/t10"));
        assert!(!route.matches_path("/svc/db/t1/abc"));
    }

    #[test]
    fn test_canonical_path_matches_same_route() {
        let (route, _) = route_for(object_entry(1));
        assert!(route.matches_path("/svc/db/metadata-catalog/t1"));
        assert!(route.matches_path("/svc/db/metadata-catalog/t1/"));
        assert!(!route.matches_path("/svc/db/metadata-catalog/t2"));
    }

    #[test]
    fn test_https_scheme_in_urls() {
        let store = Arc::new(MemoryMetadataStore::new());
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Object(object_entry(1)),
            store,
            factory,
            true,
        )
        .unwrap();
        assert_eq!(route.url(), "https://api.example.com/svc/db/t1");
    }

    #[test]
    fn test_turn_builds_table_handlers() {
        let (route, factory) = route_for(object_entry(1));
        assert!(!route.has_handlers());

        route.turn(ServiceState::On);
        assert_eq!(
            route.handler_kinds(),
            vec![HandlerKind::Data, HandlerKind::Metadata]
        );
        assert_eq!(factory.live_count(), 2);

        route.turn(ServiceState::Off);
        assert!(!route.has_handlers());
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_turn_builds_procedure_handlers() {
        let mut entry = object_entry(1);
        entry.kind = ObjectKind::Procedure;
        let (route, _) = route_for(entry);
        route.turn(ServiceState::On);
        assert_eq!(
            route.handler_kinds(),
            vec![HandlerKind::Invoke, HandlerKind::Metadata]
        );
    }

    #[test]
    fn test_turn_on_inactive_descriptor_stays_dark() {
        let mut entry = object_entry(1);
        entry.active = false;
        let (route, factory) = route_for(entry);
        route.turn(ServiceState::On);
        assert!(!route.has_handlers());
        assert_eq!(factory.built_count(), 0);
    }

    #[test]
    fn test_content_route_single_static_handler() {
        let store = Arc::new(MemoryMetadataStore::new());
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Content(content_entry(10)),
            store,
            factory,
            false,
        )
        .unwrap();
        route.turn(ServiceState::On);
        assert_eq!(route.handler_kinds(), vec![HandlerKind::Static]);
        assert!(route.matches_path("/svc/files/f10.html"));
        assert!(!route.matches_path("/svc/files/f10.html/1"));
        assert!(route.schema_key().is_none());
    }

    #[test]
    fn test_update_reports_identity_change_on_path_move() {
        let (route, _) = route_for(object_entry(1));

        let mut moved = object_entry(1);
        moved.object_path = "/renamed".to_string();
        let change = route.update(RouteTarget::Object(moved)).unwrap();
        assert_eq!(change, IdentityChange::Changed);
        assert!(route.matches_path("/svc/db/renamed"));
        assert!(!route.matches_path("/svc/db/t1"));
    }

    #[test]
    fn test_update_options_only_keeps_identity() {
        let (route, _) = route_for(object_entry(1));
        let mut tweaked = object_entry(1);
        tweaked.options = serde_json::json!({"page_size": 50});
        let change = route.update(RouteTarget::Object(tweaked)).unwrap();
        assert_eq!(change, IdentityChange::Same);
    }

    #[test]
    fn test_update_clears_column_cache() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.set_table_columns(
            "db",
            "t1",
            vec![Column {
                name: "id".to_string(),
                data_type: FieldType::Int,
                is_primary: true,
            }],
        );
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Object(object_entry(1)),
            store.clone(),
            factory,
            false,
        )
        .unwrap();

        assert_eq!(route.columns().unwrap().columns().len(), 1);

        // Backend changes; stale cache keeps answering until an update.
        store.set_table_columns(
            "db",
            "t1",
            vec![
                Column {
                    name: "id".to_string(),
                    data_type: FieldType::Int,
                    is_primary: true,
                },
                Column {
                    name: "label".to_string(),
                    data_type: FieldType::String,
                    is_primary: false,
                },
            ],
        );
        assert_eq!(route.columns().unwrap().columns().len(), 1);

        route.update(RouteTarget::Object(object_entry(1))).unwrap();
        assert_eq!(route.columns().unwrap().columns().len(), 2);
    }

    #[test]
    fn test_turn_cycle_keeps_column_cache() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.set_table_columns(
            "db",
            "t1",
            vec![Column {
                name: "id".to_string(),
                data_type: FieldType::Int,
                is_primary: true,
            }],
        );
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Object(object_entry(1)),
            store.clone(),
            factory,
            false,
        )
        .unwrap();
        route.turn(ServiceState::On);
        assert_eq!(route.columns().unwrap().columns().len(), 1);

        // Backend changes while the route cycles off and back on.
        store.set_table_columns(
            "db",
            "t1",
            vec![
                Column {
                    name: "id".to_string(),
                    data_type: FieldType::Int,
                    is_primary: true,
                },
                Column {
                    name: "label".to_string(),
                    data_type: FieldType::String,
                    is_primary: false,
                },
            ],
        );
        route.turn(ServiceState::Off);
        assert!(!route.has_handlers());
        route.turn(ServiceState::On);

        // The cache rode through the cycle; only a descriptor update
        // reloads it.
        assert_eq!(route.columns().unwrap().columns().len(), 1);
        route.update(RouteTarget::Object(object_entry(1))).unwrap();
        assert_eq!(route.columns().unwrap().columns().len(), 2);
    }

    #[test]
    fn test_primary_column_follows_the_cache() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.set_table_columns(
            "db",
            "t1",
            vec![
                Column {
                    name: "id".to_string(),
                    data_type: FieldType::Int,
                    is_primary: true,
                },
                Column {
                    name: "label".to_string(),
                    data_type: FieldType::String,
                    is_primary: false,
                },
            ],
        );
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Object(object_entry(1)),
            store,
            factory.clone(),
            false,
        )
        .unwrap();
        assert_eq!(
            route.primary_column().unwrap().map(|c| c.name),
            Some("id".to_string())
        );

        // Content routes have no backing table and no primary column.
        let content = Route::new(
            RouteTarget::Content(content_entry(10)),
            Arc::new(MemoryMetadataStore::new()),
            factory,
            false,
        )
        .unwrap();
        assert!(content.primary_column().unwrap().is_none());
    }

    #[test]
    fn test_column_cache_hides_ownership_columns() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.set_table_columns(
            "db",
            "t1",
            vec![
                Column {
                    name: "owner_id".to_string(),
                    data_type: FieldType::Int,
                    is_primary: true,
                },
                Column {
                    name: "group_id".to_string(),
                    data_type: FieldType::Int,
                    is_primary: false,
                },
                Column {
                    name: "label".to_string(),
                    data_type: FieldType::String,
                    is_primary: false,
                },
            ],
        );
        let mut entry = object_entry(1);
        // Primary ownership column stays visible; non-primary is hidden.
        entry.row_ownership = Some(RowOwnership {
            column: "owner_id".to_string(),
        });
        entry.group_ownership = vec![GroupOwnership {
            column: "group_id".to_string(),
        }];
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(RouteTarget::Object(entry), store, factory, false).unwrap();

        let cache = route.columns().unwrap();
        let names: Vec<&str> = cache.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["owner_id", "label"]);
        assert_eq!(cache.primary().map(|c| c.name.as_str()), Some("owner_id"));
    }

    #[test]
    fn test_content_route_has_empty_column_cache() {
        let store = Arc::new(MemoryMetadataStore::new());
        let factory = Arc::new(RecordingHandlerFactory::new());
        let route = Route::new(
            RouteTarget::Content(content_entry(10)),
            store,
            factory,
            false,
        )
        .unwrap();
        let cache = route.columns().unwrap();
        assert!(cache.columns().is_empty());
        assert!(cache.primary().is_none());
    }

    #[test]
    fn test_authorize_rejects_disabled_first() {
        let mut entry = object_entry(1);
        entry.requires_auth = true;
        let (route, _) = route_for(entry);
        // No handlers yet: disabled wins over the missing credentials.
        let err = route.authorize(Operation::Read, None).unwrap_err();
        assert_eq!(err, RouteError::Disabled);
    }

    #[test]
    fn test_authorize_unsupported_before_auth() {
        let mut entry = object_entry(1);
        entry.requires_auth = true;
        entry.crud = CrudOps::READ;
        let (route, _) = route_for(entry);
        route.turn(ServiceState::On);

        let err = route.authorize(Operation::Delete, None).unwrap_err();
        assert_eq!(
            err,
            RouteError::UnsupportedOperation {
                operation: Operation::Delete
            }
        );
    }

    #[test]
    fn test_authorize_anonymous_on_protected_route() {
        let mut entry = object_entry(1);
        entry.requires_auth = true;
        let (route, _) = route_for(entry);
        route.turn(ServiceState::On);

        let err = route.authorize(Operation::Read, None).unwrap_err();
        assert_eq!(err, RouteError::AuthRequired);
    }

    #[test]
    fn test_authorize_public_route_skips_privileges() {
        let (route, _) = route_for(object_entry(1));
        route.turn(ServiceState::On);
        assert!(route.authorize(Operation::Read, None).is_ok());
    }

    #[test]
    fn test_authorize_forbidden_without_grant() {
        use crate::privileges::{MemoryPrivilegeSource, PrivilegeResolver};

        let mut entry = object_entry(1);
        entry.requires_auth = true;
        let (route, _) = route_for(entry);
        route.turn(ServiceState::On);

        // Resolved set with no grants at all.
        let source = MemoryPrivilegeSource::new();
        let empty = PrivilegeResolver::new(Arc::new(source))
            .resolve(oid(99))
            .unwrap();
        let err = route.authorize(Operation::Read, Some(&empty)).unwrap_err();
        assert_eq!(err, RouteError::Forbidden);
    }

    #[test]
    fn test_authorize_granted_user_passes() {
        use crate::privileges::{MemoryPrivilegeSource, PrivilegeResolver};

        let mut entry = object_entry(1);
        entry.requires_auth = true;
        let (route, _) = route_for(entry);
        route.turn(ServiceState::On);

        let source = MemoryPrivilegeSource::new();
        source.add_user_role(oid(99), oid(50));
        source.grant(oid(50), Some(oid(200)), None, None, CrudOps::READ);
        let set = PrivilegeResolver::new(Arc::new(source))
            .resolve(oid(99))
            .unwrap();
        assert!(route.authorize(Operation::Read, Some(&set)).is_ok());
    }

    #[test]
    fn test_check_parameters() {
        let mut entry = object_entry(1);
        entry.fields = vec![
            FieldEntry {
                id: oid(30),
                name: "city".to_string(),
                bind_name: "city".to_string(),
                data_type: FieldType::String,
                mode: ParamMode::In,
                required: false,
            },
            FieldEntry {
                id: oid(31),
                name: "total".to_string(),
                bind_name: "total".to_string(),
                data_type: FieldType::Double,
                mode: ParamMode::Out,
                required: false,
            },
        ];
        let (route, _) = route_for(entry);

        assert!(route.check_parameters(&["city"]).is_ok());
        // Out-only fields cannot be supplied.
        let err = route.check_parameters(&["total"]).unwrap_err();
        assert_eq!(
            err,
            RouteError::UnresolvedParameter {
                name: "total".to_string()
            }
        );
        let err = route.check_parameters(&["city", "bogus"]).unwrap_err();
        assert_eq!(
            err,
            RouteError::UnresolvedParameter {
                name: "bogus".to_string()
            }
        );
    }

    #[test]
    fn test_handlers_outlive_teardown() {
        let (route, factory) = route_for(object_entry(1));
        route.turn(ServiceState::On);

        // A request grabs the handler set, then the route goes dark.
        let in_flight = route.handlers();
        route.turn(ServiceState::Off);
        assert!(!route.has_handlers());
        assert_eq!(factory.live_count(), 2);

        drop(in_flight);
        assert_eq!(factory.live_count(), 0);
    }
}
