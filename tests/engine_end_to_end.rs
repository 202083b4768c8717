//! End-to-End Engine Tests
//!
//! Wires the real pieces together the way a serving process would:
//! metadata store -> change poller -> route manager -> refresh service,
//! with privileges and the consistency gate at the request edge.
//!
//! 1. One audit insert yields exactly one served route under the right
//!    schema, with handlers exactly while the engine is on
//! 2. Failures leave the watermark alone and the next tick heals
//! 3. Renames and schema moves keep the table exact
//! 4. Teardown never breaks an in-flight request
//! 5. The background loop applies changes and stops on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use restgate::changes::ChangePoller;
use restgate::config::EngineConfig;
use restgate::gate::{ConsistencyGate, MemoryProbe, ReplicationProbe, TransactionSet};
use restgate::metadata::{
    CrudOps, MemoryMetadataStore, MetadataStore, ObjectEntry, ObjectId, ObjectKind, Operation,
    ResultFormat, ServiceState,
};
use restgate::privileges::{MemoryPrivilegeSource, PrivilegeResolver, PrivilegeSource};
use restgate::refresh::Refresher;
use restgate::routes::{HandlerFactory, HandlerKind, RecordingHandlerFactory, RouteKey, RouteManager};

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

struct Engine {
    store: Arc<MemoryMetadataStore>,
    manager: Arc<RouteManager>,
    factory: Arc<RecordingHandlerFactory>,
    refresher: Arc<Refresher>,
}

fn engine() -> Engine {
    engine_with(EngineConfig::default())
}

fn engine_with(config: EngineConfig) -> Engine {
    let store = Arc::new(MemoryMetadataStore::new());
    let factory = Arc::new(RecordingHandlerFactory::new());
    let manager = Arc::new(
        RouteManager::new(
            Arc::clone(&store) as Arc<dyn MetadataStore>,
            Arc::clone(&factory) as Arc<dyn HandlerFactory>,
        )
        .with_https(config.https),
    );
    let poller = ChangePoller::new(Arc::clone(&store) as Arc<dyn MetadataStore>);
    let refresher = Arc::new(Refresher::new(
        poller,
        Arc::clone(&manager),
        Duration::from_millis(10),
    ));
    Engine {
        store,
        manager,
        factory,
        refresher,
    }
}

// =============================================================================
// INSERT TO SERVED ROUTE
// =============================================================================

/// Test: one audit insert becomes exactly one served route under the
/// right schema.
#[test]
fn test_insert_becomes_served_route() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));

    let outcome = engine.refresher.tick().unwrap();
    assert_eq!(outcome.summary.created, 1);
    assert_eq!(outcome.summary.schemas_created, 1);

    assert_eq!(engine.manager.route_count(), 1);
    let route = engine.manager.route_for_path("/svc/db/t1").unwrap();
    assert_eq!(
        route.handler_kinds(),
        vec![HandlerKind::Data, HandlerKind::Metadata]
    );
    let schema = engine.manager.schema("/svc/db").unwrap();
    assert_eq!(schema.member_count(), 1);
    assert!(schema.handler().is_some());
    assert!(engine
        .manager
        .schema_for_path("/svc/db/metadata-catalog")
        .is_some());
}

/// Test: with the service off, descriptors are tracked but nothing is
/// served; flipping the toggle lights everything up without new audit
/// rows.
#[test]
fn test_toggle_lights_routes_up() {
    let engine = engine();
    engine.store.insert_object(object_entry(1));

    engine.refresher.tick().unwrap();
    assert_eq!(engine.manager.route_count(), 1);
    assert_eq!(engine.manager.state(), ServiceState::Off);
    assert_eq!(engine.factory.live_count(), 0);

    // No audit rows, just the toggle.
    engine.store.set_service_enabled(true);
    let outcome = engine.refresher.tick().unwrap();
    assert_eq!(outcome.events_seen, 0);
    assert_eq!(engine.manager.state(), ServiceState::On);
    assert_eq!(engine.factory.live_count(), 3, "2 route + 1 catalog handler");

    engine.store.set_service_enabled(false);
    engine.refresher.tick().unwrap();
    assert_eq!(engine.manager.route_count(), 1);
    assert_eq!(engine.factory.live_count(), 0);
}

// =============================================================================
// FAILURE AND RECOVERY
// =============================================================================

/// Test: a failed poll leaves the watermark untouched and the next
/// tick applies the same window.
#[test]
fn test_failure_heals_on_next_tick() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));

    engine.store.fail_next_snapshot();
    engine.refresher.tick().unwrap_err();
    assert_eq!(engine.manager.route_count(), 0);

    let outcome = engine.refresher.tick().unwrap();
    assert_eq!(outcome.summary.created, 1);
    assert_eq!(engine.manager.route_count(), 1);
}

/// Test: a restarted poller resumes from a persisted watermark instead
/// of replaying history.
#[test]
fn test_restart_resumes_from_watermark() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));
    let outcome = engine.refresher.tick().unwrap();
    let saved = outcome.watermark;

    // New poller against the same trail, as after a process restart.
    let poller = ChangePoller::new(Arc::clone(&engine.store) as Arc<dyn MetadataStore>)
        .with_watermark(saved);
    let restarted = Refresher::new(poller, Arc::clone(&engine.manager), Duration::from_millis(10));
    let outcome = restarted.tick().unwrap();
    assert_eq!(outcome.events_seen, 0);
    assert!(outcome.summary.is_unchanged());
}

// =============================================================================
// LIFECYCLE EXACTNESS
// =============================================================================

/// Test: a rename is one identity change; old path dies, new one lives.
#[test]
fn test_rename_swaps_identity_in_place() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));
    engine.refresher.tick().unwrap();

    let mut renamed = object_entry(1);
    renamed.object_path = "/orders".to_string();
    engine.store.update_object(renamed);
    let outcome = engine.refresher.tick().unwrap();

    assert_eq!(outcome.summary.updated, 1);
    assert_eq!(outcome.summary.identity_changed, 1);
    assert_eq!(engine.manager.route_count(), 1);
    assert!(engine.manager.route_for_path("/svc/db/orders").is_some());
    assert!(engine.manager.route_for_path("/svc/db/t1").is_none());
}

/// Test: moving the last object out of a schema releases it and builds
/// the new one in the same tick.
#[test]
fn test_schema_move_releases_and_creates() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));
    engine.refresher.tick().unwrap();

    let mut moved = object_entry(1);
    moved.schema_path = "/analytics".to_string();
    moved.schema_name = "analytics".to_string();
    engine.store.update_object(moved);
    let outcome = engine.refresher.tick().unwrap();

    assert_eq!(outcome.summary.schemas_released, 1);
    assert_eq!(outcome.summary.schemas_created, 1);
    assert!(engine.manager.schema("/svc/db").is_none());
    assert_eq!(engine.manager.schema("/svc/analytics").unwrap().member_count(), 1);
}

/// Test: deleting the object tears the route down and releases the
/// schema, but an in-flight request keeps serving.
#[test]
fn test_delete_never_breaks_inflight_request() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));
    engine.refresher.tick().unwrap();

    let in_flight = engine.manager.route_for_path("/svc/db/t1").unwrap();
    let handlers = in_flight.handlers();

    engine.store.remove_object(oid(1));
    let outcome = engine.refresher.tick().unwrap();
    assert_eq!(outcome.summary.removed, 1);
    assert_eq!(outcome.summary.schemas_released, 1);
    assert_eq!(engine.manager.route_count(), 0);

    // The held route still answers with its last-known identity.
    assert_eq!(in_flight.request_path(), "/svc/db/t1");
    assert_eq!(handlers.len(), 2);
    assert_eq!(engine.factory.live_count(), 2);
    drop(handlers);
    assert_eq!(engine.factory.live_count(), 0);
}

// =============================================================================
// REQUEST EDGE
// =============================================================================

/// Test: a guarded read passes the gate, then privileges, then serves.
#[test]
fn test_guarded_read_path() {
    let engine = engine();
    engine.store.set_service_enabled(true);
    let mut entry = object_entry(1);
    entry.requires_auth = true;
    engine.store.insert_object(entry);
    engine.refresher.tick().unwrap();
    let route = engine.manager.route_for_path("/svc/db/t1").unwrap();

    // The caller demands its own write be visible first.
    let probe = Arc::new(MemoryProbe::new());
    probe.advance("db", 1);
    probe.advance("db", 2);
    let gate = ConsistencyGate::new(Arc::clone(&probe) as Arc<dyn ReplicationProbe>);
    gate.require_applied(&TransactionSet::parse("db:1-2").unwrap(), None)
        .unwrap();

    // Then privileges resolve over the role graph.
    let source = Arc::new(MemoryPrivilegeSource::new());
    source.add_user_role(oid(100), oid(110));
    source.grant(
        oid(110),
        Some(oid(200)),
        Some(oid(201)),
        Some(oid(1)),
        CrudOps::READ,
    );
    let privileges = PrivilegeResolver::new(source as Arc<dyn PrivilegeSource>)
        .resolve(oid(100))
        .unwrap();

    route.authorize(Operation::Read, Some(&privileges)).unwrap();
    route.authorize(Operation::Read, None).unwrap_err();
}

/// Test: config values flow into the wiring they name.
#[test]
fn test_config_drives_url_scheme() {
    let config = EngineConfig {
        https: true,
        ..EngineConfig::default()
    };
    let engine = engine_with(config);
    engine.store.set_service_enabled(true);
    engine.store.insert_object(object_entry(1));
    engine.refresher.tick().unwrap();

    let route = engine.manager.route(&RouteKey::object(oid(1))).unwrap();
    assert_eq!(route.url(), "https://api.example.com/svc/db/t1");
}

// =============================================================================
// BACKGROUND LOOP
// =============================================================================

/// Test: the background loop picks changes up by itself and stops
/// promptly on shutdown.
#[tokio::test]
async fn test_background_loop_applies_and_stops() {
    let engine = engine();
    engine.store.set_service_enabled(true);

    let handle = tokio::spawn(Arc::clone(&engine.refresher).run());

    engine.store.insert_object(object_entry(1));
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.manager.route_count() == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.manager.route_count(), 1);

    engine.store.remove_object(oid(1));
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.manager.route_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.manager.route_count(), 0);

    engine.refresher.shutdown();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run did not stop after shutdown")
        .unwrap();
}
