//! In-memory metadata backend
//!
//! Backs the engine in tests the way a SQL backend would in production:
//! rows live in maps, every mutation helper appends the matching audit
//! row, and a snapshot clones the whole state so it observes one point
//! in time no matter what the store does afterwards.
//!
//! Descriptors are stored bare: field and group rows are split into side
//! tables at seed time and only merged back by the diff engine's
//! enrichment step.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;

use super::entry::{
    AuditEvent, ContentFileEntry, FieldEntry, GroupOwnership, ObjectEntry, ServiceState,
    WatchedTable,
};
use super::id::{AuditLogId, ObjectId};
use super::store::{Column, MetadataSnapshot, MetadataStore, StoreError, StoreResult};

#[derive(Clone, Default)]
struct StoreState {
    log: Vec<AuditEvent>,
    next_audit_id: u64,
    objects: BTreeMap<ObjectId, ObjectEntry>,
    content: BTreeMap<ObjectId, ContentFileEntry>,
    /// Field row id -> owning object id.
    field_rows: BTreeMap<ObjectId, ObjectId>,
    /// Reference row id -> owning object id.
    reference_rows: BTreeMap<ObjectId, ObjectId>,
    groups: BTreeMap<ObjectId, Vec<GroupOwnership>>,
    fields: BTreeMap<ObjectId, Vec<FieldEntry>>,
    columns: BTreeMap<(String, String), Vec<Column>>,
    service_enabled: bool,
    fail_snapshot: bool,
    fail_finish: bool,
}

impl StoreState {
    fn append(&mut self, build: impl FnOnce(AuditLogId) -> AuditEvent) -> AuditLogId {
        self.next_audit_id += 1;
        let id = AuditLogId::new(self.next_audit_id);
        self.log.push(build(id));
        id
    }
}

/// In-memory implementation of [`MetadataStore`].
///
/// Every mutation helper that changes a row also appends the audit event a
/// real backend's triggers would write, so a poll right after a helper call
/// sees exactly that change. `seed_*` variants skip the audit row for
/// pre-existing state.
#[derive(Default)]
pub struct MemoryMetadataStore {
    state: Mutex<StoreState>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    fn store_object_row(state: &mut StoreState, entry: ObjectEntry) {
        let mut bare = entry;
        let fields = std::mem::take(&mut bare.fields);
        let groups = std::mem::take(&mut bare.group_ownership);
        for field in &fields {
            state.field_rows.insert(field.id, bare.id);
        }
        state.fields.insert(bare.id, fields);
        state.groups.insert(bare.id, groups);
        state.objects.insert(bare.id, bare);
    }

    /// Stores an object row without an audit event (pre-existing state).
    pub fn seed_object(&self, entry: ObjectEntry) {
        self.with_state(|state| Self::store_object_row(state, entry));
    }

    /// Inserts an object row and records the insert in the audit trail.
    pub fn insert_object(&self, entry: ObjectEntry) -> AuditLogId {
        self.with_state(|state| {
            let id = entry.id;
            Self::store_object_row(state, entry);
            state.append(|pos| AuditEvent::insert(pos, WatchedTable::Object, id, Utc::now()))
        })
    }

    /// Replaces an object row and records the update.
    pub fn update_object(&self, entry: ObjectEntry) -> AuditLogId {
        self.with_state(|state| {
            let id = entry.id;
            Self::store_object_row(state, entry);
            state.append(|pos| AuditEvent::update(pos, WatchedTable::Object, id, id, Utc::now()))
        })
    }

    /// Drops an object row and records the delete. A later poll resolves
    /// the row to nothing and synthesizes a tombstone.
    pub fn remove_object(&self, id: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.objects.remove(&id);
            state.fields.remove(&id);
            state.groups.remove(&id);
            state.field_rows.retain(|_, owner| *owner != id);
            state.reference_rows.retain(|_, owner| *owner != id);
            state.append(|pos| AuditEvent::delete(pos, WatchedTable::Object, id, Utc::now()))
        })
    }

    /// Records a field-tier change. The field resolves to its owning object
    /// if it was seeded as part of one.
    pub fn touch_field(&self, field_row: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.append(|pos| {
                AuditEvent::update(pos, WatchedTable::Field, field_row, field_row, Utc::now())
            })
        })
    }

    /// Links a reference row to its owning object.
    pub fn link_reference(&self, reference_row: ObjectId, object_id: ObjectId) {
        self.with_state(|state| {
            state.reference_rows.insert(reference_row, object_id);
        });
    }

    /// Records a reference-tier change.
    pub fn touch_reference(&self, reference_row: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.append(|pos| {
                AuditEvent::update(
                    pos,
                    WatchedTable::Reference,
                    reference_row,
                    reference_row,
                    Utc::now(),
                )
            })
        })
    }

    /// Records a service-tier change; touches every object and content
    /// file under the service.
    pub fn touch_service(&self, service_id: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.append(|pos| {
                AuditEvent::update(pos, WatchedTable::Service, service_id, service_id, Utc::now())
            })
        })
    }

    /// Records a schema-tier change; touches every object under the schema.
    pub fn touch_schema(&self, schema_id: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.append(|pos| {
                AuditEvent::update(pos, WatchedTable::Schema, schema_id, schema_id, Utc::now())
            })
        })
    }

    /// Records a host-tier change; touches everything.
    pub fn touch_host(&self, host_row: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.append(|pos| {
                AuditEvent::update(pos, WatchedTable::Host, host_row, host_row, Utc::now())
            })
        })
    }

    /// Stores a content-file row without an audit event.
    pub fn seed_content(&self, entry: ContentFileEntry) {
        self.with_state(|state| {
            state.content.insert(entry.id, entry);
        });
    }

    /// Inserts a content-file row and records the insert.
    pub fn insert_content(&self, entry: ContentFileEntry) -> AuditLogId {
        self.with_state(|state| {
            let id = entry.id;
            state.content.insert(id, entry);
            state.append(|pos| AuditEvent::insert(pos, WatchedTable::ContentFile, id, Utc::now()))
        })
    }

    /// Replaces a content-file row and records the update.
    pub fn update_content(&self, entry: ContentFileEntry) -> AuditLogId {
        self.with_state(|state| {
            let id = entry.id;
            state.content.insert(id, entry);
            state.append(|pos| {
                AuditEvent::update(pos, WatchedTable::ContentFile, id, id, Utc::now())
            })
        })
    }

    /// Drops a content-file row and records the delete.
    pub fn remove_content(&self, id: ObjectId) -> AuditLogId {
        self.with_state(|state| {
            state.content.remove(&id);
            state.append(|pos| AuditEvent::delete(pos, WatchedTable::ContentFile, id, Utc::now()))
        })
    }

    /// Flips the global publish toggle. No audit event: the state is read
    /// directly on every poll.
    pub fn set_service_enabled(&self, enabled: bool) {
        self.with_state(|state| state.service_enabled = enabled);
    }

    /// Replaces the group ownership rows of an object.
    pub fn set_object_groups(&self, object_id: ObjectId, groups: Vec<GroupOwnership>) {
        self.with_state(|state| {
            state.groups.insert(object_id, groups);
        });
    }

    /// Seeds the column set of a database table.
    pub fn set_table_columns(&self, schema_name: &str, object_name: &str, columns: Vec<Column>) {
        self.with_state(|state| {
            state
                .columns
                .insert((schema_name.to_string(), object_name.to_string()), columns);
        });
    }

    /// Makes the next `snapshot` call fail.
    pub fn fail_next_snapshot(&self) {
        self.with_state(|state| state.fail_snapshot = true);
    }

    /// Makes `finish` fail on the next snapshot taken.
    pub fn fail_next_finish(&self) {
        self.with_state(|state| state.fail_finish = true);
    }

    /// Highest audit position written so far.
    pub fn last_audit_id(&self) -> AuditLogId {
        self.with_state(|state| AuditLogId::new(state.next_audit_id))
    }

    /// Number of audit rows written so far.
    pub fn audit_len(&self) -> usize {
        self.with_state(|state| state.log.len())
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn snapshot(&self) -> StoreResult<Box<dyn MetadataSnapshot + '_>> {
        let view = self.with_state(|state| {
            if state.fail_snapshot {
                state.fail_snapshot = false;
                return Err(StoreError::Unavailable("snapshot failure injected".into()));
            }
            let view = state.clone();
            state.fail_finish = false;
            Ok(view)
        })?;
        Ok(Box::new(MemorySnapshot { view }))
    }

    fn table_columns(&self, schema_name: &str, object_name: &str) -> StoreResult<Vec<Column>> {
        Ok(self.with_state(|state| {
            state
                .columns
                .get(&(schema_name.to_string(), object_name.to_string()))
                .cloned()
                .unwrap_or_default()
        }))
    }
}

struct MemorySnapshot {
    view: StoreState,
}

impl MetadataSnapshot for MemorySnapshot {
    fn audit_events_since(
        &self,
        watermark: AuditLogId,
        tables: &[WatchedTable],
    ) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .view
            .log
            .iter()
            .filter(|event| event.id > watermark && tables.contains(&event.table))
            .cloned()
            .collect())
    }

    fn objects_touched_by(
        &self,
        table: WatchedTable,
        row: ObjectId,
    ) -> StoreResult<Vec<ObjectEntry>> {
        let objects = &self.view.objects;
        let hits: Vec<ObjectEntry> = match table {
            WatchedTable::Object => objects.get(&row).cloned().into_iter().collect(),
            WatchedTable::Field => self
                .view
                .field_rows
                .get(&row)
                .and_then(|owner| objects.get(owner))
                .cloned()
                .into_iter()
                .collect(),
            WatchedTable::Reference => self
                .view
                .reference_rows
                .get(&row)
                .and_then(|owner| objects.get(owner))
                .cloned()
                .into_iter()
                .collect(),
            WatchedTable::Schema => objects
                .values()
                .filter(|entry| entry.schema_id == row)
                .cloned()
                .collect(),
            WatchedTable::Service => objects
                .values()
                .filter(|entry| entry.service_id == row)
                .cloned()
                .collect(),
            WatchedTable::Host => objects.values().cloned().collect(),
            WatchedTable::ContentSet | WatchedTable::ContentFile => Vec::new(),
        };
        Ok(hits)
    }

    fn content_touched_by(
        &self,
        table: WatchedTable,
        row: ObjectId,
    ) -> StoreResult<Vec<ContentFileEntry>> {
        let content = &self.view.content;
        let hits: Vec<ContentFileEntry> = match table {
            WatchedTable::ContentFile => content.get(&row).cloned().into_iter().collect(),
            WatchedTable::ContentSet => content
                .values()
                .filter(|entry| entry.content_set_id == row)
                .cloned()
                .collect(),
            WatchedTable::Service => content
                .values()
                .filter(|entry| entry.service_id == row)
                .cloned()
                .collect(),
            WatchedTable::Host => content.values().cloned().collect(),
            _ => Vec::new(),
        };
        Ok(hits)
    }

    fn object_groups(&self, object_id: ObjectId) -> StoreResult<Vec<GroupOwnership>> {
        Ok(self.view.groups.get(&object_id).cloned().unwrap_or_default())
    }

    fn object_fields(&self, object_id: ObjectId) -> StoreResult<Vec<FieldEntry>> {
        Ok(self.view.fields.get(&object_id).cloned().unwrap_or_default())
    }

    fn service_state(&self) -> StoreResult<ServiceState> {
        Ok(if self.view.service_enabled {
            ServiceState::On
        } else {
            ServiceState::Off
        })
    }

    fn finish(self: Box<Self>) -> StoreResult<()> {
        if self.view.fail_finish {
            return Err(StoreError::Transaction("finish failure injected".into()));
        }
        Ok(())
    }
}
