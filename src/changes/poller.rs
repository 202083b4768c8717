//! The audit-trail poller.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::metadata::{
    AuditEvent, AuditLogId, ContentChange, MetadataSnapshot, MetadataStore, ObjectChange,
    ObjectId, WatchedTable,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::batch::ChangeBatch;
use super::errors::ChangeResult;

/// Diffs the audit trail against a watermark.
///
/// `poll` is read-only and may run any number of times over the same
/// trail position; the watermark moves only through `commit`, which the
/// caller invokes after the batch was applied. A cycle that fails
/// between poll and commit therefore re-reads the same rows next time.
pub struct ChangePoller {
    store: Arc<dyn MetadataStore>,
    watermark: AuditLogId,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ChangePoller {
    /// Poller starting at the bottom of the trail. The first poll
    /// resolves every audit row ever written; start from a persisted
    /// watermark with [`ChangePoller::with_watermark`] to skip history.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            watermark: AuditLogId::ZERO,
            metrics: None,
        }
    }

    /// Starts the poller at a persisted trail position.
    pub fn with_watermark(mut self, watermark: AuditLogId) -> Self {
        self.watermark = watermark;
        self
    }

    /// Count observed events and tombstones in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Trail position up to which changes have been applied.
    #[inline]
    pub fn watermark(&self) -> AuditLogId {
        self.watermark
    }

    /// Advances the watermark after a batch was applied. Never moves
    /// backwards; committing an old position is a no-op.
    pub fn commit(&mut self, watermark: AuditLogId) {
        if watermark > self.watermark {
            self.watermark = watermark;
        }
    }

    /// Reads everything past the watermark and resolves it to a batch.
    ///
    /// One snapshot covers the whole poll. Each audit row is resolved to
    /// the top-level objects it makes route-worthy; an object touched by
    /// many rows yields one descriptor. An object-tier or content-file
    /// row that no longer resolves becomes a tombstone. Survivors are
    /// enriched with their group and field rows before the snapshot is
    /// finished.
    pub fn poll(&self) -> ChangeResult<ChangeBatch> {
        let snap = self.store.snapshot()?;
        let state = snap.service_state()?;
        let events = snap.audit_events_since(self.watermark, &WatchedTable::ALL)?;

        let mut batch = ChangeBatch::empty(state, self.watermark);
        batch.events_seen = events.len();

        let mut seen_objects: BTreeSet<ObjectId> = BTreeSet::new();
        let mut seen_content: BTreeSet<ObjectId> = BTreeSet::new();

        for event in &events {
            if event.id > batch.watermark {
                batch.watermark = event.id;
            }
            match event.table {
                WatchedTable::ContentSet | WatchedTable::ContentFile => {
                    self.resolve_content(&*snap, event, &mut seen_content, &mut batch.content)?;
                }
                // A service or host row carries path and URL segments for
                // both families.
                WatchedTable::Service | WatchedTable::Host => {
                    self.resolve_objects(&*snap, event, &mut seen_objects, &mut batch.objects)?;
                    self.resolve_content(&*snap, event, &mut seen_content, &mut batch.content)?;
                }
                WatchedTable::Schema
                | WatchedTable::Object
                | WatchedTable::Reference
                | WatchedTable::Field => {
                    self.resolve_objects(&*snap, event, &mut seen_objects, &mut batch.objects)?;
                }
            }
        }

        // Resolution returns bare descriptors; merge in the rows the
        // per-tier lookups leave out.
        for change in &mut batch.objects {
            if let ObjectChange::Changed(entry) = change {
                entry.group_ownership = snap.object_groups(entry.id)?;
                entry.fields = snap.object_fields(entry.id)?;
            }
        }

        snap.finish()?;

        if let Some(metrics) = &self.metrics {
            metrics.add_audit_events(batch.events_seen as u64);
        }
        Ok(batch)
    }

    fn resolve_objects(
        &self,
        snap: &dyn MetadataSnapshot,
        event: &AuditEvent,
        seen: &mut BTreeSet<ObjectId>,
        out: &mut Vec<ObjectChange>,
    ) -> ChangeResult<()> {
        for row in event.row_ids() {
            let entries = snap.objects_touched_by(event.table, row)?;
            if entries.is_empty() {
                // Only an object row leading nowhere means a route went
                // away; other tiers resolve empty when the owner is gone
                // and the owner's own event already covers that.
                if event.table == WatchedTable::Object && seen.insert(row) {
                    self.note_tombstone(event.table, row);
                    out.push(ObjectChange::Deleted(row));
                }
                continue;
            }
            for entry in entries {
                if seen.insert(entry.id) {
                    out.push(ObjectChange::Changed(entry));
                }
            }
        }
        Ok(())
    }

    fn resolve_content(
        &self,
        snap: &dyn MetadataSnapshot,
        event: &AuditEvent,
        seen: &mut BTreeSet<ObjectId>,
        out: &mut Vec<ContentChange>,
    ) -> ChangeResult<()> {
        for row in event.row_ids() {
            let entries = snap.content_touched_by(event.table, row)?;
            if entries.is_empty() {
                if event.table == WatchedTable::ContentFile && seen.insert(row) {
                    self.note_tombstone(event.table, row);
                    out.push(ContentChange::Deleted(row));
                }
                continue;
            }
            for entry in entries {
                if seen.insert(entry.id) {
                    out.push(ContentChange::Changed(entry));
                }
            }
        }
        Ok(())
    }

    fn note_tombstone(&self, table: WatchedTable, row: ObjectId) {
        let id = row.to_hex();
        log_event_with_fields(
            Event::TombstoneObserved,
            &[("id", id.as_str()), ("table", table.as_str())],
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_tombstones();
        }
    }
}
