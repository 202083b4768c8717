//! One poll's worth of observed changes.

use crate::metadata::{AuditLogId, ContentChange, ObjectChange, ServiceState};

/// Everything one poll observed.
///
/// The route manager applies a batch atomically: no request thread sees
/// some of its changes without the rest. `watermark` is the highest
/// audit position the batch covers; the caller commits it back to the
/// poller only after the batch was applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeBatch {
    /// Changed or deleted route-worthy objects, one entry per id.
    pub objects: Vec<ObjectChange>,
    /// Changed or deleted content files, one entry per id.
    pub content: Vec<ContentChange>,
    /// Global publish toggle at snapshot time.
    pub state: ServiceState,
    /// Highest audit position observed, or the poll's starting point
    /// when the trail had nothing new.
    pub watermark: AuditLogId,
    /// Raw audit rows read, before resolution and dedup.
    pub events_seen: usize,
}

impl ChangeBatch {
    /// A batch with no changes, carrying only state and watermark.
    pub fn empty(state: ServiceState, watermark: AuditLogId) -> Self {
        Self {
            objects: Vec::new(),
            content: Vec::new(),
            state,
            watermark,
            events_seen: 0,
        }
    }

    /// True when nothing changed; the state toggle still applies.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.content.is_empty()
    }

    /// Resolved changes across both families.
    pub fn change_count(&self) -> usize {
        self.objects.len() + self.content.len()
    }
}
