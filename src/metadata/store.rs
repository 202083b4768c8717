//! Backend seam for metadata reads
//!
//! The engine never talks to a database directly. It depends on two narrow
//! traits:
//! - `MetadataStore` - long-lived handle, shared across threads
//! - `MetadataSnapshot` - one consistent read scope, used for a single poll
//!
//! A snapshot maps to a transaction on a real backend. Dropping a snapshot
//! without calling `finish` abandons it; `finish` commits the read scope so
//! a poll either observes a complete view or fails as a whole.

use thiserror::Error;

use super::entry::{
    AuditEvent, ContentFileEntry, FieldEntry, FieldType, GroupOwnership, ObjectEntry,
    ServiceState, WatchedTable,
};
use super::id::{AuditLogId, ObjectId};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a metadata backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("metadata query failed: {0}")]
    Query(String),

    #[error("metadata transaction failed: {0}")]
    Transaction(String),

    #[error("metadata backend unavailable: {0}")]
    Unavailable(String),
}

/// A table column as reported by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: FieldType,
    pub is_primary: bool,
}

/// One consistent read scope over the metadata.
///
/// All methods observe the same point in time. `finish` closes the scope;
/// any error from it invalidates everything read through the snapshot.
pub trait MetadataSnapshot {
    /// Audit rows with a position strictly greater than `watermark`,
    /// restricted to `tables`, in position order.
    fn audit_events_since(
        &self,
        watermark: AuditLogId,
        tables: &[WatchedTable],
    ) -> StoreResult<Vec<AuditEvent>>;

    /// Resolves a changed row of `table` to the objects it makes
    /// route-worthy. An object row resolves to itself; field and
    /// reference rows resolve to their owning object; service, schema
    /// and host rows fan out to every object under them. Returns an
    /// empty vector when the row leads nowhere anymore.
    fn objects_touched_by(&self, table: WatchedTable, row: ObjectId)
        -> StoreResult<Vec<ObjectEntry>>;

    /// Content-file counterpart of `objects_touched_by`.
    fn content_touched_by(
        &self,
        table: WatchedTable,
        row: ObjectId,
    ) -> StoreResult<Vec<ContentFileEntry>>;

    /// Group ownership rows of an object.
    fn object_groups(&self, object_id: ObjectId) -> StoreResult<Vec<GroupOwnership>>;

    /// Field and parameter rows of an object.
    fn object_fields(&self, object_id: ObjectId) -> StoreResult<Vec<FieldEntry>>;

    /// The global publish toggle at snapshot time.
    fn service_state(&self) -> StoreResult<ServiceState>;

    /// Closes the read scope.
    fn finish(self: Box<Self>) -> StoreResult<()>;
}

/// Long-lived metadata backend handle.
pub trait MetadataStore: Send + Sync {
    /// Opens a consistent read scope.
    fn snapshot(&self) -> StoreResult<Box<dyn MetadataSnapshot + '_>>;

    /// Columns of a database table, for the route column cache. Needs no
    /// snapshot: column sets change only with the objects that use them.
    fn table_columns(&self, schema_name: &str, object_name: &str) -> StoreResult<Vec<Column>>;
}
