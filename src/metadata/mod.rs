//! Metadata Domain Types
//!
//! Vocabulary shared by the change-diff engine, the route manager and the
//! privilege resolver:
//! - `ObjectId` - Totally ordered 16-byte identity for every metadata row
//! - `AuditLogId` - Monotonic position in the append-only audit trail
//! - `ObjectEntry` / `ContentFileEntry` - Route-worthy descriptors
//! - `AuditEvent` - One row change observed through the audit trail
//! - `MetadataStore` / `MetadataSnapshot` - The backend seam
//! - `MemoryMetadataStore` - In-memory backend for tests
//!
//! Descriptors are plain values. Everything mutable lives behind the store
//! traits so a poll sees one consistent read scope.

mod entry;
mod id;
mod memory;
mod store;

pub use entry::{
    AuditEvent, ContentChange, ContentFileEntry, CrudOps, FieldEntry, FieldType, GroupOwnership,
    ObjectChange, ObjectEntry, ObjectKind, Operation, ParamMode, ResultFormat, RowOwnership,
    ServiceState, WatchedTable,
};
pub use id::{AuditLogId, IdParseError, ObjectId};
pub use memory::MemoryMetadataStore;
pub use store::{Column, MetadataSnapshot, MetadataStore, StoreError, StoreResult};
