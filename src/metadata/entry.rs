//! Descriptor and audit-trail value types
//!
//! Everything here is a plain value:
//! - `AuditEvent` is one observed row change, never mutated after read
//! - `ObjectEntry` / `ContentFileEntry` are complete route descriptors;
//!   a route swaps whole descriptors, it never edits one in place
//! - `CrudOps` is the operation bitmask shared by descriptors and
//!   privilege entries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AuditLogId, ObjectId};

/// Metadata tables the audit trail is watched for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    /// A published service (top of the path hierarchy).
    Service,
    /// A schema exposed under a service.
    Schema,
    /// A route-worthy database object (table or procedure).
    Object,
    /// A reference row hanging off an object (joins, nested results).
    Reference,
    /// A field or parameter row of an object.
    Field,
    /// A host the service answers on.
    Host,
    /// A set of static content files.
    ContentSet,
    /// A single static content file.
    ContentFile,
}

impl WatchedTable {
    /// Every watched table, in resolution order.
    pub const ALL: [WatchedTable; 8] = [
        WatchedTable::Service,
        WatchedTable::Schema,
        WatchedTable::Object,
        WatchedTable::Reference,
        WatchedTable::Field,
        WatchedTable::Host,
        WatchedTable::ContentSet,
        WatchedTable::ContentFile,
    ];

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedTable::Service => "service",
            WatchedTable::Schema => "schema",
            WatchedTable::Object => "object",
            WatchedTable::Reference => "reference",
            WatchedTable::Field => "field",
            WatchedTable::Host => "host",
            WatchedTable::ContentSet => "content_set",
            WatchedTable::ContentFile => "content_file",
        }
    }
}

impl fmt::Display for WatchedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row change observed through the audit trail.
///
/// - Insert carries only `new_row`
/// - Delete carries only `old_row`
/// - Update carries both (usually the same id)
#[derive(Clone, Debug, PartialEq)]
pub struct AuditEvent {
    /// Position of this row in the audit trail.
    pub id: AuditLogId,
    /// Table the changed row belongs to.
    pub table: WatchedTable,
    /// Row id before the change, if the row existed.
    pub old_row: Option<ObjectId>,
    /// Row id after the change, if the row still exists.
    pub new_row: Option<ObjectId>,
    /// Backend timestamp of the change.
    pub changed_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Event for a newly inserted row.
    pub fn insert(id: AuditLogId, table: WatchedTable, row: ObjectId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            table,
            old_row: None,
            new_row: Some(row),
            changed_at: at,
        }
    }

    /// Event for an updated row.
    pub fn update(
        id: AuditLogId,
        table: WatchedTable,
        old_row: ObjectId,
        new_row: ObjectId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            table,
            old_row: Some(old_row),
            new_row: Some(new_row),
            changed_at: at,
        }
    }

    /// Event for a deleted row.
    pub fn delete(id: AuditLogId, table: WatchedTable, row: ObjectId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            table,
            old_row: Some(row),
            new_row: None,
            changed_at: at,
        }
    }

    /// Distinct row ids this event touches (old first).
    pub fn row_ids(&self) -> Vec<ObjectId> {
        match (self.old_row, self.new_row) {
            (Some(old), Some(new)) if old == new => vec![old],
            (Some(old), Some(new)) => vec![old, new],
            (Some(old), None) => vec![old],
            (None, Some(new)) => vec![new],
            (None, None) => Vec::new(),
        }
    }
}

/// A single CRUD operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    /// The bitmask with only this operation set.
    pub fn mask(&self) -> CrudOps {
        match self {
            Operation::Create => CrudOps::CREATE,
            Operation::Read => CrudOps::READ,
            Operation::Update => CrudOps::UPDATE,
            Operation::Delete => CrudOps::DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bitmask of permitted CRUD operations.
///
/// Masks combine with `union`; there is no precedence between bits.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrudOps(u8);

impl CrudOps {
    pub const NONE: CrudOps = CrudOps(0b0000);
    pub const CREATE: CrudOps = CrudOps(0b0001);
    pub const READ: CrudOps = CrudOps(0b0010);
    pub const UPDATE: CrudOps = CrudOps(0b0100);
    pub const DELETE: CrudOps = CrudOps(0b1000);
    pub const ALL: CrudOps = CrudOps(0b1111);

    /// Builds a mask from raw bits; unknown bits are dropped.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Bitwise union of two masks.
    #[must_use]
    pub fn union(self, other: CrudOps) -> CrudOps {
        CrudOps(self.0 | other.0)
    }

    /// True when the mask permits the given operation.
    pub fn allows(&self, op: Operation) -> bool {
        self.0 & op.mask().0 != 0
    }

    /// True when no operation is permitted.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Four-letter form, `-` for unset bits (for example `CR--`).
    pub fn letters(&self) -> String {
        let mut out = String::with_capacity(4);
        for (op, letter) in [
            (Operation::Create, 'C'),
            (Operation::Read, 'R'),
            (Operation::Update, 'U'),
            (Operation::Delete, 'D'),
        ] {
            out.push(if self.allows(op) { letter } else { '-' });
        }
        out
    }
}

impl fmt::Debug for CrudOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CrudOps({})", self.letters())
    }
}

impl fmt::Display for CrudOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letters())
    }
}

/// Kind of database object a route binds to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A table or view, served as data rows.
    Table,
    /// A stored procedure or function, served as an invocation.
    Procedure,
}

impl ObjectKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Procedure => "procedure",
        }
    }
}

/// Shape of the payload a route produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// Paginated collection of items.
    Feed,
    /// A single item.
    Item,
    /// Raw bytes with a media type.
    Media,
}

impl ResultFormat {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Feed => "feed",
            ResultFormat::Item => "item",
            ResultFormat::Media => "media",
        }
    }
}

/// Direction of a field when the object is invoked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

impl ParamMode {
    /// True when a caller may supply this field.
    pub fn accepts_input(&self) -> bool {
        matches!(self, ParamMode::In | ParamMode::InOut)
    }
}

/// Declared type of a field or column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Long,
    Double,
    Boolean,
    Timestamp,
}

/// A field or parameter row of an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub id: ObjectId,
    /// Name the caller uses.
    pub name: String,
    /// Column or parameter the field binds to.
    pub bind_name: String,
    pub data_type: FieldType,
    pub mode: ParamMode,
    pub required: bool,
}

/// Binding of rows to the calling user via a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowOwnership {
    pub column: String,
}

/// Binding of rows to a user group via a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupOwnership {
    pub column: String,
}

/// Global publish toggle for the whole route table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Nothing is served; route descriptors are kept.
    #[default]
    Off,
    /// Active routes serve requests.
    On,
}

impl ServiceState {
    pub fn is_on(&self) -> bool {
        matches!(self, ServiceState::On)
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Off => "off",
            ServiceState::On => "on",
        }
    }
}

/// Complete descriptor of a route-worthy database object.
///
/// Carries everything a route needs so that serving never reads metadata:
/// the path triplet, the database binding, access rules and the field list.
/// `schema_requires_auth` is a snapshot of the enclosing schema's flag taken
/// when the descriptor was resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub id: ObjectId,
    pub service_id: ObjectId,
    pub schema_id: ObjectId,
    /// Request path segment of the service, with leading slash.
    pub service_path: String,
    /// Request path segment of the schema, with leading slash.
    pub schema_path: String,
    /// Request path segment of the object, with leading slash.
    pub object_path: String,
    /// Host the absolute URL is built against; empty for relative URLs.
    pub host: String,
    /// Database schema the object lives in.
    pub schema_name: String,
    /// Database object name.
    pub object_name: String,
    pub kind: ObjectKind,
    pub format: ResultFormat,
    /// Inactive objects never get a route.
    pub active: bool,
    pub requires_auth: bool,
    /// Snapshot of the enclosing schema's auth flag.
    pub schema_requires_auth: bool,
    pub crud: CrudOps,
    /// Pagination hint for feed results.
    pub items_per_page: u32,
    /// Fixed media type for media results.
    pub media_type: Option<String>,
    /// Sniff the media type from content instead of `media_type`.
    pub autodetect_media: bool,
    pub row_ownership: Option<RowOwnership>,
    pub group_ownership: Vec<GroupOwnership>,
    pub fields: Vec<FieldEntry>,
    /// Free-form options, passed through to handlers untouched.
    pub options: serde_json::Value,
}

impl ObjectEntry {
    /// Concatenated request path: service, schema, then object segment.
    pub fn request_path(&self) -> String {
        format!("{}{}{}", self.service_path, self.schema_path, self.object_path)
    }

    /// The three path segments that make up the route identity.
    pub fn path_segments(&self) -> (&str, &str, &str) {
        (&self.service_path, &self.schema_path, &self.object_path)
    }

    /// Own auth flag or the inherited schema flag.
    pub fn requires_authentication(&self) -> bool {
        self.requires_auth || self.schema_requires_auth
    }

    /// Fields a caller may supply.
    pub fn input_fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.iter().filter(|f| f.mode.accepts_input())
    }
}

/// Complete descriptor of a static content file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentFileEntry {
    pub id: ObjectId,
    pub service_id: ObjectId,
    pub content_set_id: ObjectId,
    /// Request path segment of the service, with leading slash.
    pub service_path: String,
    /// File path under the service, with leading slash.
    pub request_path: String,
    pub host: String,
    pub active: bool,
    pub requires_auth: bool,
    /// File size in bytes as recorded in metadata.
    pub size: u64,
    pub options: serde_json::Value,
}

impl ContentFileEntry {
    /// Full request path: service segment followed by the file path.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.service_path, self.request_path)
    }
}

/// Outcome of resolving one changed object.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectChange {
    /// The object exists (possibly new); the descriptor is current.
    Changed(ObjectEntry),
    /// The object is gone; only the id survives.
    Deleted(ObjectId),
}

impl ObjectChange {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectChange::Changed(entry) => entry.id,
            ObjectChange::Deleted(id) => *id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ObjectChange::Deleted(_))
    }
}

/// Outcome of resolving one changed content file.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentChange {
    Changed(ContentFileEntry),
    Deleted(ObjectId),
}

impl ContentChange {
    pub fn id(&self) -> ObjectId {
        match self {
            ContentChange::Changed(entry) => entry.id,
            ContentChange::Deleted(id) => *id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ContentChange::Deleted(_))
    }
}
