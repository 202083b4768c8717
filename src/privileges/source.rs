//! Backend trait for the privilege graphs.

use crate::metadata::{CrudOps, ObjectId};

use super::errors::PrivilegeResult;

/// One grant row: a role allows `crud` on a tier.
///
/// The tier is addressed by service, optionally narrowed to a schema and
/// further to an object. `ObjectId::MIN` in a populated column means
/// "any", and is surfaced here as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeRow {
    /// Role the grant belongs to.
    pub role_id: ObjectId,
    /// Service the grant applies to, `None` for any service.
    pub service_id: Option<ObjectId>,
    /// Schema the grant applies to, `None` for any schema.
    pub schema_id: Option<ObjectId>,
    /// Object the grant applies to, `None` for any object.
    pub object_id: Option<ObjectId>,
    /// Operations the grant allows.
    pub crud: CrudOps,
}

/// Read access to the role and group graphs.
///
/// All edge queries are single-step: the resolver walks the transitive
/// closure itself so a backend only has to answer direct membership.
pub trait PrivilegeSource: Send + Sync {
    /// Roles granted directly to the user.
    fn user_roles(&self, user_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>>;

    /// Parent roles a role inherits from.
    fn role_parents(&self, role_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>>;

    /// Groups the user is a direct member of.
    fn user_groups(&self, user_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>>;

    /// Parent groups a group nests under.
    fn group_parents(&self, group_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>>;

    /// Roles attached to a group.
    fn group_roles(&self, group_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>>;

    /// Grant rows for a set of roles.
    fn grants_for_roles(&self, role_ids: &[ObjectId]) -> PrivilegeResult<Vec<PrivilegeRow>>;
}
