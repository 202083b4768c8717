//! In-memory privilege source for tests and embedding.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::metadata::{CrudOps, ObjectId};

use super::errors::PrivilegeResult;
use super::source::{PrivilegeRow, PrivilegeSource};

#[derive(Debug, Default, Clone)]
struct GraphState {
    user_roles: BTreeMap<ObjectId, Vec<ObjectId>>,
    role_parents: BTreeMap<ObjectId, Vec<ObjectId>>,
    user_groups: BTreeMap<ObjectId, Vec<ObjectId>>,
    group_parents: BTreeMap<ObjectId, Vec<ObjectId>>,
    group_roles: BTreeMap<ObjectId, Vec<ObjectId>>,
    grants: Vec<PrivilegeRow>,
}

/// Privilege source backed by in-process maps.
///
/// Edges are appended through the builder-style methods; duplicates are
/// kept as-is since resolution deduplicates reachable nodes anyway.
#[derive(Debug, Default)]
pub struct MemoryPrivilegeSource {
    state: Mutex<GraphState>,
}

impl MemoryPrivilegeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GraphState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    /// Grant a role directly to a user.
    pub fn add_user_role(&self, user_id: ObjectId, role_id: ObjectId) {
        self.with_state(|s| s.user_roles.entry(user_id).or_default().push(role_id));
    }

    /// Make `role_id` inherit from `parent_id`.
    pub fn add_role_parent(&self, role_id: ObjectId, parent_id: ObjectId) {
        self.with_state(|s| s.role_parents.entry(role_id).or_default().push(parent_id));
    }

    /// Put a user into a group.
    pub fn add_user_group(&self, user_id: ObjectId, group_id: ObjectId) {
        self.with_state(|s| s.user_groups.entry(user_id).or_default().push(group_id));
    }

    /// Nest `group_id` under `parent_id`.
    pub fn add_group_parent(&self, group_id: ObjectId, parent_id: ObjectId) {
        self.with_state(|s| {
            s.group_parents.entry(group_id).or_default().push(parent_id)
        });
    }

    /// Attach a role to a group.
    pub fn add_group_role(&self, group_id: ObjectId, role_id: ObjectId) {
        self.with_state(|s| s.group_roles.entry(group_id).or_default().push(role_id));
    }

    /// Record a grant row for a role.
    pub fn grant(
        &self,
        role_id: ObjectId,
        service_id: Option<ObjectId>,
        schema_id: Option<ObjectId>,
        object_id: Option<ObjectId>,
        crud: CrudOps,
    ) {
        self.with_state(|s| {
            s.grants.push(PrivilegeRow {
                role_id,
                service_id,
                schema_id,
                object_id,
                crud,
            })
        });
    }
}

impl PrivilegeSource for MemoryPrivilegeSource {
    fn user_roles(&self, user_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>> {
        Ok(self.with_state(|s| s.user_roles.get(&user_id).cloned().unwrap_or_default()))
    }

    fn role_parents(&self, role_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>> {
        Ok(self.with_state(|s| s.role_parents.get(&role_id).cloned().unwrap_or_default()))
    }

    fn user_groups(&self, user_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>> {
        Ok(self.with_state(|s| s.user_groups.get(&user_id).cloned().unwrap_or_default()))
    }

    fn group_parents(&self, group_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>> {
        Ok(self.with_state(|s| s.group_parents.get(&group_id).cloned().unwrap_or_default()))
    }

    fn group_roles(&self, group_id: ObjectId) -> PrivilegeResult<Vec<ObjectId>> {
        Ok(self.with_state(|s| s.group_roles.get(&group_id).cloned().unwrap_or_default()))
    }

    fn grants_for_roles(&self, role_ids: &[ObjectId]) -> PrivilegeResult<Vec<PrivilegeRow>> {
        Ok(self.with_state(|s| {
            s.grants
                .iter()
                .filter(|row| role_ids.contains(&row.role_id))
                .cloned()
                .collect()
        }))
    }
}
