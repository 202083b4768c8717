//! Transitive closure over the role and group graphs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::metadata::{CrudOps, ObjectId};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::PrivilegeResult;
use super::set::{PrivilegeEntry, PrivilegeSet};
use super::source::PrivilegeSource;

/// Resolves a user's effective privileges.
///
/// Resolution walks the group graph first, collects the roles attached
/// to every reachable group plus the user's direct roles, then walks
/// the role inheritance graph from those seeds. Grant rows of every
/// reachable role are unioned per tier.
pub struct PrivilegeResolver {
    source: Arc<dyn PrivilegeSource>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PrivilegeResolver {
    pub fn new(source: Arc<dyn PrivilegeSource>) -> Self {
        Self {
            source,
            metrics: None,
        }
    }

    /// Count resolutions and detected cycles in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Compute the privilege set for `user_id`.
    ///
    /// A cycle in either graph does not abort resolution: every node is
    /// visited at most once, the cycle is flagged on the returned set
    /// and reported, and resolution continues with the rest of the
    /// graph.
    pub fn resolve(&self, user_id: ObjectId) -> PrivilegeResult<PrivilegeSet> {
        let group_seeds = self.source.user_groups(user_id)?;
        let (groups, group_cycle) =
            close_over(group_seeds, |g| self.source.group_parents(g))?;

        let mut role_seeds = self.source.user_roles(user_id)?;
        for group in &groups {
            role_seeds.extend(self.source.group_roles(*group)?);
        }
        let (roles, role_cycle) =
            close_over(role_seeds, |r| self.source.role_parents(r))?;

        let role_list: Vec<ObjectId> = roles.iter().copied().collect();
        let rows = self.source.grants_for_roles(&role_list)?;

        // Union masks per tier. Tiers with distinct wildcard shapes stay
        // distinct entries.
        let mut tiers: BTreeMap<
            (Option<ObjectId>, Option<ObjectId>, Option<ObjectId>),
            CrudOps,
        > = BTreeMap::new();
        for row in rows {
            let key = (row.service_id, row.schema_id, row.object_id);
            let mask = tiers.entry(key).or_insert(CrudOps::NONE);
            *mask = mask.union(row.crud);
        }
        let entries: Vec<PrivilegeEntry> = tiers
            .into_iter()
            .map(|((service_id, schema_id, object_id), crud)| PrivilegeEntry {
                service_id,
                schema_id,
                object_id,
                crud,
            })
            .collect();

        let cycle_detected = group_cycle || role_cycle;
        let user = user_id.to_hex();
        if cycle_detected {
            log_event_with_fields(Event::PrivilegeCycleDetected, &[("user", user.as_str())]);
            if let Some(metrics) = &self.metrics {
                metrics.increment_privilege_cycles();
            }
        }

        let role_count = roles.len().to_string();
        let entry_count = entries.len().to_string();
        log_event_with_fields(
            Event::PrivilegesResolved,
            &[
                ("entries", entry_count.as_str()),
                ("roles", role_count.as_str()),
                ("user", user.as_str()),
            ],
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_privilege_resolutions();
        }

        Ok(PrivilegeSet::new(entries, cycle_detected))
    }
}

/// Depth-first closure over one graph.
///
/// Returns every node reachable from `seeds` (seeds included) and
/// whether a back edge was seen. Nodes currently on the traversal path
/// are tracked separately from finished nodes so converging edges in a
/// DAG are not mistaken for cycles.
fn close_over(
    seeds: Vec<ObjectId>,
    mut neighbors: impl FnMut(ObjectId) -> PrivilegeResult<Vec<ObjectId>>,
) -> PrivilegeResult<(BTreeSet<ObjectId>, bool)> {
    enum Frame {
        Enter(ObjectId),
        Leave(ObjectId),
    }

    let mut closed: BTreeSet<ObjectId> = BTreeSet::new();
    let mut on_path: BTreeSet<ObjectId> = BTreeSet::new();
    let mut cycle = false;
    let mut stack: Vec<Frame> = seeds.into_iter().map(Frame::Enter).collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if on_path.contains(&node) {
                    cycle = true;
                    continue;
                }
                if !closed.insert(node) {
                    continue;
                }
                on_path.insert(node);
                stack.push(Frame::Leave(node));
                for next in neighbors(node)? {
                    stack.push(Frame::Enter(next));
                }
            }
            Frame::Leave(node) => {
                on_path.remove(&node);
            }
        }
    }

    Ok((closed, cycle))
}
