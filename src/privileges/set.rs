//! Resolved privilege sets.

use crate::metadata::{CrudOps, ObjectId, Operation};

/// One resolved grant tier with its unioned CRUD mask.
///
/// `None` in a column means the grant covers every id at that level.
/// Entries with different wildcard shapes are never merged with each
/// other; the union across shapes happens in [`PrivilegeSet::effective_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeEntry {
    /// Backend grant rows may leave even the service unset; such a row
    /// is a global grant and is honored as-is, like the narrower
    /// wildcard shapes.
    pub service_id: Option<ObjectId>,
    pub schema_id: Option<ObjectId>,
    pub object_id: Option<ObjectId>,
    pub crud: CrudOps,
}

impl PrivilegeEntry {
    /// Whether this entry applies to the addressed tier.
    fn matches(
        &self,
        service_id: ObjectId,
        schema_id: ObjectId,
        object_id: ObjectId,
    ) -> bool {
        fn level(col: Option<ObjectId>, wanted: ObjectId) -> bool {
            match col {
                None => true,
                Some(id) => id == wanted,
            }
        }
        level(self.service_id, service_id)
            && level(self.schema_id, schema_id)
            && level(self.object_id, object_id)
    }
}

/// Everything a user is allowed to do, computed once per request cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeSet {
    entries: Vec<PrivilegeEntry>,
    cycle_detected: bool,
}

impl PrivilegeSet {
    pub(super) fn new(entries: Vec<PrivilegeEntry>, cycle_detected: bool) -> Self {
        Self {
            entries,
            cycle_detected,
        }
    }

    /// Grant tiers in this set.
    #[inline]
    pub fn entries(&self) -> &[PrivilegeEntry] {
        &self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether resolution ran into a cycle in the role or group graph.
    ///
    /// The set is still usable; every node reachable before the cycle
    /// closed contributed its grants.
    #[inline]
    pub fn cycle_detected(&self) -> bool {
        self.cycle_detected
    }

    /// Union of every entry that covers the addressed object.
    ///
    /// Wildcard entries contribute alongside exact ones; a service-wide
    /// READ and an object-level CREATE combine to CREATE|READ.
    pub fn effective_for(
        &self,
        service_id: ObjectId,
        schema_id: ObjectId,
        object_id: ObjectId,
    ) -> CrudOps {
        self.entries
            .iter()
            .filter(|entry| entry.matches(service_id, schema_id, object_id))
            .fold(CrudOps::NONE, |acc, entry| acc.union(entry.crud))
    }

    /// Whether the addressed object permits `op`.
    pub fn allows(
        &self,
        service_id: ObjectId,
        schema_id: ObjectId,
        object_id: ObjectId,
        op: Operation,
    ) -> bool {
        self.effective_for(service_id, schema_id, object_id).allows(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        let mut bytes = [0u8; 16];
        bytes[15] = n;
        ObjectId::from_bytes(bytes)
    }

    fn entry(
        service: Option<u8>,
        schema: Option<u8>,
        object: Option<u8>,
        crud: CrudOps,
    ) -> PrivilegeEntry {
        PrivilegeEntry {
            service_id: service.map(id),
            schema_id: schema.map(id),
            object_id: object.map(id),
            crud,
        }
    }

    #[test]
    fn test_empty_set_allows_nothing() {
        let set = PrivilegeSet::default();
        assert!(set.is_empty());
        assert_eq!(set.effective_for(id(1), id(2), id(3)), CrudOps::NONE);
        assert!(!set.allows(id(1), id(2), id(3), Operation::Read));
    }

    #[test]
    fn test_exact_entry_matches_only_its_object() {
        let set = PrivilegeSet::new(
            vec![entry(Some(1), Some(2), Some(3), CrudOps::READ)],
            false,
        );
        assert_eq!(set.effective_for(id(1), id(2), id(3)), CrudOps::READ);
        assert_eq!(set.effective_for(id(1), id(2), id(4)), CrudOps::NONE);
        assert_eq!(set.effective_for(id(9), id(2), id(3)), CrudOps::NONE);
    }

    #[test]
    fn test_wildcards_union_with_exact() {
        let set = PrivilegeSet::new(
            vec![
                entry(Some(1), None, None, CrudOps::READ),
                entry(Some(1), Some(2), Some(3), CrudOps::CREATE),
            ],
            false,
        );
        // The object gets both the service-wide and the exact grant.
        let effective = set.effective_for(id(1), id(2), id(3));
        assert!(effective.allows(Operation::Read));
        assert!(effective.allows(Operation::Create));
        // A sibling object only gets the service-wide grant.
        let sibling = set.effective_for(id(1), id(2), id(7));
        assert!(sibling.allows(Operation::Read));
        assert!(!sibling.allows(Operation::Create));
    }

    #[test]
    fn test_global_wildcard_covers_everything() {
        let set = PrivilegeSet::new(vec![entry(None, None, None, CrudOps::ALL)], false);
        assert_eq!(set.effective_for(id(8), id(9), id(10)), CrudOps::ALL);
    }

    #[test]
    fn test_schema_wildcard_scoped_to_service() {
        let set = PrivilegeSet::new(
            vec![entry(Some(1), Some(2), None, CrudOps::UPDATE)],
            false,
        );
        assert!(set.allows(id(1), id(2), id(3), Operation::Update));
        assert!(set.allows(id(1), id(2), id(4), Operation::Update));
        assert!(!set.allows(id(1), id(5), id(3), Operation::Update));
    }

    #[test]
    fn test_cycle_flag_carried() {
        let set = PrivilegeSet::new(vec![], true);
        assert!(set.cycle_detected());
        assert!(set.is_empty());
    }
}
