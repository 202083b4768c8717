//! Privilege Resolution
//!
//! Computes what a user may do, from two inheritance graphs:
//! - Roles inherit from parent roles
//! - Users belong to groups; groups nest; groups carry roles
//!
//! The resolver closes over both graphs, fetches the grants of every
//! reachable role and unions their CRUD masks per (service, schema,
//! object) tier. Wildcard tiers stay separate entries; `effective_for`
//! unions them at check time.
//!
//! Cycles in either graph are survived: traversal visits every node once,
//! flags the cycle and keeps the closure computed so far.

mod errors;
mod memory;
mod resolver;
mod set;
mod source;

pub use errors::{PrivilegeError, PrivilegeResult};
pub use memory::MemoryPrivilegeSource;
pub use resolver::PrivilegeResolver;
pub use set::{PrivilegeEntry, PrivilegeSet};
pub use source::{PrivilegeRow, PrivilegeSource};
