//! Membership relations and the resolved group closure.
//!
//! These are the rows the relationship store hands back. They are read-only
//! for the lifetime of a decision request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{RepoId, RepogroupId, UserId, UsergroupId};

/// A user is a direct member of a usergroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsergroupMembership {
    pub user_id: UserId,
    pub usergroup_id: UsergroupId,
}

/// `child` is a member of `parent`.
///
/// Members of `parent` are considered present in `child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsergroupNesting {
    pub parent: UsergroupId,
    pub child: UsergroupId,
}

/// A repo belongs to a repogroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepogroupMembership {
    pub repogroup_id: RepogroupId,
    pub repo_id: RepoId,
}

/// Every usergroup a user is present in, split by how it was reached.
///
/// `direct` holds the memberships the user was seeded with; `nesting` holds
/// every nesting edge followed from an already-included group. Keeping the
/// two apart lets callers answer which grant path produced an access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupClosure {
    pub user_id: UserId,
    pub direct: BTreeSet<UsergroupMembership>,
    pub nesting: BTreeSet<UsergroupNesting>,
}

impl GroupClosure {
    /// An empty closure for `user_id`.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            direct: BTreeSet::new(),
            nesting: BTreeSet::new(),
        }
    }

    /// The deduplicated set of group ids the user is present in.
    pub fn groups(&self) -> BTreeSet<UsergroupId> {
        self.direct
            .iter()
            .map(|m| m.usergroup_id)
            .chain(self.nesting.iter().map(|n| n.child))
            .collect()
    }

    /// True if `group` is in the closure.
    pub fn contains(&self, group: UsergroupId) -> bool {
        self.direct.iter().any(|m| m.usergroup_id == group)
            || self.nesting.iter().any(|n| n.child == group)
    }

    /// True if the user is a direct member of `group`.
    pub fn is_direct(&self, group: UsergroupId) -> bool {
        self.direct.iter().any(|m| m.usergroup_id == group)
    }
}
