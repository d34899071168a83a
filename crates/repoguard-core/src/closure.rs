//! Group closure resolution.
//!
//! A user is present in every usergroup they are a direct member of, and in
//! every group nested (transitively) under one of those. The closure is
//! computed as an explicit fixed point:
//!
//!   frontier := direct groups
//!   loop: fetch edges leaving frontier; unseen children become the next frontier
//!
//! A group enters the visited set once and is never expanded again, so the
//! traversal terminates on any edge set, cyclic or not. Each iteration issues
//! one `nested_usergroups` lookup bounded by the frontier.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, warn};

use repoguard_contracts::{
    entity::{UserId, UsergroupId},
    error::AuthzResult,
    relation::{GroupClosure, UsergroupMembership, UsergroupNesting},
};

use crate::traits::StoreSnapshot;

/// Resolves the group closure of a user against a store snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureResolver;

impl ClosureResolver {
    pub fn new() -> Self {
        Self
    }

    /// Compute the closure of `user` from `snapshot`.
    ///
    /// # Errors
    ///
    /// Propagates any lookup failure unchanged. No partial closure is
    /// returned.
    pub fn resolve(&self, snapshot: &dyn StoreSnapshot, user: UserId) -> AuthzResult<GroupClosure> {
        let direct = snapshot.direct_usergroups(user)?;
        let closure = expand(user, direct, |frontier| snapshot.nested_usergroups(frontier))?;

        let cyclic = cycle_members(&closure.nesting);
        if !cyclic.is_empty() {
            warn!(
                user_id = user.0,
                groups = ?cyclic,
                "usergroup nesting contains a cycle; closure truncated at revisited groups"
            );
        }

        debug!(
            user_id = user.0,
            direct = closure.direct.len(),
            nested = closure.nesting.len(),
            groups = closure.groups().len(),
            "group closure resolved"
        );
        Ok(closure)
    }

    /// The chain of groups through which `user` reaches `target`, starting
    /// at one of the user's direct groups and ending at `target`.
    ///
    /// Returns `None` when `target` is not in the closure. The shortest chain
    /// is returned.
    pub fn path_to(&self, closure: &GroupClosure, target: UsergroupId) -> Option<Vec<UsergroupId>> {
        let mut children: BTreeMap<UsergroupId, Vec<UsergroupId>> = BTreeMap::new();
        for edge in &closure.nesting {
            children.entry(edge.parent).or_default().push(edge.child);
        }

        let mut came_from: BTreeMap<UsergroupId, Option<UsergroupId>> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for m in &closure.direct {
            if came_from.insert(m.usergroup_id, None).is_none() {
                queue.push_back(m.usergroup_id);
            }
        }

        while let Some(group) = queue.pop_front() {
            if group == target {
                let mut path = vec![group];
                let mut cursor = group;
                while let Some(Some(prev)) = came_from.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for child in children.get(&group).into_iter().flatten() {
                if !came_from.contains_key(child) {
                    came_from.insert(*child, Some(group));
                    queue.push_back(*child);
                }
            }
        }
        None
    }
}

/// Run the fixed-point expansion for `user`.
///
/// `children_of` returns the nesting edges whose parent is in the given
/// frontier. Seed rows for other users are ignored.
pub fn expand<F>(
    user: UserId,
    direct: impl IntoIterator<Item = UsergroupMembership>,
    mut children_of: F,
) -> AuthzResult<GroupClosure>
where
    F: FnMut(&BTreeSet<UsergroupId>) -> AuthzResult<Vec<UsergroupNesting>>,
{
    let mut closure = GroupClosure::empty(user);
    let mut visited: BTreeSet<UsergroupId> = BTreeSet::new();
    let mut frontier: BTreeSet<UsergroupId> = BTreeSet::new();

    for membership in direct {
        if membership.user_id != user {
            continue;
        }
        closure.direct.insert(membership);
        if visited.insert(membership.usergroup_id) {
            frontier.insert(membership.usergroup_id);
        }
    }

    let mut round = 0usize;
    while !frontier.is_empty() {
        round += 1;
        let edges = children_of(&frontier)?;
        let mut next = BTreeSet::new();

        for edge in edges {
            // Only edges leaving the current frontier extend the closure.
            if !frontier.contains(&edge.parent) {
                continue;
            }
            closure.nesting.insert(edge);
            if visited.insert(edge.child) {
                next.insert(edge.child);
            }
        }

        debug!(
            user_id = user.0,
            round,
            frontier = frontier.len(),
            discovered = next.len(),
            "closure expansion round"
        );
        frontier = next;
    }

    Ok(closure)
}

/// Groups that sit on a nesting cycle, or below one, within `edges`.
///
/// Repeatedly strips groups with no incoming edge; whatever survives is
/// part of, or fed by, a cycle. Empty for an acyclic edge set.
pub fn cycle_members(edges: &BTreeSet<UsergroupNesting>) -> BTreeSet<UsergroupId> {
    let mut indegree: BTreeMap<UsergroupId, usize> = BTreeMap::new();
    let mut children: BTreeMap<UsergroupId, Vec<UsergroupId>> = BTreeMap::new();
    for edge in edges {
        indegree.entry(edge.parent).or_insert(0);
        *indegree.entry(edge.child).or_insert(0) += 1;
        children.entry(edge.parent).or_default().push(edge.child);
    }

    let mut ready: Vec<UsergroupId> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(g, _)| *g)
        .collect();

    while let Some(group) = ready.pop() {
        indegree.remove(&group);
        for child in children.get(&group).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(child) {
                *d -= 1;
                if *d == 0 {
                    ready.push(*child);
                }
            }
        }
    }

    indegree.into_keys().collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
