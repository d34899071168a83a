//! In-memory implementation of `RelationshipStore`.
//!
//! `InMemoryStore` keeps the current graph behind an `Arc`. A snapshot
//! clones the `Arc`, so it keeps reading the graph as it was when taken.
//! Updates copy the graph on write if a snapshot still holds the old one.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use tracing::debug;

use repoguard_contracts::{
    entity::{Repo, RepoId, User, UserId, UsergroupId},
    error::{AuthzError, AuthzResult},
    relation::{RepogroupMembership, UsergroupMembership, UsergroupNesting},
    role::{AssignmentScope, RoleRow},
};
use repoguard_core::traits::{RelationshipStore, StoreSnapshot};

use crate::graph::RelationshipGraph;

/// A relationship store over an owned graph.
///
/// # Thread safety
///
/// `snapshot()` takes a read lock only long enough to clone the `Arc`.
/// `update()` takes the write lock for the duration of the closure.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    graph: RwLock<Arc<RelationshipGraph>>,
}

impl InMemoryStore {
    pub fn new(graph: RelationshipGraph) -> Self {
        Self {
            graph: RwLock::new(Arc::new(graph)),
        }
    }

    /// Mutate the graph. Snapshots taken earlier are unaffected.
    pub fn update<T>(&self, f: impl FnOnce(&mut RelationshipGraph) -> T) -> AuthzResult<T> {
        let mut guard = self
            .graph
            .write()
            .map_err(|_| AuthzError::store("relationship graph lock poisoned"))?;
        Ok(f(Arc::make_mut(&mut guard)))
    }

    /// A clone of the current graph.
    pub fn graph(&self) -> AuthzResult<RelationshipGraph> {
        let guard = self
            .graph
            .read()
            .map_err(|_| AuthzError::store("relationship graph lock poisoned"))?;
        Ok(RelationshipGraph::clone(&guard))
    }
}

impl RelationshipStore for InMemoryStore {
    fn snapshot(&self) -> AuthzResult<Box<dyn StoreSnapshot + '_>> {
        let guard = self
            .graph
            .read()
            .map_err(|_| AuthzError::store("relationship graph lock poisoned"))?;
        Ok(Box::new(GraphSnapshot {
            graph: Arc::clone(&guard),
        }))
    }
}

/// A point-in-time view held by one request.
struct GraphSnapshot {
    graph: Arc<RelationshipGraph>,
}

impl StoreSnapshot for GraphSnapshot {
    fn find_user(&self, id: UserId) -> AuthzResult<User> {
        self.graph
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthzError::not_found("user", id))
    }

    fn find_repo(&self, name: &str) -> AuthzResult<Repo> {
        self.graph
            .repo_named(name)
            .cloned()
            .ok_or_else(|| AuthzError::not_found("repo", name))
    }

    fn direct_usergroups(&self, user: UserId) -> AuthzResult<Vec<UsergroupMembership>> {
        Ok(self
            .graph
            .memberships
            .iter()
            .filter(|m| m.user_id == user)
            .copied()
            .collect())
    }

    fn nested_usergroups(&self, parents: &BTreeSet<UsergroupId>) -> AuthzResult<Vec<UsergroupNesting>> {
        Ok(self
            .graph
            .nesting
            .iter()
            .filter(|n| parents.contains(&n.parent))
            .copied()
            .collect())
    }

    fn repogroups_containing(&self, repo: RepoId) -> AuthzResult<Vec<RepogroupMembership>> {
        Ok(self
            .graph
            .repogroup_members
            .iter()
            .filter(|m| m.repo_id == repo)
            .copied()
            .collect())
    }

    fn role_rows(
        &self,
        scope: AssignmentScope,
        principal_ids: &BTreeSet<i64>,
        resource_ids: &BTreeSet<i64>,
    ) -> AuthzResult<Vec<RoleRow>> {
        Ok(self
            .graph
            .grants
            .iter()
            .filter(|(s, row)| {
                *s == scope
                    && principal_ids.contains(&row.principal_id)
                    && resource_ids.contains(&row.resource_id)
            })
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn finish(self: Box<Self>) -> AuthzResult<()> {
        debug!(snapshot_holders = Arc::strong_count(&self.graph), "in-memory snapshot released");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
