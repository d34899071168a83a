//! In-memory doubles for the store traits, shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use repoguard_contracts::{
    entity::{Repo, RepoId, RepogroupId, User, UserId, UsergroupId},
    error::{AuthzError, AuthzResult},
    relation::{RepogroupMembership, UsergroupMembership, UsergroupNesting},
    role::{AssignmentScope, RoleRow},
};

use crate::traits::{RelationshipStore, StoreSnapshot};

/// A snapshot over fixed rows that records every lookup made through it.
///
/// `role_rows` answers with every row of the requested scope without
/// applying the id filters, so callers must filter themselves.
#[derive(Debug, Clone, Default)]
pub struct MockSnapshot {
    users: BTreeMap<i64, String>,
    repos: BTreeMap<String, i64>,
    memberships: Vec<UsergroupMembership>,
    nesting: Vec<UsergroupNesting>,
    repogroups: Vec<RepogroupMembership>,
    rows: Vec<(AssignmentScope, RoleRow)>,
    fail_on: Option<&'static str>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub finished: Arc<Mutex<usize>>,
}

impl MockSnapshot {
    pub fn with_user(mut self, id: i64, name: &str) -> Self {
        self.users.insert(id, name.to_string());
        self
    }

    pub fn with_repo(mut self, id: i64, name: &str) -> Self {
        self.repos.insert(name.to_string(), id);
        self
    }

    pub fn with_membership(mut self, user: i64, group: i64) -> Self {
        self.memberships.push(UsergroupMembership {
            user_id: UserId(user),
            usergroup_id: UsergroupId(group),
        });
        self
    }

    pub fn with_nesting(mut self, parent: i64, child: i64) -> Self {
        self.nesting.push(UsergroupNesting {
            parent: UsergroupId(parent),
            child: UsergroupId(child),
        });
        self
    }

    pub fn with_repogroup(mut self, group: i64, repo: i64) -> Self {
        self.repogroups.push(RepogroupMembership {
            repogroup_id: RepogroupId(group),
            repo_id: RepoId(repo),
        });
        self
    }

    pub fn with_row(mut self, scope: AssignmentScope, principal: i64, resource: i64, label: &str) -> Self {
        self.rows.push((
            scope,
            RoleRow {
                principal_id: principal,
                resource_id: resource,
                label: label.to_string(),
            },
        ));
        self
    }

    /// Make the named lookup fail with `StoreUnavailable`.
    pub fn failing_on(mut self, lookup: &'static str) -> Self {
        self.fail_on = Some(lookup);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) -> AuthzResult<()> {
        let call = call.into();
        self.calls.lock().unwrap().push(call.clone());
        match self.fail_on {
            Some(name) if call.starts_with(name) => Err(AuthzError::store(format!("{name} timed out"))),
            _ => Ok(()),
        }
    }
}

impl StoreSnapshot for MockSnapshot {
    fn find_user(&self, id: UserId) -> AuthzResult<User> {
        self.record("find_user")?;
        self.users
            .get(&id.0)
            .map(|name| User { id, name: name.clone() })
            .ok_or_else(|| AuthzError::not_found("user", id))
    }

    fn find_repo(&self, name: &str) -> AuthzResult<Repo> {
        self.record("find_repo")?;
        self.repos
            .get(name)
            .map(|id| Repo { id: RepoId(*id), name: name.to_string() })
            .ok_or_else(|| AuthzError::not_found("repo", name))
    }

    fn direct_usergroups(&self, user: UserId) -> AuthzResult<Vec<UsergroupMembership>> {
        self.record("direct_usergroups")?;
        Ok(self.memberships.iter().filter(|m| m.user_id == user).copied().collect())
    }

    fn nested_usergroups(&self, parents: &BTreeSet<UsergroupId>) -> AuthzResult<Vec<UsergroupNesting>> {
        self.record("nested_usergroups")?;
        Ok(self.nesting.iter().filter(|n| parents.contains(&n.parent)).copied().collect())
    }

    fn repogroups_containing(&self, repo: RepoId) -> AuthzResult<Vec<RepogroupMembership>> {
        self.record("repogroups_containing")?;
        Ok(self.repogroups.iter().filter(|m| m.repo_id == repo).copied().collect())
    }

    fn role_rows(
        &self,
        scope: AssignmentScope,
        _principal_ids: &BTreeSet<i64>,
        _resource_ids: &BTreeSet<i64>,
    ) -> AuthzResult<Vec<RoleRow>> {
        self.record(format!("role_rows:{scope}"))?;
        Ok(self
            .rows
            .iter()
            .filter(|(s, _)| *s == scope)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn finish(self: Box<Self>) -> AuthzResult<()> {
        self.record("finish")?;
        *self.finished.lock().unwrap() += 1;
        Ok(())
    }
}

/// A store handing out clones of one template snapshot.
///
/// Clones share the call log, so the log spans every snapshot taken.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    pub template: MockSnapshot,
    pub unavailable: bool,
}

impl MockStore {
    pub fn new(template: MockSnapshot) -> Self {
        Self { template, unavailable: false }
    }
}

impl RelationshipStore for MockStore {
    fn snapshot(&self) -> AuthzResult<Box<dyn StoreSnapshot + '_>> {
        if self.unavailable {
            return Err(AuthzError::store("connection refused"));
        }
        Ok(Box::new(self.template.clone()))
    }
}
