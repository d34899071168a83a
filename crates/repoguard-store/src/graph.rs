//! An owned copy of the relationship graph.
//!
//! `RelationshipGraph` is what `InMemoryStore` serves snapshots of, and what
//! `SqliteStore::load_graph` writes out. Role grants are kept as raw labels
//! so a graph can carry the same corrupt rows a database could.

use std::collections::{BTreeMap, BTreeSet};

use repoguard_contracts::{
    entity::{
        PrincipalRef, Repo, RepoId, Repogroup, RepogroupId, ResourceRef, User, UserId, Usergroup,
        UsergroupId,
    },
    relation::{RepogroupMembership, UsergroupMembership, UsergroupNesting},
    role::{AssignmentScope, Role, RoleRow},
};

/// Entities, memberships, and role grants.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) usergroups: BTreeMap<UsergroupId, Usergroup>,
    pub(crate) repos: BTreeMap<RepoId, Repo>,
    pub(crate) repogroups: BTreeMap<RepogroupId, Repogroup>,
    pub(crate) memberships: BTreeSet<UsergroupMembership>,
    pub(crate) nesting: BTreeSet<UsergroupNesting>,
    pub(crate) repogroup_members: BTreeSet<RepogroupMembership>,
    pub(crate) grants: Vec<(AssignmentScope, RoleRow)>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, id: i64, name: &str) -> &mut Self {
        self.users.insert(UserId(id), User { id: UserId(id), name: name.to_string() });
        self
    }

    pub fn add_usergroup(&mut self, id: i64, name: &str) -> &mut Self {
        self.usergroups.insert(
            UsergroupId(id),
            Usergroup { id: UsergroupId(id), name: name.to_string() },
        );
        self
    }

    pub fn add_repo(&mut self, id: i64, name: &str) -> &mut Self {
        self.repos.insert(RepoId(id), Repo { id: RepoId(id), name: name.to_string() });
        self
    }

    pub fn add_repogroup(&mut self, id: i64, name: &str) -> &mut Self {
        self.repogroups.insert(
            RepogroupId(id),
            Repogroup { id: RepogroupId(id), name: name.to_string() },
        );
        self
    }

    /// Make `user` a direct member of `group`.
    pub fn add_member(&mut self, group: UsergroupId, user: UserId) -> &mut Self {
        self.memberships.insert(UsergroupMembership { user_id: user, usergroup_id: group });
        self
    }

    /// Make `child` a member of `parent`.
    pub fn nest(&mut self, parent: UsergroupId, child: UsergroupId) -> &mut Self {
        self.nesting.insert(UsergroupNesting { parent, child });
        self
    }

    pub fn add_repo_to_group(&mut self, group: RepogroupId, repo: RepoId) -> &mut Self {
        self.repogroup_members.insert(RepogroupMembership { repogroup_id: group, repo_id: repo });
        self
    }

    /// Grant `role` to `principal` over `resource`.
    ///
    /// No kind check is made here; an `owner` grant over a repogroup is
    /// stored and rejected when read back.
    pub fn grant(&mut self, principal: PrincipalRef, resource: ResourceRef, role: Role) -> &mut Self {
        let (scope, principal_id, resource_id) = scope_of(principal, resource);
        self.grant_label(scope, principal_id, resource_id, role.label())
    }

    /// Store a raw grant row.
    pub fn grant_label(&mut self, scope: AssignmentScope, principal_id: i64, resource_id: i64, label: &str) -> &mut Self {
        let row = RoleRow {
            principal_id,
            resource_id,
            label: label.to_string(),
        };
        if !self.grants.iter().any(|(s, r)| *s == scope && *r == row) {
            self.grants.push((scope, row));
        }
        self
    }

    /// Remove every grant of `principal` over `resource`. Returns the number removed.
    pub fn revoke(&mut self, principal: PrincipalRef, resource: ResourceRef) -> usize {
        let (scope, principal_id, resource_id) = scope_of(principal, resource);
        let before = self.grants.len();
        self.grants
            .retain(|(s, r)| !(*s == scope && r.principal_id == principal_id && r.resource_id == resource_id));
        before - self.grants.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn repos(&self) -> impl Iterator<Item = &Repo> {
        self.repos.values()
    }

    pub fn grants(&self) -> &[(AssignmentScope, RoleRow)] {
        &self.grants
    }

    pub(crate) fn repo_named(&self, name: &str) -> Option<&Repo> {
        self.repos.values().find(|r| r.name == name)
    }
}

/// The relation a principal/resource pair is stored in, with raw ids.
pub fn scope_of(principal: PrincipalRef, resource: ResourceRef) -> (AssignmentScope, i64, i64) {
    match (principal, resource) {
        (PrincipalRef::User(u), ResourceRef::Repo(r)) => (AssignmentScope::UserRepo, u.0, r.0),
        (PrincipalRef::Usergroup(g), ResourceRef::Repo(r)) => (AssignmentScope::UsergroupRepo, g.0, r.0),
        (PrincipalRef::User(u), ResourceRef::Repogroup(r)) => (AssignmentScope::UserRepogroup, u.0, r.0),
        (PrincipalRef::Usergroup(g), ResourceRef::Repogroup(r)) => {
            (AssignmentScope::UsergroupRepogroup, g.0, r.0)
        }
    }
}
