//! Roles, actions, role assignments, and the role→action table.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    entity::{
        PrincipalRef, RepoId, RepogroupId, ResourceKind, ResourceRef, UserId, UsergroupId,
    },
    error::{AuthzError, AuthzResult},
};

/// A role a principal can hold over a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Writer,
    Reader,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Writer, Role::Reader];

    /// The storage label of this role.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Writer => "writer",
            Role::Reader => "reader",
        }
    }

    /// Decode a stored role label granted over a resource of kind `kind`.
    ///
    /// `owner` over a repogroup violates the storage contract and is
    /// reported as `InvalidRoleForResourceType`. Unknown labels are
    /// `UnrecognizedLabel`.
    pub fn decode(label: &str, kind: ResourceKind) -> AuthzResult<Role> {
        let role = label.parse::<Role>()?;
        if role == Role::Owner && kind == ResourceKind::Repogroup {
            return Err(AuthzError::InvalidRoleForResourceType {
                role: role.label().to_string(),
                resource: kind.to_string(),
            });
        }
        Ok(role)
    }

    pub fn namespaced(&self) -> String {
        format!("role:{}", self.label())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "writer" => Ok(Role::Writer),
            "reader" => Ok(Role::Reader),
            other => Err(AuthzError::UnrecognizedLabel {
                kind: "role".to_string(),
                label: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An operation a principal may request on a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Manage group and role assignments.
    Membership,
    Write,
    Read,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Membership, Action::Write, Action::Read];

    pub fn label(&self) -> &'static str {
        match self {
            Action::Membership => "membership",
            Action::Write => "write",
            Action::Read => "read",
        }
    }

    pub fn namespaced(&self) -> String {
        format!("action:{}", self.label())
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "membership" => Ok(Action::Membership),
            "write" => Ok(Action::Write),
            "read" => Ok(Action::Read),
            other => Err(AuthzError::UnrecognizedLabel {
                kind: "action".to_string(),
                label: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A grant of `role` to `principal` over `resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal: PrincipalRef,
    pub resource: ResourceRef,
    pub role: Role,
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} : {}", self.principal, self.resource, self.role)
    }
}

/// Which of the four assignment relations a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentScope {
    UserRepo,
    UsergroupRepo,
    UserRepogroup,
    UsergroupRepogroup,
}

impl AssignmentScope {
    pub const ALL: [AssignmentScope; 4] = [
        AssignmentScope::UserRepo,
        AssignmentScope::UsergroupRepo,
        AssignmentScope::UserRepogroup,
        AssignmentScope::UsergroupRepogroup,
    ];

    pub fn principal(&self, id: i64) -> PrincipalRef {
        match self {
            AssignmentScope::UserRepo | AssignmentScope::UserRepogroup => {
                PrincipalRef::User(UserId(id))
            }
            AssignmentScope::UsergroupRepo | AssignmentScope::UsergroupRepogroup => {
                PrincipalRef::Usergroup(UsergroupId(id))
            }
        }
    }

    pub fn resource(&self, id: i64) -> ResourceRef {
        match self.resource_kind() {
            ResourceKind::Repo => ResourceRef::Repo(RepoId(id)),
            ResourceKind::Repogroup => ResourceRef::Repogroup(RepogroupId(id)),
        }
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            AssignmentScope::UserRepo | AssignmentScope::UsergroupRepo => ResourceKind::Repo,
            AssignmentScope::UserRepogroup | AssignmentScope::UsergroupRepogroup => {
                ResourceKind::Repogroup
            }
        }
    }
}

impl fmt::Display for AssignmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentScope::UserRepo => "user-repo",
            AssignmentScope::UsergroupRepo => "group-repo",
            AssignmentScope::UserRepogroup => "user-repogroup",
            AssignmentScope::UsergroupRepogroup => "group-repogroup",
        };
        f.write_str(s)
    }
}

/// An undecoded role row as it comes back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRow {
    pub principal_id: i64,
    pub resource_id: i64,
    pub label: String,
}

/// Static policy: which actions each role permits.
///
/// Actions keep their declared order. A role missing from the map permits
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleActionMap {
    entries: BTreeMap<Role, Vec<Action>>,
}

impl RoleActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard forge table: owner ⊃ writer ⊃ reader.
    pub fn standard() -> Self {
        let mut map = Self::new();
        map.set(Role::Owner, [Action::Membership, Action::Write, Action::Read]);
        map.set(Role::Writer, [Action::Write, Action::Read]);
        map.set(Role::Reader, [Action::Read]);
        map
    }

    /// Replace the actions `role` permits. Duplicate actions are dropped.
    pub fn set(&mut self, role: Role, actions: impl IntoIterator<Item = Action>) {
        let mut ordered: Vec<Action> = Vec::new();
        for action in actions {
            if !ordered.contains(&action) {
                ordered.push(action);
            }
        }
        self.entries.insert(role, ordered);
    }

    pub fn actions(&self, role: Role) -> &[Action] {
        self.entries.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn permits(&self, role: Role, action: Action) -> bool {
        self.actions(role).contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &[Action])> {
        self.entries.iter().map(|(r, a)| (*r, a.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
