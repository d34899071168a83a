//! Principal and resource identities.
//!
//! Ids are plain integers in storage. Each entity kind gets its own newtype
//! so a usergroup id can never be passed where a repo id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $namespace:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            /// The fact namespace for this id kind.
            pub const NAMESPACE: &'static str = $namespace;

            /// The id qualified by its namespace, e.g. `userid:4`.
            pub fn namespaced(&self) -> String {
                format!("{}:{}", Self::NAMESPACE, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Storage id of a user.
    UserId,
    "userid"
);
entity_id!(
    /// Storage id of a usergroup.
    UsergroupId,
    "usergroupid"
);
entity_id!(
    /// Storage id of a repo.
    RepoId,
    "repo"
);
entity_id!(
    /// Storage id of a repogroup.
    RepogroupId,
    "repogroupid"
);

/// A user. Users are leaves of the principal hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// A usergroup. Usergroups may nest inside other usergroups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usergroup {
    pub id: UsergroupId,
    pub name: String,
}

/// A repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: RepoId,
    pub name: String,
}

/// A repogroup. Repogroups are a single level; they never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repogroup {
    pub id: RepogroupId,
    pub name: String,
}

/// Anything a role can be granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    User(User),
    UserGroup(Usergroup),
}

impl Principal {
    pub fn reference(&self) -> PrincipalRef {
        match self {
            Principal::User(u) => PrincipalRef::User(u.id),
            Principal::UserGroup(g) => PrincipalRef::Usergroup(g.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Principal::User(u) => &u.name,
            Principal::UserGroup(g) => &g.name,
        }
    }
}

/// Anything a role can be granted over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Repo(Repo),
    RepoGroup(Repogroup),
}

impl Resource {
    pub fn reference(&self) -> ResourceRef {
        match self {
            Resource::Repo(r) => ResourceRef::Repo(r.id),
            Resource::RepoGroup(g) => ResourceRef::Repogroup(g.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Repo(r) => &r.name,
            Resource::RepoGroup(g) => &g.name,
        }
    }
}

/// A tagged reference to a principal, as stored on a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrincipalRef {
    User(UserId),
    Usergroup(UsergroupId),
}

impl PrincipalRef {
    pub fn namespaced(&self) -> String {
        match self {
            PrincipalRef::User(id) => id.namespaced(),
            PrincipalRef::Usergroup(id) => id.namespaced(),
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespaced())
    }
}

/// The two kinds of resource a role can be granted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Repo,
    Repogroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Repo => f.write_str("repo"),
            ResourceKind::Repogroup => f.write_str("repogroup"),
        }
    }
}

/// A tagged reference to a resource, as stored on a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceRef {
    Repo(RepoId),
    Repogroup(RepogroupId),
}

impl ResourceRef {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Repo(_) => ResourceKind::Repo,
            ResourceRef::Repogroup(_) => ResourceKind::Repogroup,
        }
    }

    pub fn namespaced(&self) -> String {
        match self {
            ResourceRef::Repo(id) => id.namespaced(),
            ResourceRef::Repogroup(id) => id.namespaced(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespaced())
    }
}
