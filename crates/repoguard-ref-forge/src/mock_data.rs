//! The reference forge: a small fictional code host.
//!
//! All data here is hardcoded. The same graph backs the in-memory store and
//! seeds SQLite databases, so every scenario can run on either backend.
//!
//! ```text
//! users       Liam(1) Noah(2) Olivia(3) Emma(4) Ava(5)
//! usergroups  FooOps(1) ⊃ BarOps(2)   BazOps(3)
//! members     Liam ∈ FooOps, Emma ∈ BazOps
//! repos       Alpha(1) Bravo(2) Charlie(3) Delta(4)
//! repogroups  Foo(1) = {Bravo, Delta}   Bar(2) = {Charlie}
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use repoguard_contracts::{
    entity::{PrincipalRef, RepoId, RepogroupId, ResourceRef, UserId, UsergroupId},
    error::AuthzResult,
    role::Role,
};
use repoguard_core::traits::RelationshipStore;
use repoguard_policy::RoleActionPolicy;
use repoguard_store::{InMemoryStore, RelationshipGraph, SqliteStore};

// ── Identities ───────────────────────────────────────────────────────────────

pub const LIAM: UserId = UserId(1);
pub const NOAH: UserId = UserId(2);
pub const OLIVIA: UserId = UserId(3);
pub const EMMA: UserId = UserId(4);
pub const AVA: UserId = UserId(5);

pub const FOO_OPS: UsergroupId = UsergroupId(1);
pub const BAR_OPS: UsergroupId = UsergroupId(2);
pub const BAZ_OPS: UsergroupId = UsergroupId(3);

pub const ALPHA: RepoId = RepoId(1);
pub const BRAVO: RepoId = RepoId(2);
pub const CHARLIE: RepoId = RepoId(3);
pub const DELTA: RepoId = RepoId(4);

pub const FOO: RepogroupId = RepogroupId(1);
pub const BAR: RepogroupId = RepogroupId(2);

/// Role table used by every forge scenario.
pub const FORGE_POLICY: &str = include_str!("../policies/forge.toml");

// ── Graph ────────────────────────────────────────────────────────────────────

/// The forge's users, groups, repos, and grants.
///
/// Grants:
/// - BarOps → Foo: writer
/// - Noah → Charlie: owner
/// - Emma → Alpha: reader
/// - BazOps → Bar: reader
/// - Ava → Foo: reader
/// - FooOps → Delta: owner
pub fn forge_graph() -> RelationshipGraph {
    let mut g = RelationshipGraph::new();
    g.add_user(LIAM.0, "Liam")
        .add_user(NOAH.0, "Noah")
        .add_user(OLIVIA.0, "Olivia")
        .add_user(EMMA.0, "Emma")
        .add_user(AVA.0, "Ava");

    g.add_usergroup(FOO_OPS.0, "FooOps")
        .add_usergroup(BAR_OPS.0, "BarOps")
        .add_usergroup(BAZ_OPS.0, "BazOps")
        .nest(FOO_OPS, BAR_OPS)
        .add_member(FOO_OPS, LIAM)
        .add_member(BAZ_OPS, EMMA);

    g.add_repo(ALPHA.0, "Alpha")
        .add_repo(BRAVO.0, "Bravo")
        .add_repo(CHARLIE.0, "Charlie")
        .add_repo(DELTA.0, "Delta")
        .add_repogroup(FOO.0, "Foo")
        .add_repogroup(BAR.0, "Bar")
        .add_repo_to_group(FOO, BRAVO)
        .add_repo_to_group(FOO, DELTA)
        .add_repo_to_group(BAR, CHARLIE);

    g.grant(PrincipalRef::Usergroup(BAR_OPS), ResourceRef::Repogroup(FOO), Role::Writer)
        .grant(PrincipalRef::User(NOAH), ResourceRef::Repo(CHARLIE), Role::Owner)
        .grant(PrincipalRef::User(EMMA), ResourceRef::Repo(ALPHA), Role::Reader)
        .grant(PrincipalRef::Usergroup(BAZ_OPS), ResourceRef::Repogroup(BAR), Role::Reader)
        .grant(PrincipalRef::User(AVA), ResourceRef::Repogroup(FOO), Role::Reader)
        .grant(PrincipalRef::Usergroup(FOO_OPS), ResourceRef::Repo(DELTA), Role::Owner);
    g
}

pub fn forge_policy() -> AuthzResult<RoleActionPolicy> {
    RoleActionPolicy::from_toml_str(FORGE_POLICY)
}

// ── Backends ─────────────────────────────────────────────────────────────────

/// Which store implementation a scenario runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    /// A private in-memory SQLite database.
    Sqlite,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

    /// A store serving `graph`.
    pub fn open(self, graph: &RelationshipGraph) -> AuthzResult<Box<dyn RelationshipStore>> {
        debug!(backend = %self, grants = graph.grants().len(), "opening forge store");
        match self {
            Backend::Memory => Ok(Box::new(InMemoryStore::new(graph.clone()))),
            Backend::Sqlite => {
                let store = SqliteStore::open_in_memory()?;
                store.load_graph(graph)?;
                Ok(Box::new(store))
            }
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Create (or top up) a SQLite database at `path` holding the forge.
pub fn seed_sqlite(path: &Path, busy_timeout: Duration) -> AuthzResult<SqliteStore> {
    let store = SqliteStore::open(path, busy_timeout)?;
    store.create_schema()?;
    store.load_graph(&forge_graph())?;
    Ok(store)
}
