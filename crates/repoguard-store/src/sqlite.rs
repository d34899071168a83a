//! SQLite implementation of `RelationshipStore`.
//!
//! One connection behind a `Mutex`. A snapshot holds the connection for its
//! lifetime and runs every lookup inside one deferred read transaction, so
//! writes committed by other connections mid-request are not observed. File
//! databases are switched to WAL so such writers are not blocked by readers.
//!
//! Role id lists are bound as `IN (?, ?, ...)` parameters; ids never reach
//! the SQL text.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use repoguard_contracts::{
    entity::{Repo, RepoId, RepogroupId, User, UserId, UsergroupId},
    error::{AuthzError, AuthzResult},
    relation::{RepogroupMembership, UsergroupMembership, UsergroupNesting},
    role::{AssignmentScope, RoleRow},
};
use repoguard_core::traits::{RelationshipStore, StoreSnapshot};

use crate::graph::RelationshipGraph;

/// The relationship schema, applied by `create_schema`.
pub const SCHEMA: &str = include_str!("schema.sql");

/// Default wait for a locked database before a lookup fails.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// A relationship store over a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// The schema is not created; call `create_schema` for a new file.
    pub fn open(path: &Path, busy_timeout: Duration) -> AuthzResult<Self> {
        Self::open_with_flags(path, busy_timeout, OpenFlags::default())
    }

    /// Open the database at `path`, which must already exist.
    ///
    /// A missing file is `NotFound` and is not created.
    pub fn open_existing(path: &Path, busy_timeout: Duration) -> AuthzResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::open_with_flags(path, busy_timeout, flags)
    }

    fn open_with_flags(path: &Path, busy_timeout: Duration, flags: OpenFlags) -> AuthzResult<Self> {
        let conn = Connection::open_with_flags(path, flags).map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == ErrorCode::CannotOpen && !flags.contains(OpenFlags::SQLITE_OPEN_CREATE) =>
            {
                AuthzError::not_found("database", path.display())
            }
            e => AuthzError::store(format!("failed to open '{}': {}", path.display(), e)),
        })?;
        conn.busy_timeout(busy_timeout).map_err(store_err)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(store_err)?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(path = %path.display(), journal_mode = %mode, "database is not in WAL mode");
        }
        conn.pragma_update(None, "foreign_keys", true).map_err(store_err)?;

        info!(path = %path.display(), busy_timeout_ms = busy_timeout.as_millis() as u64, "sqlite store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// A private in-memory database with the schema applied.
    pub fn open_in_memory() -> AuthzResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.pragma_update(None, "foreign_keys", true).map_err(store_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.create_schema()?;
        Ok(store)
    }

    /// Create any missing tables.
    pub fn create_schema(&self) -> AuthzResult<()> {
        self.with_connection(|conn| conn.execute_batch(SCHEMA))
    }

    /// Write every entity, membership, and grant of `graph` in one transaction.
    ///
    /// Rows already present are left as they are.
    pub fn load_graph(&self, graph: &RelationshipGraph) -> AuthzResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;

        for u in graph.users.values() {
            tx.execute("INSERT OR IGNORE INTO users (id, name) VALUES (?1, ?2)", params![u.id.0, u.name])
                .map_err(store_err)?;
        }
        for g in graph.usergroups.values() {
            tx.execute("INSERT OR IGNORE INTO usergroups (id, name) VALUES (?1, ?2)", params![g.id.0, g.name])
                .map_err(store_err)?;
        }
        for r in graph.repos.values() {
            tx.execute("INSERT OR IGNORE INTO repos (id, name) VALUES (?1, ?2)", params![r.id.0, r.name])
                .map_err(store_err)?;
        }
        for g in graph.repogroups.values() {
            tx.execute("INSERT OR IGNORE INTO repogroups (id, name) VALUES (?1, ?2)", params![g.id.0, g.name])
                .map_err(store_err)?;
        }
        for m in &graph.memberships {
            tx.execute(
                "INSERT OR IGNORE INTO usergroup_users (usergroup_id, user_id) VALUES (?1, ?2)",
                params![m.usergroup_id.0, m.user_id.0],
            )
            .map_err(store_err)?;
        }
        for n in &graph.nesting {
            tx.execute(
                "INSERT OR IGNORE INTO usergroup_nesting (parent_id, child_id) VALUES (?1, ?2)",
                params![n.parent.0, n.child.0],
            )
            .map_err(store_err)?;
        }
        for m in &graph.repogroup_members {
            tx.execute(
                "INSERT OR IGNORE INTO repogroup_repos (repogroup_id, repo_id) VALUES (?1, ?2)",
                params![m.repogroup_id.0, m.repo_id.0],
            )
            .map_err(store_err)?;
        }
        for (scope, row) in &graph.grants {
            let t = RoleTable::of(*scope);
            let sql = format!(
                "INSERT OR IGNORE INTO {} ({}, {}, role) VALUES (?1, ?2, ?3)",
                t.table, t.principal, t.resource
            );
            tx.execute(&sql, params![row.principal_id, row.resource_id, row.label])
                .map_err(store_err)?;
        }

        tx.commit().map_err(store_err)?;
        debug!(
            users = graph.users.len(),
            repos = graph.repos.len(),
            grants = graph.grants.len(),
            "relationship graph loaded"
        );
        Ok(())
    }

    /// Run `f` against the underlying connection, outside any snapshot.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> AuthzResult<T> {
        let conn = self.lock()?;
        f(&conn).map_err(store_err)
    }

    fn lock(&self) -> AuthzResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuthzError::store("sqlite connection lock poisoned"))
    }
}

impl RelationshipStore for SqliteStore {
    fn snapshot(&self) -> AuthzResult<Box<dyn StoreSnapshot + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN DEFERRED TRANSACTION").map_err(store_err)?;
        Ok(Box::new(SqliteSnapshot { conn, finished: false }))
    }
}

/// One read transaction. Rolled back on drop unless finished.
struct SqliteSnapshot<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl StoreSnapshot for SqliteSnapshot<'_> {
    fn find_user(&self, id: UserId) -> AuthzResult<User> {
        let name: Option<String> = self
            .conn
            .query_row("SELECT name FROM users WHERE id = ?1", params![id.0], |row| row.get(0))
            .optional()
            .map_err(store_err)?;
        name.map(|name| User { id, name })
            .ok_or_else(|| AuthzError::not_found("user", id))
    }

    fn find_repo(&self, name: &str) -> AuthzResult<Repo> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT id FROM repos WHERE name = ?1", params![name], |row| row.get(0))
            .optional()
            .map_err(store_err)?;
        id.map(|id| Repo { id: RepoId(id), name: name.to_string() })
            .ok_or_else(|| AuthzError::not_found("repo", name))
    }

    fn direct_usergroups(&self, user: UserId) -> AuthzResult<Vec<UsergroupMembership>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT usergroup_id FROM usergroup_users WHERE user_id = ?1 ORDER BY usergroup_id")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![user.0], |row| {
                Ok(UsergroupMembership {
                    user_id: user,
                    usergroup_id: UsergroupId(row.get(0)?),
                })
            })
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn nested_usergroups(&self, parents: &BTreeSet<UsergroupId>) -> AuthzResult<Vec<UsergroupNesting>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT parent_id, child_id FROM usergroup_nesting WHERE parent_id IN ({}) ORDER BY parent_id, child_id",
            placeholders(parents.len())
        );
        let mut stmt = self.conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params_from_iter(parents.iter().map(|g| g.0)), |row| {
                Ok(UsergroupNesting {
                    parent: UsergroupId(row.get(0)?),
                    child: UsergroupId(row.get(1)?),
                })
            })
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn repogroups_containing(&self, repo: RepoId) -> AuthzResult<Vec<RepogroupMembership>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT repogroup_id FROM repogroup_repos WHERE repo_id = ?1 ORDER BY repogroup_id")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![repo.0], |row| {
                Ok(RepogroupMembership {
                    repogroup_id: RepogroupId(row.get(0)?),
                    repo_id: repo,
                })
            })
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn role_rows(
        &self,
        scope: AssignmentScope,
        principal_ids: &BTreeSet<i64>,
        resource_ids: &BTreeSet<i64>,
    ) -> AuthzResult<Vec<RoleRow>> {
        if principal_ids.is_empty() || resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let t = RoleTable::of(scope);
        let sql = format!(
            "SELECT {p}, {r}, role FROM {table} WHERE {p} IN ({pp}) AND {r} IN ({rp}) ORDER BY {p}, {r}, role",
            p = t.principal,
            r = t.resource,
            table = t.table,
            pp = placeholders(principal_ids.len()),
            rp = placeholders(resource_ids.len()),
        );
        let mut stmt = self.conn.prepare(&sql).map_err(store_err)?;
        let ids = principal_ids.iter().chain(resource_ids.iter());
        let rows = stmt
            .query_map(params_from_iter(ids), |row| {
                Ok(RoleRow {
                    principal_id: row.get(0)?,
                    resource_id: row.get(1)?,
                    label: row.get(2)?,
                })
            })
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn finish(mut self: Box<Self>) -> AuthzResult<()> {
        self.conn.execute_batch("COMMIT").map_err(store_err)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteSnapshot<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "failed to roll back abandoned snapshot");
        } else {
            debug!("abandoned snapshot rolled back");
        }
    }
}

/// Table and column names of one assignment relation.
struct RoleTable {
    table: &'static str,
    principal: &'static str,
    resource: &'static str,
}

impl RoleTable {
    fn of(scope: AssignmentScope) -> Self {
        let (table, principal, resource) = match scope {
            AssignmentScope::UserRepo => ("user_repo_roles", "user_id", "repo_id"),
            AssignmentScope::UsergroupRepo => ("usergroup_repo_roles", "usergroup_id", "repo_id"),
            AssignmentScope::UserRepogroup => ("user_repogroup_roles", "user_id", "repogroup_id"),
            AssignmentScope::UsergroupRepogroup => {
                ("usergroup_repogroup_roles", "usergroup_id", "repogroup_id")
            }
        };
        Self { table, principal, resource }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn store_err(e: rusqlite::Error) -> AuthzError {
    AuthzError::store(e)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use repoguard_contracts::{
        entity::{PrincipalRef, RepoId, RepogroupId, ResourceRef, UserId, UsergroupId},
        error::AuthzError,
        role::{AssignmentScope, Role},
    };
    use repoguard_core::traits::RelationshipStore;

    use super::{placeholders, SqliteStore};
    use crate::graph::RelationshipGraph;

    fn small_graph() -> RelationshipGraph {
        let mut g = RelationshipGraph::new();
        g.add_user(1, "Liam")
            .add_user(2, "Noah")
            .add_usergroup(1, "FooOps")
            .add_usergroup(2, "BarOps")
            .add_repo(2, "Bravo")
            .add_repo(3, "Charlie")
            .add_repogroup(1, "Foo")
            .add_member(UsergroupId(1), UserId(1))
            .nest(UsergroupId(1), UsergroupId(2))
            .add_repo_to_group(RepogroupId(1), RepoId(2))
            .grant(
                PrincipalRef::Usergroup(UsergroupId(2)),
                ResourceRef::Repogroup(RepogroupId(1)),
                Role::Writer,
            )
            .grant(PrincipalRef::User(UserId(2)), ResourceRef::Repo(RepoId(3)), Role::Owner);
        g
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.load_graph(&small_graph()).unwrap();
        store
    }

    #[test]
    fn test_placeholder_list_matches_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_lookups_read_seeded_rows() {
        let store = seeded();
        let snap = store.snapshot().unwrap();

        assert_eq!(snap.find_user(UserId(2)).unwrap().name, "Noah");
        assert_eq!(snap.find_repo("Charlie").unwrap().id, RepoId(3));
        assert_eq!(snap.direct_usergroups(UserId(1)).unwrap()[0].usergroup_id, UsergroupId(1));

        let nested = snap.nested_usergroups(&BTreeSet::from([UsergroupId(1), UsergroupId(7)])).unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].child, UsergroupId(2));

        assert_eq!(snap.repogroups_containing(RepoId(2)).unwrap()[0].repogroup_id, RepogroupId(1));

        let rows = snap
            .role_rows(AssignmentScope::UserRepo, &BTreeSet::from([2]), &BTreeSet::from([3]))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "owner");

        snap.finish().unwrap();
    }

    #[test]
    fn test_absent_rows_are_not_found() {
        let store = seeded();
        let snap = store.snapshot().unwrap();
        assert!(matches!(snap.find_user(UserId(99)), Err(AuthzError::NotFound { .. })));
        assert!(matches!(snap.find_repo("Zulu"), Err(AuthzError::NotFound { .. })));
    }

    #[test]
    fn test_empty_id_sets_short_circuit() {
        let store = seeded();
        let snap = store.snapshot().unwrap();
        assert!(snap.nested_usergroups(&BTreeSet::new()).unwrap().is_empty());
        assert!(snap
            .role_rows(AssignmentScope::UserRepo, &BTreeSet::new(), &BTreeSet::from([3]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_abandoned_snapshot_releases_the_connection() {
        let store = seeded();
        {
            let snap = store.snapshot().unwrap();
            snap.find_user(UserId(1)).unwrap();
        }
        // A second snapshot can open its own transaction.
        let snap = store.snapshot().unwrap();
        snap.find_user(UserId(1)).unwrap();
        snap.finish().unwrap();
    }

    #[test]
    fn test_snapshot_does_not_see_concurrent_revocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.db");

        let reader = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        reader.create_schema().unwrap();
        reader.load_graph(&small_graph()).unwrap();
        let writer = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();

        let snap = reader.snapshot().unwrap();
        // The first read pins the snapshot.
        snap.find_user(UserId(2)).unwrap();

        writer
            .with_connection(|conn| conn.execute("DELETE FROM user_repo_roles WHERE user_id = 2", []))
            .unwrap();

        let rows = snap
            .role_rows(AssignmentScope::UserRepo, &BTreeSet::from([2]), &BTreeSet::from([3]))
            .unwrap();
        assert_eq!(rows.len(), 1, "revocation leaked into an open snapshot");
        snap.finish().unwrap();

        let fresh = reader.snapshot().unwrap();
        let rows = fresh
            .role_rows(AssignmentScope::UserRepo, &BTreeSet::from([2]), &BTreeSet::from([3]))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_corrupt_labels_are_returned_raw() {
        let store = seeded();
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO usergroup_repogroup_roles (usergroup_id, repogroup_id, role) VALUES (1, 1, 'owner')",
                    [],
                )
            })
            .unwrap();

        let snap = store.snapshot().unwrap();
        let rows = snap
            .role_rows(AssignmentScope::UsergroupRepogroup, &BTreeSet::from([1, 2]), &BTreeSet::from([1]))
            .unwrap();
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["owner", "writer"]);
    }

    #[test]
    fn test_open_existing_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.db");

        let err = SqliteStore::open_existing(&path, Duration::from_millis(10));
        assert!(matches!(err, Err(AuthzError::NotFound { ref entity, .. }) if entity == "database"));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_existing_reads_seeded_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.db");
        let seeded = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        seeded.create_schema().unwrap();
        seeded.load_graph(&small_graph()).unwrap();
        drop(seeded);

        let store = SqliteStore::open_existing(&path, Duration::from_millis(500)).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.find_user(UserId(1)).unwrap().name, "Liam");
        snap.finish().unwrap();
    }

    #[test]
    fn test_unopenable_path_is_store_unavailable() {
        let err = SqliteStore::open(std::path::Path::new("/nonexistent/dir/forge.db"), Duration::from_millis(10));
        assert!(matches!(err, Err(AuthzError::StoreUnavailable { .. })));
    }
}
