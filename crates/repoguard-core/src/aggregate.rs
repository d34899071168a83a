//! Role assignment aggregation.
//!
//! Collects every role grant that could apply to one request: the principal
//! is the user or a group in the user's closure, and the resource is the
//! target repo or a repogroup containing it. Each of the four assignment
//! relations is looked up separately, bounded by its own id sets.

use std::collections::BTreeSet;

use tracing::debug;

use repoguard_contracts::{
    entity::{PrincipalRef, RepoId, RepogroupId, ResourceKind, ResourceRef, UserId, UsergroupId},
    error::AuthzResult,
    relation::{GroupClosure, RepogroupMembership},
    role::{AssignmentScope, Role, RoleAssignment, RoleRow},
};

use crate::traits::StoreSnapshot;

/// The principals and resources a request can draw authority from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceScope {
    pub user: UserId,
    pub groups: BTreeSet<UsergroupId>,
    pub repo: RepoId,
    pub repogroups: BTreeSet<RepogroupId>,
}

impl RelevanceScope {
    /// Build the scope for a resolved closure and the target's repogroup rows.
    ///
    /// Repogroup rows that do not name `repo` are ignored.
    pub fn new(closure: &GroupClosure, repo: RepoId, repogroups: &BTreeSet<RepogroupMembership>) -> Self {
        Self {
            user: closure.user_id,
            groups: closure.groups(),
            repo,
            repogroups: repogroups
                .iter()
                .filter(|m| m.repo_id == repo)
                .map(|m| m.repogroup_id)
                .collect(),
        }
    }

    /// Deduplicated principal ids for a lookup of `scope`.
    pub fn principal_ids(&self, scope: AssignmentScope) -> BTreeSet<i64> {
        match scope {
            AssignmentScope::UserRepo | AssignmentScope::UserRepogroup => BTreeSet::from([self.user.0]),
            AssignmentScope::UsergroupRepo | AssignmentScope::UsergroupRepogroup => {
                self.groups.iter().map(|g| g.0).collect()
            }
        }
    }

    /// Deduplicated resource ids for a lookup of `scope`.
    pub fn resource_ids(&self, scope: AssignmentScope) -> BTreeSet<i64> {
        match scope.resource_kind() {
            ResourceKind::Repo => BTreeSet::from([self.repo.0]),
            ResourceKind::Repogroup => self.repogroups.iter().map(|g| g.0).collect(),
        }
    }

    /// True if `assignment` names a principal and a resource in scope.
    pub fn covers(&self, assignment: &RoleAssignment) -> bool {
        let principal = match assignment.principal {
            PrincipalRef::User(id) => id == self.user,
            PrincipalRef::Usergroup(id) => self.groups.contains(&id),
        };
        let resource = match assignment.resource {
            ResourceRef::Repo(id) => id == self.repo,
            ResourceRef::Repogroup(id) => self.repogroups.contains(&id),
        };
        principal && resource
    }
}

/// Decode one stored row of relation `scope` into a typed assignment.
///
/// # Errors
///
/// `InvalidRoleForResourceType` for an `owner` row over a repogroup and
/// `UnrecognizedLabel` for an unknown role label.
pub fn decode_row(scope: AssignmentScope, row: &RoleRow) -> AuthzResult<RoleAssignment> {
    let role = Role::decode(&row.label, scope.resource_kind())?;
    Ok(RoleAssignment {
        principal: scope.principal(row.principal_id),
        resource: scope.resource(row.resource_id),
        role,
    })
}

/// Gathers relevant role assignments through a store snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleAggregator;

impl RoleAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Every relevant assignment, deduplicated and sorted.
    ///
    /// Sorting puts user grants before group grants and repo grants before
    /// repogroup grants, so the first permitting grant is the most direct.
    ///
    /// # Errors
    ///
    /// Lookup failures propagate unchanged. A relevant row that fails to
    /// decode aborts the whole aggregation; it is never skipped.
    pub fn gather(&self, snapshot: &dyn StoreSnapshot, scope: &RelevanceScope) -> AuthzResult<Vec<RoleAssignment>> {
        let mut found: BTreeSet<RoleAssignment> = BTreeSet::new();

        for relation in AssignmentScope::ALL {
            let principal_ids = scope.principal_ids(relation);
            let resource_ids = scope.resource_ids(relation);
            if principal_ids.is_empty() || resource_ids.is_empty() {
                debug!(scope = %relation, "no candidate ids, lookup skipped");
                continue;
            }

            let rows = snapshot.role_rows(relation, &principal_ids, &resource_ids)?;
            let fetched = rows.len();
            let mut kept = 0usize;
            for row in rows {
                if !principal_ids.contains(&row.principal_id) || !resource_ids.contains(&row.resource_id) {
                    continue;
                }
                found.insert(decode_row(relation, &row)?);
                kept += 1;
            }

            debug!(
                scope = %relation,
                principals = principal_ids.len(),
                resources = resource_ids.len(),
                fetched,
                kept,
                "role rows gathered"
            );
        }

        Ok(found.into_iter().collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use repoguard_contracts::{
        entity::{PrincipalRef, RepoId, RepogroupId, ResourceRef, UserId, UsergroupId},
        error::AuthzError,
        relation::{GroupClosure, RepogroupMembership, UsergroupMembership, UsergroupNesting},
        role::{AssignmentScope, Role, RoleAssignment, RoleRow},
    };

    use super::{decode_row, RelevanceScope, RoleAggregator};
    use crate::mock::MockSnapshot;

    fn closure(user: i64, direct: &[i64], nesting: &[(i64, i64)]) -> GroupClosure {
        let mut c = GroupClosure::empty(UserId(user));
        for g in direct {
            c.direct.insert(UsergroupMembership {
                user_id: UserId(user),
                usergroup_id: UsergroupId(*g),
            });
        }
        for (p, ch) in nesting {
            c.nesting.insert(UsergroupNesting {
                parent: UsergroupId(*p),
                child: UsergroupId(*ch),
            });
        }
        c
    }

    fn repogroups(repo: i64, groups: &[i64]) -> BTreeSet<RepogroupMembership> {
        groups
            .iter()
            .map(|g| RepogroupMembership {
                repogroup_id: RepogroupId(*g),
                repo_id: RepoId(repo),
            })
            .collect()
    }

    fn row(principal: i64, resource: i64, label: &str) -> RoleRow {
        RoleRow {
            principal_id: principal,
            resource_id: resource,
            label: label.to_string(),
        }
    }

    // ── Decoding ─────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_tags_ids_by_scope() {
        let a = decode_row(AssignmentScope::UsergroupRepogroup, &row(2, 1, "writer")).unwrap();
        assert_eq!(a.principal, PrincipalRef::Usergroup(UsergroupId(2)));
        assert_eq!(a.resource, ResourceRef::Repogroup(RepogroupId(1)));
        assert_eq!(a.role, Role::Writer);
    }

    #[test]
    fn test_decode_owner_on_repogroup_is_rejected_for_both_principal_kinds() {
        for scope in [AssignmentScope::UserRepogroup, AssignmentScope::UsergroupRepogroup] {
            let err = decode_row(scope, &row(1, 1, "owner")).unwrap_err();
            assert!(matches!(err, AuthzError::InvalidRoleForResourceType { .. }));
        }
        assert!(decode_row(AssignmentScope::UserRepo, &row(1, 1, "owner")).is_ok());
    }

    // ── Relevance scope ──────────────────────────────────────────────────────

    #[test]
    fn test_scope_ids_are_deduplicated_across_paths() {
        // Group 3 is reached twice: directly and through 1 -> 3.
        let c = closure(1, &[1, 3], &[(1, 3)]);
        let scope = RelevanceScope::new(&c, RepoId(2), &repogroups(2, &[1]));

        assert_eq!(scope.principal_ids(AssignmentScope::UsergroupRepo), BTreeSet::from([1, 3]));
        assert_eq!(scope.principal_ids(AssignmentScope::UserRepo), BTreeSet::from([1]));
        assert_eq!(scope.resource_ids(AssignmentScope::UserRepogroup), BTreeSet::from([1]));
        assert_eq!(scope.resource_ids(AssignmentScope::UsergroupRepo), BTreeSet::from([2]));
    }

    #[test]
    fn test_scope_ignores_repogroup_rows_for_other_repos() {
        let mut rows = repogroups(2, &[1]);
        rows.insert(RepogroupMembership {
            repogroup_id: RepogroupId(9),
            repo_id: RepoId(7),
        });
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &rows);
        assert_eq!(scope.repogroups, BTreeSet::from([RepogroupId(1)]));
    }

    #[test]
    fn test_covers_checks_both_sides() {
        let scope = RelevanceScope::new(&closure(1, &[2], &[]), RepoId(3), &repogroups(3, &[1]));
        let inside = RoleAssignment {
            principal: PrincipalRef::Usergroup(UsergroupId(2)),
            resource: ResourceRef::Repogroup(RepogroupId(1)),
            role: Role::Reader,
        };
        let other_repo = RoleAssignment {
            resource: ResourceRef::Repo(RepoId(4)),
            ..inside
        };
        let other_user = RoleAssignment {
            principal: PrincipalRef::User(UserId(5)),
            ..inside
        };
        assert!(scope.covers(&inside));
        assert!(!scope.covers(&other_repo));
        assert!(!scope.covers(&other_user));
    }

    // ── Gathering ────────────────────────────────────────────────────────────

    #[test]
    fn test_gather_collects_all_four_shapes_in_order() {
        let snapshot = MockSnapshot::default()
            .with_row(AssignmentScope::UsergroupRepogroup, 2, 1, "writer")
            .with_row(AssignmentScope::UsergroupRepo, 1, 2, "reader")
            .with_row(AssignmentScope::UserRepogroup, 1, 1, "reader")
            .with_row(AssignmentScope::UserRepo, 1, 2, "owner");
        let scope = RelevanceScope::new(&closure(1, &[1], &[(1, 2)]), RepoId(2), &repogroups(2, &[1]));

        let found = RoleAggregator::new().gather(&snapshot, &scope).unwrap();
        let shapes: Vec<(PrincipalRef, ResourceRef)> = found.iter().map(|a| (a.principal, a.resource)).collect();
        assert_eq!(
            shapes,
            vec![
                (PrincipalRef::User(UserId(1)), ResourceRef::Repo(RepoId(2))),
                (PrincipalRef::User(UserId(1)), ResourceRef::Repogroup(RepogroupId(1))),
                (PrincipalRef::Usergroup(UsergroupId(1)), ResourceRef::Repo(RepoId(2))),
                (PrincipalRef::Usergroup(UsergroupId(2)), ResourceRef::Repogroup(RepogroupId(1))),
            ]
        );
    }

    #[test]
    fn test_gather_drops_rows_outside_the_id_sets() {
        let snapshot = MockSnapshot::default()
            .with_row(AssignmentScope::UserRepo, 9, 2, "owner")
            .with_row(AssignmentScope::UserRepo, 1, 9, "owner")
            .with_row(AssignmentScope::UserRepo, 1, 2, "reader");
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &BTreeSet::new());

        let found = RoleAggregator::new().gather(&snapshot, &scope).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Role::Reader);
    }

    #[test]
    fn test_gather_deduplicates_identical_rows() {
        let snapshot = MockSnapshot::default()
            .with_row(AssignmentScope::UserRepo, 1, 2, "reader")
            .with_row(AssignmentScope::UserRepo, 1, 2, "reader");
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &BTreeSet::new());
        assert_eq!(RoleAggregator::new().gather(&snapshot, &scope).unwrap().len(), 1);
    }

    #[test]
    fn test_gather_skips_lookups_with_empty_id_sets() {
        let snapshot = MockSnapshot::default();
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &BTreeSet::new());
        RoleAggregator::new().gather(&snapshot, &scope).unwrap();

        // No groups and no repogroups: only the user-repo lookup is issued.
        assert_eq!(snapshot.calls(), vec!["role_rows:user-repo".to_string()]);
    }

    #[test]
    fn test_gather_surfaces_owner_on_repogroup() {
        let snapshot = MockSnapshot::default()
            .with_row(AssignmentScope::UserRepo, 1, 2, "reader")
            .with_row(AssignmentScope::UsergroupRepogroup, 3, 1, "owner");
        let scope = RelevanceScope::new(&closure(1, &[3], &[]), RepoId(2), &repogroups(2, &[1]));

        let err = RoleAggregator::new().gather(&snapshot, &scope).unwrap_err();
        assert_eq!(
            err,
            AuthzError::InvalidRoleForResourceType {
                role: "owner".to_string(),
                resource: "repogroup".to_string(),
            }
        );
    }

    #[test]
    fn test_gather_surfaces_unknown_label() {
        let snapshot = MockSnapshot::default().with_row(AssignmentScope::UserRepo, 1, 2, "admin");
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &BTreeSet::new());
        let err = RoleAggregator::new().gather(&snapshot, &scope).unwrap_err();
        assert!(matches!(err, AuthzError::UnrecognizedLabel { .. }));
    }

    #[test]
    fn test_gather_propagates_lookup_failure() {
        let snapshot = MockSnapshot::default().failing_on("role_rows");
        let scope = RelevanceScope::new(&closure(1, &[], &[]), RepoId(2), &BTreeSet::new());
        let err = RoleAggregator::new().gather(&snapshot, &scope).unwrap_err();
        assert!(err.is_transient());
    }
}
