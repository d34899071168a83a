//! Core trait definitions for the repoguard decision pipeline.
//!
//! These traits define the boundaries of the pipeline:
//!
//! - `RelationshipStore` / `StoreSnapshot`: the persisted relationship graph,
//!   read under one consistent point-in-time view per request
//! - `DecisionPolicy`: the role→action table and the allow/deny rule
//! - `PolicyEvaluator`: an external evaluator that independently re-derives
//!   the verdict from a fact set and a signed credential
//!
//! The `Authorizer` wires them together in a fixed order.

use std::collections::BTreeSet;
use std::sync::Arc;

use repoguard_contracts::{
    entity::{Repo, RepoId, User, UserId, UsergroupId},
    error::AuthzResult,
    facts::FactSet,
    relation::{RepogroupMembership, UsergroupMembership, UsergroupNesting},
    request::{Credential, EvaluatorOutcome, Verdict},
    role::{Action, AssignmentScope, RoleActionMap, RoleAssignment, RoleRow},
};

/// A source of relationship snapshots.
///
/// Implementations are shared across requests and must be externally
/// synchronized. The pipeline only ever reads through them.
pub trait RelationshipStore: Send + Sync {
    /// Open a consistent read view.
    ///
    /// Every lookup made through the returned snapshot observes the same
    /// point in time; concurrent writes to the store are not visible to it.
    fn snapshot(&self) -> AuthzResult<Box<dyn StoreSnapshot + '_>>;
}

impl<T: RelationshipStore + ?Sized> RelationshipStore for Arc<T> {
    fn snapshot(&self) -> AuthzResult<Box<dyn StoreSnapshot + '_>> {
        (**self).snapshot()
    }
}

/// One point-in-time view of the relationship graph.
///
/// Dropping a snapshot without calling `finish` abandons it.
pub trait StoreSnapshot {
    /// Look up a user by id. Absent users are `NotFound`.
    fn find_user(&self, id: UserId) -> AuthzResult<User>;

    /// Look up a repo by name. Absent repos are `NotFound`.
    fn find_repo(&self, name: &str) -> AuthzResult<Repo>;

    /// The usergroups `user` is a direct member of.
    fn direct_usergroups(&self, user: UserId) -> AuthzResult<Vec<UsergroupMembership>>;

    /// Every nesting edge whose parent is in `parents`.
    fn nested_usergroups(
        &self,
        parents: &BTreeSet<UsergroupId>,
    ) -> AuthzResult<Vec<UsergroupNesting>>;

    /// The repogroups `repo` belongs to.
    fn repogroups_containing(&self, repo: RepoId) -> AuthzResult<Vec<RepogroupMembership>>;

    /// Raw role rows of relation `scope` whose principal id is in
    /// `principal_ids` and whose resource id is in `resource_ids`.
    ///
    /// Labels are returned undecoded.
    fn role_rows(
        &self,
        scope: AssignmentScope,
        principal_ids: &BTreeSet<i64>,
        resource_ids: &BTreeSet<i64>,
    ) -> AuthzResult<Vec<RoleRow>>;

    /// Close the snapshot after all lookups succeeded.
    fn finish(self: Box<Self>) -> AuthzResult<()>;
}

/// The decision rule and the role→action table it applies.
///
/// Implementations must be deterministic and must never allow without an
/// assignment that justifies it.
pub trait DecisionPolicy: Send + Sync {
    /// Decide whether any of `assignments` permits `action`.
    fn decide(&self, assignments: &[RoleAssignment], action: Action) -> AuthzResult<Verdict>;

    /// The table the decision is made against.
    fn role_actions(&self) -> &RoleActionMap;

    /// A stable identifier of the table, recorded on every decision.
    fn version(&self) -> &str;
}

/// An external evaluator that answers allow/deny for a fact set.
///
/// Its inference rules must stay equivalent to the `DecisionPolicy` rule:
/// user reaches a group transitively, repo reaches its repogroups, and a
/// role fact over a reachable pair whose role permits the action allows.
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate `facts` with the authority carried by `credential`.
    ///
    /// A deny is `Ok` with `allowed = false`. Failure to parse or run the
    /// facts is `PolicyEvaluationFailed`.
    fn evaluate(&self, credential: &Credential, facts: &FactSet) -> AuthzResult<EvaluatorOutcome>;
}
