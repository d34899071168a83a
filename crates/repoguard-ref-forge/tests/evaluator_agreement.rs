//! The biscuit evaluator reaches the same verdict as the in-process rule
//! whenever the credential carries no attenuation.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use repoguard_biscuit::{BiscuitEvaluator, TokenIssuer};
use repoguard_contracts::{
    entity::{PrincipalRef, RepoId, RepogroupId, ResourceRef, UserId, UsergroupId},
    role::{Action, Role},
};
use repoguard_core::traits::PolicyEvaluator;
use repoguard_ref_forge::{authorizer, mock_data::Backend};
use repoguard_store::RelationshipGraph;

const USERS: i64 = 3;
const GROUPS: i64 = 6;
const REPOS: i64 = 4;
const REPOGROUPS: i64 = 3;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 30, 19, 0, 10).unwrap()
}

fn repo_name(id: i64) -> String {
    format!("repo-{id}")
}

/// Every user, group, repo, and repogroup, with no edges.
fn entities(users: i64, groups: i64) -> RelationshipGraph {
    let mut g = RelationshipGraph::new();
    for id in 1..=users {
        g.add_user(id, &format!("user-{id}"));
    }
    for id in 1..=groups {
        g.add_usergroup(id, &format!("group-{id}"));
    }
    for id in 1..=REPOS {
        g.add_repo(id, &repo_name(id));
    }
    for id in 1..=REPOGROUPS {
        g.add_repogroup(id, &format!("repogroup-{id}"));
    }
    g
}

/// Both verdicts for one request, in-process first.
fn verdicts(graph: &RelationshipGraph, user: i64, repo: i64, action: Action, time_limit: Duration) -> (bool, bool) {
    let issuer = TokenIssuer::new();
    let evaluator = BiscuitEvaluator::new(issuer.public_key()).with_time_limit(time_limit);
    let authz = authorizer(Backend::Memory, graph).unwrap();

    let ctx = authz.context(UserId(user), &repo_name(repo), action).unwrap();
    let local = authz.policy().decide(&ctx.assignments, action).unwrap().is_allowed();

    let token = issuer.issue(UserId(user)).unwrap();
    let outcome = evaluator.evaluate(&token, &authz.facts(&ctx, now())).unwrap();
    (local, outcome.allowed)
}

#[derive(Debug, Clone)]
struct Grant {
    principal: PrincipalRef,
    resource: ResourceRef,
    role: Role,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

fn arb_grant() -> impl Strategy<Value = Grant> {
    let principal = prop_oneof![
        (1..=USERS).prop_map(|id| PrincipalRef::User(UserId(id))),
        (1..=GROUPS).prop_map(|id| PrincipalRef::Usergroup(UsergroupId(id))),
    ];
    let resource = prop_oneof![
        (1..=REPOS).prop_map(|id| ResourceRef::Repo(RepoId(id))),
        (1..=REPOGROUPS).prop_map(|id| ResourceRef::Repogroup(RepogroupId(id))),
    ];
    (principal, resource, prop::sample::select(Role::ALL.to_vec())).prop_map(|(principal, resource, role)| {
        // Owner rows on repogroups are rejected as corrupt before any verdict.
        let role = match (resource, role) {
            (ResourceRef::Repogroup(_), Role::Owner) => Role::Writer,
            (_, role) => role,
        };
        Grant { principal, resource, role }
    })
}

#[derive(Debug, Clone)]
struct Forge {
    members: Vec<(i64, i64)>,
    nesting: Vec<(i64, i64)>,
    repo_groups: Vec<(i64, i64)>,
    grants: Vec<Grant>,
}

impl Forge {
    fn graph(&self) -> RelationshipGraph {
        let mut g = entities(USERS, GROUPS);
        for (group, user) in &self.members {
            g.add_member(UsergroupId(*group), UserId(*user));
        }
        for (parent, child) in &self.nesting {
            g.nest(UsergroupId(*parent), UsergroupId(*child));
        }
        for (repogroup, repo) in &self.repo_groups {
            g.add_repo_to_group(RepogroupId(*repogroup), RepoId(*repo));
        }
        for grant in &self.grants {
            g.grant(grant.principal, grant.resource, grant.role);
        }
        g
    }
}

fn arb_forge() -> impl Strategy<Value = Forge> {
    (
        prop::collection::vec((1..=GROUPS, 1..=USERS), 0..8),
        // Self edges and back edges included, so cycles are common.
        prop::collection::vec((1..=GROUPS, 1..=GROUPS), 0..10),
        prop::collection::vec((1..=REPOGROUPS, 1..=REPOS), 0..6),
        prop::collection::vec(arb_grant(), 0..8),
    )
        .prop_map(|(members, nesting, repo_groups, grants)| Forge {
            members,
            nesting,
            repo_groups,
            grants,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_evaluator_agrees_with_local_rule(
        forge in arb_forge(),
        user in 1..=USERS,
        repo in 1..=REPOS,
        action in arb_action(),
    ) {
        let (local, evaluated) = verdicts(&forge.graph(), user, repo, action, Duration::from_secs(5));
        prop_assert_eq!(local, evaluated, "{:?}", forge);
    }
}

// ── Large closures ───────────────────────────────────────────────────────────

/// User 1 in group 1, each group nesting the next down to `depth`, and only
/// the deepest group writer on repogroup 1, which holds repo 1.
fn chain(depth: i64) -> RelationshipGraph {
    let mut g = entities(1, depth);
    g.add_member(UsergroupId(1), UserId(1))
        .add_repo_to_group(RepogroupId(1), RepoId(1))
        .grant(
            PrincipalRef::Usergroup(UsergroupId(depth)),
            ResourceRef::Repogroup(RepogroupId(1)),
            Role::Writer,
        );
    for parent in 1..depth {
        g.nest(UsergroupId(parent), UsergroupId(parent + 1));
    }
    g
}

#[test]
fn test_forty_deep_chain_agrees_under_default_limits() {
    let (local, evaluated) = verdicts(&chain(40), 1, 1, Action::Write, repoguard_biscuit::DEFAULT_TIME_LIMIT);
    assert!(local);
    assert!(evaluated);
}

#[test]
fn test_long_chain_agrees() {
    let (local, evaluated) = verdicts(&chain(150), 1, 1, Action::Read, Duration::from_secs(120));
    assert!(local);
    assert!(evaluated);

    let (local, evaluated) = verdicts(&chain(150), 1, 1, Action::Membership, Duration::from_secs(120));
    assert!(!local);
    assert!(!evaluated);
}

#[test]
fn test_many_direct_groups_agree() {
    let width = 400;
    let mut g = entities(1, width);
    for group in 1..=width {
        g.add_member(UsergroupId(group), UserId(1));
    }
    g.grant(
        PrincipalRef::Usergroup(UsergroupId(width)),
        ResourceRef::Repo(RepoId(2)),
        Role::Reader,
    );

    let (local, evaluated) = verdicts(&g, 1, 2, Action::Read, Duration::from_secs(120));
    assert!(local);
    assert!(evaluated);
}
