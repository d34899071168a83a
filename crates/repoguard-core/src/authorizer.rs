//! The repoguard authorizer: drives one decision request end to end.
//!
//! The pipeline order is fixed:
//!
//!   Snapshot → User → Repo → Closure → Repogroups → Assignments → Finish
//!     → Decide → [Evaluate]
//!
//! Every store lookup of a request goes through one snapshot. The repo is
//! looked up before any closure work, so an unknown repo costs no traversal.
//! No error ever turns into an allow: the evaluator can only confirm or
//! narrow the in-process verdict.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use repoguard_contracts::{
    entity::UserId,
    error::{AuthzError, AuthzResult},
    facts::FactSet,
    request::{Credential, Decision, RequestContext, RequestId, Verdict},
    role::Action,
};

use crate::{
    aggregate::{RelevanceScope, RoleAggregator},
    closure::ClosureResolver,
    traits::{DecisionPolicy, PolicyEvaluator, RelationshipStore},
};

/// Drives decision requests against one store and one policy.
///
/// Holds no per-request state; a single authorizer serves any number of
/// independent requests.
pub struct Authorizer {
    store: Box<dyn RelationshipStore>,
    policy: Box<dyn DecisionPolicy>,
    evaluator: Option<Box<dyn PolicyEvaluator>>,
    resolver: ClosureResolver,
    aggregator: RoleAggregator,
}

impl Authorizer {
    pub fn new(store: Box<dyn RelationshipStore>, policy: Box<dyn DecisionPolicy>) -> Self {
        Self {
            store,
            policy,
            evaluator: None,
            resolver: ClosureResolver::new(),
            aggregator: RoleAggregator::new(),
        }
    }

    /// Attach an external evaluator that re-derives verdicts for requests
    /// presenting a credential.
    pub fn with_evaluator(mut self, evaluator: Box<dyn PolicyEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn policy(&self) -> &dyn DecisionPolicy {
        self.policy.as_ref()
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Decide whether `user` may perform `action` on the repo named `repo`.
    ///
    /// With a credential, the configured evaluator must also allow.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if a credential is given but no evaluator is configured
    /// - `NotFound` for an unknown user or repo
    /// - `StoreUnavailable` if any lookup fails
    /// - `InvalidRoleForResourceType` / `UnrecognizedLabel` for corrupt rows
    /// - `PolicyEvaluationFailed` if the evaluator fails, or allows what the
    ///   in-process rule denies
    ///
    /// A deny is not an error.
    pub fn authorize(
        &self,
        user: UserId,
        repo: &str,
        action: Action,
        credential: Option<&Credential>,
    ) -> AuthzResult<Decision> {
        self.authorize_at(user, repo, action, credential, Utc::now())
    }

    /// `authorize` with an explicit evaluation time.
    pub fn authorize_at(
        &self,
        user: UserId,
        repo: &str,
        action: Action,
        credential: Option<&Credential>,
        now: DateTime<Utc>,
    ) -> AuthzResult<Decision> {
        if credential.is_some() && self.evaluator.is_none() {
            return Err(AuthzError::ConfigError {
                reason: "a credential was supplied but no policy evaluator is configured".to_string(),
            });
        }
        let ctx = self.context(user, repo, action)?;
        self.decide(&ctx, credential, now)
    }

    /// Resolve the full request context without deciding.
    pub fn context(&self, user: UserId, repo: &str, action: Action) -> AuthzResult<RequestContext> {
        let request_id = RequestId::new();
        debug!(
            request_id = %request_id,
            user_id = user.0,
            repo = %repo,
            action = %action,
            "decision request starting"
        );

        // ── Step 1: One snapshot for every lookup ────────────────────────────
        let snapshot = self.store.snapshot()?;

        // ── Steps 2 & 3: Identities; the repo before any closure work ────────
        let user = snapshot.find_user(user)?;
        let repo = snapshot.find_repo(repo)?;

        // ── Step 4: Group closure ────────────────────────────────────────────
        let closure = self.resolver.resolve(snapshot.as_ref(), user.id)?;

        // ── Step 5: Repogroups of the target ─────────────────────────────────
        let repogroups = snapshot.repogroups_containing(repo.id)?.into_iter().collect();

        // ── Step 6: Relevant assignments ─────────────────────────────────────
        let scope = RelevanceScope::new(&closure, repo.id, &repogroups);
        let assignments = self.aggregator.gather(snapshot.as_ref(), &scope)?;

        // ── Step 7: Close the snapshot ───────────────────────────────────────
        snapshot.finish()?;

        debug!(
            request_id = %request_id,
            user_id = user.id.0,
            repo_id = repo.id.0,
            groups = scope.groups.len(),
            repogroups = scope.repogroups.len(),
            assignments = assignments.len(),
            "request context resolved"
        );

        Ok(RequestContext {
            request_id,
            user,
            repo,
            action,
            closure,
            repogroups,
            assignments,
        })
    }

    /// The fact set an evaluator would receive for `ctx`.
    pub fn facts(&self, ctx: &RequestContext, now: DateTime<Utc>) -> FactSet {
        FactSet::from_context(ctx, self.policy.role_actions(), now)
    }

    /// Decide a resolved context.
    pub fn decide(
        &self,
        ctx: &RequestContext,
        credential: Option<&Credential>,
        now: DateTime<Utc>,
    ) -> AuthzResult<Decision> {
        // ── Step 8: In-process rule ──────────────────────────────────────────
        let local = self.policy.decide(&ctx.assignments, ctx.action)?;

        // ── Step 9: External evaluator, when a credential is presented ───────
        let (verdict, evaluator) = match (credential, self.evaluator.as_ref()) {
            (Some(credential), Some(evaluator)) => {
                let facts = self.facts(ctx, now);
                let outcome = evaluator.evaluate(credential, &facts)?;
                let verdict = combine(ctx, local, outcome.allowed)?;
                (verdict, Some(outcome))
            }
            (Some(_), None) => {
                return Err(AuthzError::ConfigError {
                    reason: "a credential was supplied but no policy evaluator is configured".to_string(),
                });
            }
            (None, _) => (local, None),
        };

        match &verdict {
            Verdict::Allow { grant } => info!(
                request_id = %ctx.request_id,
                user_id = ctx.user.id.0,
                repo = %ctx.repo.name,
                action = %ctx.action,
                grant = %grant,
                "access allowed"
            ),
            Verdict::Deny { reason } => info!(
                request_id = %ctx.request_id,
                user_id = ctx.user.id.0,
                repo = %ctx.repo.name,
                action = %ctx.action,
                reason = %reason,
                "access denied"
            ),
        }

        Ok(Decision {
            request_id: ctx.request_id,
            user: ctx.user.clone(),
            repo: ctx.repo.clone(),
            action: ctx.action,
            verdict,
            policy_version: self.policy.version().to_string(),
            evaluator,
        })
    }
}

/// Merge the in-process verdict with the evaluator's answer.
fn combine(ctx: &RequestContext, local: Verdict, evaluator_allowed: bool) -> AuthzResult<Verdict> {
    match (local, evaluator_allowed) {
        (local @ Verdict::Allow { .. }, true) => Ok(local),
        (local @ Verdict::Deny { .. }, false) => Ok(local),
        (Verdict::Allow { grant }, false) => {
            info!(
                request_id = %ctx.request_id,
                grant = %grant,
                "credential restrictions narrowed an allow to deny"
            );
            Ok(Verdict::Deny {
                reason: "the credential does not authorize this request".to_string(),
            })
        }
        (Verdict::Deny { reason }, true) => {
            warn!(
                request_id = %ctx.request_id,
                local_reason = %reason,
                "evaluator allowed a request the role table denies"
            );
            Err(AuthzError::evaluation(
                "evaluator allowed a request that no role assignment permits",
            ))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
