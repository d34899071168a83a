//! Decision request context, verdicts, and decisions.
//!
//! `RequestContext` is everything resolved from the store for one request.
//! The decision engine turns it into a `Verdict`; the authorizer wraps that
//! into a `Decision` for the caller.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Repo, RepogroupId, User},
    relation::{GroupClosure, RepogroupMembership},
    role::{Action, RoleAssignment},
};

/// Unique identifier for a single decision request.
///
/// Appears in every log line emitted while the request is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The resolved bundle a decision is made from.
///
/// Built under one store snapshot and discarded once the verdict exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub user: User,
    pub repo: Repo,
    pub action: Action,
    pub closure: GroupClosure,
    pub repogroups: BTreeSet<RepogroupMembership>,
    pub assignments: Vec<RoleAssignment>,
}

impl RequestContext {
    pub fn repogroup_ids(&self) -> BTreeSet<RepogroupId> {
        self.repogroups.iter().map(|m| m.repogroup_id).collect()
    }
}

/// The outcome of the in-process decision rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// `grant` is the assignment whose role permits the requested action.
    Allow { grant: RoleAssignment },

    /// No relevant assignment permits the action.
    Deny { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }

    /// The assignment that justified an allow, if any.
    pub fn grant(&self) -> Option<&RoleAssignment> {
        match self {
            Verdict::Allow { grant } => Some(grant),
            Verdict::Deny { .. } => None,
        }
    }
}

/// An opaque signed credential presented with a request.
///
/// Only a `PolicyEvaluator` looks inside; the pipeline passes it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(pub Vec<u8>);

impl Credential {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What an external policy evaluator answered for a fact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorOutcome {
    pub allowed: bool,
    /// Human-inspectable account of the evaluation (facts, rules, result).
    pub trace: String,
}

/// The final answer for one decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub request_id: RequestId,
    pub user: User,
    pub repo: Repo,
    pub action: Action,
    pub verdict: Verdict,
    /// Fingerprint of the role→action table the verdict was computed with.
    pub policy_version: String,
    /// Present when an external evaluator confirmed (or refused) the verdict.
    pub evaluator: Option<EvaluatorOutcome>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict.is_allowed()
    }
}
