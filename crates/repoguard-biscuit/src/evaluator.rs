//! `PolicyEvaluator` backed by the biscuit Datalog engine.
//!
//! Evaluation steps for one request:
//!
//! 1. Verify the credential's signature against the root public key.
//! 2. Load the request's fact set as authorizer facts.
//! 3. Install the inference rules and policies from `rules::RULES`.
//! 4. Run the authorizer under limits sized from the fact set. Token checks
//!    from every attenuation block run alongside the policies.
//!
//! A failed check or the fallback `deny` policy is a deny. Anything else
//! that stops evaluation is `PolicyEvaluationFailed`.

use std::time::Duration;

use biscuit_auth::{error, AuthorizerLimits, Biscuit, PublicKey};
use tracing::{debug, warn};

use repoguard_contracts::{
    error::{AuthzError, AuthzResult},
    facts::FactSet,
    request::{Credential, EvaluatorOutcome},
};
use repoguard_core::traits::PolicyEvaluator;

use crate::{facts, rules::RULES};

/// Default base wall-clock budget for one evaluation.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(1);

/// Extra wall-clock budget granted per input fact.
pub const TIME_PER_FACT: Duration = Duration::from_millis(2);

// Headroom for token blocks, rule bookkeeping, and small requests.
const BASE_FACTS: u64 = 1000;
const BASE_ITERATIONS: u64 = 100;

/// Limits for evaluating `facts` with a base time budget of `time_limit`.
///
/// Every derived predicate is unary or bound by an input fact, so no
/// rule can derive more facts than there are inputs: `member_of` ranges
/// over usergroups, `principal` over those plus the subject, `target`
/// over the repo and its repogroups, and `permitted` over `role` facts.
/// The closure gains at most one nesting level per iteration and cannot
/// be deeper than the number of `usergroup` facts.
pub fn limits_for(facts: &FactSet, time_limit: Duration) -> AuthorizerLimits {
    let inputs = facts.len() as u64;
    let edges = facts.with_predicate("usergroup").count() as u64;
    let count = u32::try_from(facts.len()).unwrap_or(u32::MAX);
    AuthorizerLimits {
        max_facts: BASE_FACTS + 5 * inputs,
        max_iterations: BASE_ITERATIONS + edges,
        max_time: time_limit.saturating_add(TIME_PER_FACT.saturating_mul(count)),
    }
}

/// Evaluates fact sets with credentials signed by one root key.
#[derive(Debug, Clone)]
pub struct BiscuitEvaluator {
    root: PublicKey,
    time_limit: Duration,
}

impl BiscuitEvaluator {
    pub fn new(root: PublicKey) -> Self {
        Self {
            root,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }

    /// Replace the base time budget. Each request also gets `TIME_PER_FACT`
    /// per input fact on top of it.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }
}

impl PolicyEvaluator for BiscuitEvaluator {
    fn evaluate(&self, credential: &Credential, facts: &FactSet) -> AuthzResult<EvaluatorOutcome> {
        let token = Biscuit::from(credential.as_bytes(), self.root.clone())
            .map_err(|e| AuthzError::evaluation(format!("credential rejected: {e}")))?;

        let mut authorizer = token
            .authorizer()
            .map_err(|e| AuthzError::evaluation(format!("failed to load credential: {e}")))?;

        for fact in facts::facts(facts) {
            authorizer
                .add_fact(fact)
                .map_err(|e| AuthzError::evaluation(format!("invalid fact: {e}")))?;
        }
        authorizer
            .add_code(RULES)
            .map_err(|e| AuthzError::evaluation(format!("invalid rules: {e}")))?;

        let limits = limits_for(facts, self.time_limit);
        debug!(
            max_facts = limits.max_facts,
            max_iterations = limits.max_iterations,
            max_time_ms = limits.max_time.as_millis() as u64,
            "evaluator limits"
        );
        let result = authorizer.authorize_with_limits(limits);
        let world = authorizer.dump_code();

        match result {
            Ok(policy) => {
                debug!(policy, facts = facts.len(), "evaluator allowed");
                Ok(EvaluatorOutcome {
                    allowed: true,
                    trace: format!("{world}\n// result: allow (policy {policy})"),
                })
            }
            Err(error::Token::FailedLogic(logic)) => {
                debug!(reason = ?logic, facts = facts.len(), "evaluator denied");
                Ok(EvaluatorOutcome {
                    allowed: false,
                    trace: format!("{world}\n// result: deny ({logic:?})"),
                })
            }
            Err(e) => {
                warn!(error = %e, "evaluator failed");
                Err(AuthzError::evaluation(e))
            }
        }
    }
}
