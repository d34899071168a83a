//! Scenario 7: Attenuated token
//!
//! Liam presents a biscuit credential with the request. The in-process rule
//! allows reading Bravo (Scenario 1); the evaluator re-derives the verdict
//! from the request's fact set and the token's own checks.
//!
//!   - token expiring in the future → both allow → allow
//!   - token that expired a minute ago → the token check fails → deny
//!
//! The evaluator can narrow a local allow but never widen a local deny.

use chrono::{DateTime, Duration, Utc};

use repoguard_biscuit::{Attenuation, BiscuitEvaluator, TokenIssuer};
use repoguard_contracts::{error::AuthzResult, request::Decision, role::Action};

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, LIAM},
    scenarios::print_decision,
};

/// Decide Liam reading Bravo at `now` with a token valid for `ttl`.
///
/// A negative `ttl` yields a token that has already expired.
pub fn evaluate(backend: Backend, ttl: Duration, now: DateTime<Utc>) -> AuthzResult<Decision> {
    let issuer = TokenIssuer::new();
    let authz = authorizer(backend, &forge_graph())?
        .with_evaluator(Box::new(BiscuitEvaluator::new(issuer.public_key())));

    let token = issuer.issue(LIAM)?;
    let token = issuer.attenuate(&token, Attenuation::ExpiresAt(now + ttl))?;
    authz.authorize_at(LIAM, "Bravo", Action::Read, Some(&token), now)
}

/// Run Scenario 7 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 7: Attenuated token ===");
    println!();
    println!("  Request: Liam reads Bravo, presenting a credential");

    let now = Utc::now();
    for backend in Backend::ALL {
        for (label, ttl) in [("valid 5m", Duration::minutes(5)), ("expired 1m ago", Duration::minutes(-1))] {
            let decision = evaluate(backend, ttl, now)?;
            let evaluator = match &decision.evaluator {
                Some(outcome) if outcome.allowed => "allow",
                Some(_) => "deny",
                None => "not consulted",
            };
            println!("  [{}] token {}", backend, label);
            println!("    Evaluator: {}", evaluator);
            print_decision(&decision);
        }
    }

    println!();
    println!("  Scenario 7 complete.");
    println!();
    Ok(())
}
