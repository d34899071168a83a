//! Forge reference scenarios.
//!
//! Each scenario wires real repoguard components (store, role table,
//! authorizer, and where needed the biscuit evaluator) over the forge graph
//! and demonstrates one decision pattern. `evaluate` returns the raw result
//! for one backend; `run_scenario` prints it for every backend.

pub mod attenuated_token;
pub mod corrupt_owner_on_repogroup;
pub mod cyclic_nesting;
pub mod direct_owner_write;
pub mod nested_group_read;
pub mod no_grant_deny;
pub mod unknown_repo;

use repoguard_contracts::{
    error::AuthzResult,
    request::{Decision, Verdict},
};

/// Run every scenario in order.
pub fn run_all() -> AuthzResult<()> {
    nested_group_read::run_scenario()?;
    direct_owner_write::run_scenario()?;
    no_grant_deny::run_scenario()?;
    corrupt_owner_on_repogroup::run_scenario()?;
    unknown_repo::run_scenario()?;
    cyclic_nesting::run_scenario()?;
    attenuated_token::run_scenario()?;
    Ok(())
}

pub(crate) fn print_decision(decision: &Decision) {
    match &decision.verdict {
        Verdict::Allow { grant } => println!("    Verdict:  ALLOW via {}", grant),
        Verdict::Deny { reason } => println!("    Verdict:  DENY ({})", reason),
    }
    println!("    Policy:   {}", decision.policy_version);
}
