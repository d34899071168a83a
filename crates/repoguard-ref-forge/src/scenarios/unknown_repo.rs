//! Scenario 5: Unknown repo
//!
//! A request naming a repo the store does not hold fails with `NotFound`.
//! The repo is looked up before the closure, so no group traversal runs.

use repoguard_contracts::{
    error::{AuthzError, AuthzResult},
    request::Decision,
    role::Action,
};

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, LIAM},
    scenarios::print_decision,
};

pub const MISSING_REPO: &str = "Zulu";

pub fn evaluate(backend: Backend) -> AuthzResult<Decision> {
    authorizer(backend, &forge_graph())?.authorize(LIAM, MISSING_REPO, Action::Read, None)
}

/// Run Scenario 5 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 5: Unknown repo ===");
    println!();
    println!("  Request: Liam reads {}", MISSING_REPO);

    for backend in Backend::ALL {
        println!("  [{}]", backend);
        match evaluate(backend) {
            Err(e @ AuthzError::NotFound { .. }) => println!("    Rejected: {}", e),
            Err(e) => return Err(e),
            Ok(decision) => {
                println!("    UNEXPECTED: request for a missing repo was decided");
                print_decision(&decision);
            }
        }
    }

    println!();
    println!("  Scenario 5 complete.");
    println!();
    Ok(())
}
