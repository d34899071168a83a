//! Scenario 3: No grant
//!
//! Olivia belongs to no group and holds no role on Alpha. With zero
//! relevant assignments every action is denied.

use repoguard_contracts::{error::AuthzResult, request::Decision, role::Action};

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, OLIVIA},
    scenarios::print_decision,
};

pub fn evaluate(backend: Backend, action: Action) -> AuthzResult<Decision> {
    authorizer(backend, &forge_graph())?.authorize(OLIVIA, "Alpha", action, None)
}

/// Run Scenario 3 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 3: No grant ===");
    println!();
    println!("  Request: Olivia reads Alpha");

    for backend in Backend::ALL {
        println!("  [{}]", backend);
        print_decision(&evaluate(backend, Action::Read)?);
    }

    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
