//! Scenario 2: Direct owner write
//!
//! Noah holds `owner` directly on Charlie. Writing Charlie is allowed by
//! that single user→repo assignment; no group is involved.

use repoguard_contracts::{error::AuthzResult, request::Decision, role::Action};

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, NOAH},
    scenarios::print_decision,
};

pub fn evaluate(backend: Backend) -> AuthzResult<Decision> {
    authorizer(backend, &forge_graph())?.authorize(NOAH, "Charlie", Action::Write, None)
}

/// Run Scenario 2 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 2: Direct owner write ===");
    println!();
    println!("  Request: Noah writes Charlie");

    for backend in Backend::ALL {
        println!("  [{}]", backend);
        print_decision(&evaluate(backend)?);
    }

    println!();
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
