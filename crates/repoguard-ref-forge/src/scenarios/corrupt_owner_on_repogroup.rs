//! Scenario 4: Corrupt owner grant on a repogroup
//!
//! Owner is only ever granted on single repos. A stored row granting FooOps
//! `owner` on repogroup Foo is a data-integrity fault: decoding it raises
//! `InvalidRoleForResourceType` and the request fails before any decision.

use repoguard_contracts::{
    entity::{PrincipalRef, ResourceRef},
    error::{AuthzError, AuthzResult},
    request::Decision,
    role::{Action, Role},
};
use repoguard_store::RelationshipGraph;

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, FOO, FOO_OPS, LIAM},
    scenarios::print_decision,
};

/// The forge with one corrupt grant added.
pub fn corrupt_graph() -> RelationshipGraph {
    let mut g = forge_graph();
    g.grant(PrincipalRef::Usergroup(FOO_OPS), ResourceRef::Repogroup(FOO), Role::Owner);
    g
}

pub fn evaluate(backend: Backend) -> AuthzResult<Decision> {
    authorizer(backend, &corrupt_graph())?.authorize(LIAM, "Bravo", Action::Read, None)
}

/// Run Scenario 4 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 4: Corrupt owner grant on a repogroup ===");
    println!();
    println!("  Stored row: FooOps -> Foo : owner");
    println!("  Request:    Liam reads Bravo");

    for backend in Backend::ALL {
        println!("  [{}]", backend);
        match evaluate(backend) {
            Err(e @ AuthzError::InvalidRoleForResourceType { .. }) => println!("    Rejected: {}", e),
            Err(e) => return Err(e),
            Ok(decision) => {
                println!("    UNEXPECTED: corrupt row was not rejected");
                print_decision(&decision);
            }
        }
    }

    println!();
    println!("  Scenario 4 complete.");
    println!();
    Ok(())
}
