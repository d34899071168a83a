//! Scenario 1: Nested group read
//!
//! Liam is a direct member of FooOps. FooOps nests BarOps, so Liam is
//! present in BarOps too. BarOps holds `writer` on repogroup Foo, which
//! contains Bravo. Reading Bravo is allowed.
//!
//! Pipeline walk-through:
//!   1. Liam and Bravo resolve
//!   2. Closure: FooOps (direct), BarOps (via FooOps)
//!   3. Bravo's repogroups: Foo
//!   4. Relevant assignment: BarOps → Foo: writer
//!   5. writer permits read → allow

use repoguard_contracts::{error::AuthzResult, request::Decision, role::Action};
use repoguard_core::ClosureResolver;

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, BAR_OPS, LIAM},
    scenarios::print_decision,
};

pub fn evaluate(backend: Backend) -> AuthzResult<Decision> {
    authorizer(backend, &forge_graph())?.authorize(LIAM, "Bravo", Action::Read, None)
}

/// Run Scenario 1 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 1: Nested group read ===");
    println!();
    println!("  Request: Liam reads Bravo");

    for backend in Backend::ALL {
        let authz = authorizer(backend, &forge_graph())?;
        let ctx = authz.context(LIAM, "Bravo", Action::Read)?;

        let path = ClosureResolver::new()
            .path_to(&ctx.closure, BAR_OPS)
            .map(|p| p.iter().map(|g| g.namespaced()).collect::<Vec<_>>().join(" → "))
            .unwrap_or_else(|| "unreachable".to_string());

        println!("  [{}]", backend);
        println!("    Closure:  {} group(s), BarOps via {}", ctx.closure.groups().len(), path);
        println!("    Relevant: {} assignment(s)", ctx.assignments.len());
        print_decision(&authz.decide(&ctx, None, chrono::Utc::now())?);
    }

    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
