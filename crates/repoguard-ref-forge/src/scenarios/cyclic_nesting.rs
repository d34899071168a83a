//! Scenario 6: Cyclic nesting
//!
//! The forge nests BarOps under FooOps. Adding the reverse edge closes a
//! cycle. The closure resolver stops at groups it has already visited, so
//! Liam's closure is exactly the two groups on the cycle and the request
//! still decides normally.

use repoguard_contracts::{error::AuthzResult, request::RequestContext, role::Action};
use repoguard_core::closure::cycle_members;
use repoguard_store::RelationshipGraph;

use crate::{
    authorizer,
    mock_data::{forge_graph, Backend, BAR_OPS, FOO_OPS, LIAM},
    scenarios::print_decision,
};

/// The forge with BarOps also nesting FooOps.
pub fn cyclic_graph() -> RelationshipGraph {
    let mut g = forge_graph();
    g.nest(BAR_OPS, FOO_OPS);
    g
}

pub fn evaluate(backend: Backend) -> AuthzResult<RequestContext> {
    authorizer(backend, &cyclic_graph())?.context(LIAM, "Bravo", Action::Read)
}

/// Run Scenario 6 on every backend.
pub fn run_scenario() -> AuthzResult<()> {
    println!("=== Scenario 6: Cyclic nesting ===");
    println!();
    println!("  Nesting: FooOps ⊃ BarOps ⊃ FooOps");
    println!("  Request: Liam reads Bravo");

    for backend in Backend::ALL {
        let authz = authorizer(backend, &cyclic_graph())?;
        let ctx = authz.context(LIAM, "Bravo", Action::Read)?;
        let on_cycle = cycle_members(&ctx.closure.nesting);

        println!("  [{}]", backend);
        println!(
            "    Closure:  {:?}",
            ctx.closure.groups().iter().map(|g| g.namespaced()).collect::<Vec<_>>()
        );
        println!("    On cycle: {} group(s)", on_cycle.len());
        print_decision(&authz.decide(&ctx, None, chrono::Utc::now())?);
    }

    println!();
    println!("  Scenario 6 complete.");
    println!();
    Ok(())
}
