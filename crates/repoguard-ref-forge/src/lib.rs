//! # repoguard-ref-forge
//!
//! Forge reference runtime for the repoguard access decision engine.
//!
//! Demonstrates the decision pipeline on a fictional code host, on both the
//! in-memory and the SQLite store:
//!
//! 1. **Nested group read**: a grant to a nested group reaches a member of
//!    its parent group through a repogroup.
//! 2. **Direct owner write**: a user's own owner grant on a repo.
//! 3. **No grant**: default deny.
//! 4. **Corrupt owner grant**: an owner row on a repogroup is rejected as a
//!    data-integrity fault.
//! 5. **Unknown repo**: `NotFound` before any closure work.
//! 6. **Cyclic nesting**: the closure terminates on a group cycle.
//! 7. **Attenuated token**: an expired credential narrows a local allow to
//!    a deny.

pub mod mock_data;
pub mod scenarios;

use repoguard_contracts::error::AuthzResult;
use repoguard_core::Authorizer;
use repoguard_store::RelationshipGraph;

use crate::mock_data::{forge_policy, Backend};

/// An authorizer over `graph` on `backend`, deciding with the forge table.
pub fn authorizer(backend: Backend, graph: &RelationshipGraph) -> AuthzResult<Authorizer> {
    let store = backend.open(graph)?;
    Ok(Authorizer::new(store, Box::new(forge_policy()?)))
}
