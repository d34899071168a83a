//! # repoguard-core
//!
//! The access decision pipeline for repoguard.
//!
//! This crate provides:
//! - The store and policy seams (`RelationshipStore`, `StoreSnapshot`,
//!   `DecisionPolicy`, `PolicyEvaluator`)
//! - `ClosureResolver`, which expands a user's usergroup memberships
//! - `RoleAggregator`, which gathers every relevant role assignment
//! - The `Authorizer` that runs them in order under one store snapshot
//!
//! ## Usage
//!
//! ```rust,ignore
//! use repoguard_core::{Authorizer, traits::{RelationshipStore, DecisionPolicy}};
//!
//! let authorizer = Authorizer::new(Box::new(store), Box::new(policy));
//! let decision = authorizer.authorize(UserId(1), "Bravo", Action::Read, None)?;
//! ```

pub mod aggregate;
pub mod authorizer;
pub mod closure;
pub mod traits;

#[cfg(test)]
mod mock;

pub use aggregate::{RelevanceScope, RoleAggregator};
pub use authorizer::Authorizer;
pub use closure::ClosureResolver;
