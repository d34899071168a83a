//! # repoguard-biscuit
//!
//! Signed credentials and an external policy evaluator for repoguard, built
//! on biscuit tokens.
//!
//! - [`TokenIssuer`] issues a credential naming a user and appends
//!   [`Attenuation`]s (expiry, single repo, single action).
//! - [`BiscuitEvaluator`] implements
//!   [`PolicyEvaluator`](repoguard_core::traits::PolicyEvaluator): it turns a
//!   request's fact set into authorizer facts, installs the inference rules,
//!   and answers allow or deny with the authorizer's world as the trace.
//!
//! The pipeline never looks inside a credential; only the evaluator does.

pub mod evaluator;
pub mod facts;
pub mod issuer;
pub mod rules;

pub use evaluator::{limits_for, BiscuitEvaluator, DEFAULT_TIME_LIMIT, TIME_PER_FACT};
pub use issuer::{Attenuation, TokenIssuer};
