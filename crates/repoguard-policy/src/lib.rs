//! # repoguard-policy
//!
//! The decision engine for repoguard: a versioned role→action table loaded
//! from TOML, and the allow/deny rule applied to it.
//!
//! ## Overview
//!
//! [`RoleActionPolicy`] implements the
//! [`DecisionPolicy`](repoguard_core::traits::DecisionPolicy) trait. A request
//! is allowed if any relevant role assignment holds a role whose table entry
//! lists the requested action. Nothing else allows; there is no explicit deny.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use repoguard_policy::RoleActionPolicy;
//!
//! let policy = RoleActionPolicy::from_file(Path::new("policies/standard.toml"))?;
//! // Pass `policy` to `repoguard_core::Authorizer::new(...)`.
//! ```
//!
//! Every decision records `version()`: the author's label plus a prefix of
//! the table's SHA-256 fingerprint, so two deployments with the same label
//! but different tables are told apart.

pub mod engine;
pub mod table;

pub use engine::{RoleActionPolicy, STANDARD_VERSION};
pub use table::{RoleEntry, RoleTableConfig};

/// The standard table as shipped in `policies/standard.toml`.
pub const STANDARD_TABLE_TOML: &str = include_str!("../policies/standard.toml");

// ── Tests ─────────────────────────────────────────────────────────────────────
