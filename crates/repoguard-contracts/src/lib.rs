//! # repoguard-contracts
//!
//! Shared types, relations, and contracts for the repoguard access-control
//! engine.
//!
//! All crates in the workspace import from here. No pipeline logic lives in
//! this crate, only data definitions, label decoding, and error types.

pub mod entity;
pub mod error;
pub mod facts;
pub mod relation;
pub mod request;
pub mod role;
