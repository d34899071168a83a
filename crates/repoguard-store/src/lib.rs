//! # repoguard-store
//!
//! Relationship store implementations for repoguard.
//!
//! - [`InMemoryStore`]: an owned [`RelationshipGraph`] with copy-on-write
//!   snapshots, for tests and embedding.
//! - [`SqliteStore`]: a SQLite database read under one transaction per
//!   snapshot.
//!
//! Both answer the lookups of
//! [`StoreSnapshot`](repoguard_core::traits::StoreSnapshot) and return role
//! labels undecoded.

pub mod graph;
pub mod memory;
pub mod sqlite;

pub use graph::RelationshipGraph;
pub use memory::InMemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT, SCHEMA};
