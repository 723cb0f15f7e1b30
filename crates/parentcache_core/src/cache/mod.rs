//! Process-wide cache of materialized parent snapshots.
//!
//! # Responsibility
//! - Hold one fully loaded `Parent` per parent id.
//! - Refresh entries by reading through to durable storage.
//!
//! # Invariants
//! - Entries are `Parent` values; a `ParentRef` cannot be stored.
//! - Every refresh runs in its own isolated unit of work.

pub mod materialized_cache;
