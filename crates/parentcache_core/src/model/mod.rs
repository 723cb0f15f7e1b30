//! Domain model for parent/child records.
//!
//! # Responsibility
//! - Define the records owned by the store and the values held by the cache.
//! - Express associations as explicit identifiers, never as auto-loading
//!   references.
//!
//! # Invariants
//! - Every record is identified by a storage-assigned id.
//! - A not-yet-loaded parent is only ever visible as `ParentRef::Reference`.

pub mod child;
pub mod parent;
pub mod validation;
