//! Child record.
//!
//! # Invariants
//! - `parent_id` is an identifier only; loading the parent is a separate,
//!   explicit step.
//! - A child never outlives its parent (storage cascades parent deletes).

use super::parent::ParentId;
use super::validation::{normalize_name, ModelError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned child identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(pub i64);

impl Display for ChildId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub name: String,
    /// `None` until the child is attached to a parent.
    pub parent_id: Option<ParentId>,
}

impl Child {
    /// Replaces the name after validation. The record is left unchanged on
    /// error.
    pub fn rename(&mut self, new_name: impl Into<String>) -> Result<(), ModelError> {
        self.name = normalize_name(new_name)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        normalize_name(self.name.as_str()).map(|_| ())
    }
}
