//! Parent record, cached snapshot shape, and session-side references.
//!
//! # Responsibility
//! - Define `Parent`, the fully loaded record stored by the cache.
//! - Define `ParentRef`, what a unit of work hands out for an association it
//!   has not loaded.
//!
//! # Invariants
//! - Every field of `Parent` is owned data; reading it never touches storage.
//! - `ParentRef::Reference` carries identity only. Code that needs fields must
//!   run an explicit load.

use super::child::{Child, ChildId};
use super::validation::{normalize_name, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Storage-assigned parent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(pub i64);

impl Display for ParentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully materialized parent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub id: ParentId,
    pub name: String,
    /// Ids of the children attached to this parent at load time.
    pub children: BTreeSet<ChildId>,
}

impl Parent {
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

/// Parent together with its eagerly loaded children, ordered by child id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentGraph {
    pub parent: Parent,
    pub children: Vec<Child>,
}

/// A parent as one unit of work sees it.
///
/// Which variant a caller receives depends on what that unit of work has
/// already loaded, so it says nothing about durable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ParentRef {
    /// Identity only. Fields have not been loaded in this unit of work.
    Reference { id: ParentId },
    /// The unit of work holds a loaded copy.
    Loaded { parent: Parent },
}

impl ParentRef {
    pub fn id(&self) -> ParentId {
        match self {
            Self::Reference { id } => *id,
            Self::Loaded { parent } => parent.id,
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// Returns the loaded parent, or `None` for a bare reference.
    pub fn loaded(&self) -> Option<&Parent> {
        match self {
            Self::Reference { .. } => None,
            Self::Loaded { parent } => Some(parent),
        }
    }

    pub fn into_loaded(self) -> Option<Parent> {
        match self {
            Self::Reference { .. } => None,
            Self::Loaded { parent } => Some(parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Parent, ParentId, ParentRef};
    use std::collections::BTreeSet;

    fn parent(id: i64, name: &str) -> Parent {
        Parent {
            id: ParentId(id),
            name: name.to_string(),
            children: BTreeSet::new(),
        }
    }

    #[test]
    fn reference_exposes_identity_without_fields() {
        let reference = ParentRef::Reference { id: ParentId(7) };
        assert_eq!(reference.id(), ParentId(7));
        assert!(!reference.is_materialized());
        assert!(reference.loaded().is_none());
        assert!(reference.into_loaded().is_none());
    }

    #[test]
    fn loaded_exposes_parent() {
        let loaded = ParentRef::Loaded {
            parent: parent(3, "P"),
        };
        assert_eq!(loaded.id(), ParentId(3));
        assert!(loaded.is_materialized());
        assert_eq!(loaded.into_loaded().unwrap().name, "P");
    }

    #[test]
    fn parent_ref_serializes_with_state_tag() {
        let reference = ParentRef::Reference { id: ParentId(1) };
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json, serde_json::json!({"state": "reference", "id": 1}));
    }
}
