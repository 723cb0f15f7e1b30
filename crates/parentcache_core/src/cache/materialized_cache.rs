//! Materialized cache keyed by parent id.
//!
//! # Invariants
//! - `refresh` never accepts a caller session; it always opens an isolated
//!   read scope, so it reads committed storage and nothing buffered
//!   elsewhere, and never waits on a writer.
//! - An entry is replaced as one `Arc` swap; readers see the old snapshot or
//!   the new one, never a mix.
//! - A failed refresh leaves the existing entry untouched.
//! - The map lock is never held across storage I/O.

use crate::model::parent::{Parent, ParentId};
use crate::repo::record_store::{EntityKey, RepoError};
use crate::session::SessionFactory;
use log::{error, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from cache refresh.
#[derive(Debug)]
pub enum CacheError {
    /// Durable storage has no such parent.
    NotFound(ParentId),
    Repo(RepoError),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "parent not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for CacheError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Parent(id)) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Read-through cache of fully loaded parents.
pub struct MaterializedCache {
    sessions: SessionFactory,
    entries: RwLock<HashMap<ParentId, Arc<Parent>>>,
}

impl MaterializedCache {
    pub fn new(sessions: SessionFactory) -> Self {
        Self {
            sessions,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Loads `parent_id` from durable storage in a new unit of work and
    /// replaces the entry.
    ///
    /// # Errors
    /// - `CacheError::NotFound` when the parent does not exist. Not retried.
    /// - `CacheError::Repo` for storage failures.
    pub fn refresh(&self, parent_id: ParentId) -> CacheResult<Arc<Parent>> {
        let started_at = Instant::now();
        let loaded = self
            .sessions
            .run_in_read_scope(|session| session.load_parent(parent_id).map_err(CacheError::from));

        match loaded {
            Ok(parent) => {
                let snapshot = Arc::new(parent);
                self.entries.write().insert(parent_id, Arc::clone(&snapshot));
                info!(
                    "event=cache_refresh module=cache status=ok parent_id={} children={} duration_ms={}",
                    parent_id,
                    snapshot.children.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(snapshot)
            }
            Err(err) => {
                error!(
                    "event=cache_refresh module=cache status=error parent_id={} duration_ms={} error_code={} error={}",
                    parent_id,
                    started_at.elapsed().as_millis(),
                    error_code(&err),
                    err
                );
                Err(err)
            }
        }
    }

    /// Returns the current snapshot, or `None` on a miss.
    pub fn get(&self, parent_id: ParentId) -> Option<Arc<Parent>> {
        self.entries.read().get(&parent_id).cloned()
    }

    pub fn contains(&self, parent_id: ParentId) -> bool {
        self.entries.read().contains_key(&parent_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn error_code(err: &CacheError) -> &'static str {
    match err {
        CacheError::NotFound(_) => "parent_not_found",
        CacheError::Repo(_) => "storage_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheError, MaterializedCache};
    use crate::db::StoreConfig;
    use crate::model::child::ChildId;
    use crate::model::parent::ParentId;
    use crate::repo::record_store::{EntityKey, RepoError};
    use crate::session::SessionFactory;

    #[test]
    fn get_on_empty_cache_is_a_miss() {
        let cache = MaterializedCache::new(SessionFactory::new(StoreConfig::new(
            "/nonexistent/parentcache.db",
        )));
        assert!(cache.get(ParentId(1)).is_none());
        assert!(!cache.contains(ParentId(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn parent_not_found_maps_to_cache_not_found() {
        let err = CacheError::from(RepoError::NotFound(EntityKey::Parent(ParentId(9))));
        assert!(matches!(err, CacheError::NotFound(ParentId(9))));

        let err = CacheError::from(RepoError::NotFound(EntityKey::Child(ChildId(9))));
        assert!(matches!(err, CacheError::Repo(_)));
    }
}
