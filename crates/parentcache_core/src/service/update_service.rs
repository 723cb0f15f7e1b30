//! Child update + parent cache refresh use-case.
//!
//! # Responsibility
//! - Rename a child and refresh the cache entry of its parent as one call.
//! - Seed and read parent graphs for callers that verify cache contents.
//!
//! # Invariants
//! - The parent id driving the refresh is taken from the child's link; the
//!   parent itself is never loaded by the orchestrating session for it.
//! - Exactly one cache refresh per successful rename.
//! - The rename is committed before the refresh runs. A failed refresh is
//!   reported but does not undo the rename.
//! - The returned `ParentRef` reflects the orchestrating session only; the
//!   materialized value lives in the cache.

use crate::cache::materialized_cache::{CacheError, MaterializedCache};
use crate::model::child::ChildId;
use crate::model::parent::{ParentGraph, ParentId, ParentRef};
use crate::model::validation::ModelError;
use crate::repo::record_store::{EntityKey, RepoError};
use crate::session::{Propagation, Session, SessionFactory};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from update/refresh use-cases.
#[derive(Debug)]
pub enum ServiceError {
    ChildNotFound(ChildId),
    ParentNotFound(ParentId),
    /// Child exists but is not attached to any parent.
    ChildHasNoParent(ChildId),
    InvalidName(ModelError),
    /// The rename committed but the cache refresh failed.
    Cache(CacheError),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChildNotFound(id) => write!(f, "child not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent not found: {id}"),
            Self::ChildHasNoParent(id) => write!(f, "child has no parent: {id}"),
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "cache refresh failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Child(id)) => Self::ChildNotFound(id),
            RepoError::NotFound(EntityKey::Parent(id)) => Self::ParentNotFound(id),
            RepoError::Model(err) => Self::InvalidName(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(value: ModelError) -> Self {
        Self::InvalidName(value)
    }
}

impl From<CacheError> for ServiceError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

/// Orchestrates child updates and parent cache refreshes.
pub struct UpdateService {
    sessions: SessionFactory,
    cache: Arc<MaterializedCache>,
}

impl UpdateService {
    pub fn new(sessions: SessionFactory, cache: Arc<MaterializedCache>) -> Self {
        Self { sessions, cache }
    }

    pub fn cache(&self) -> &MaterializedCache {
        &self.cache
    }

    /// Renames a child in its own unit of work, then refreshes its parent.
    pub fn update_and_refresh(
        &self,
        child_id: ChildId,
        new_name: &str,
    ) -> ServiceResult<ParentRef> {
        self.update_and_refresh_with(Propagation::StartIsolated, None, child_id, new_name)
    }

    /// Renames a child inside the caller's session, then refreshes its
    /// parent.
    ///
    /// The caller's session is flushed and cleared but not committed. The
    /// refresh reads committed storage only, so it does not see this rename
    /// until the caller commits.
    pub fn update_and_refresh_in(
        &self,
        session: &mut Session<'_>,
        child_id: ChildId,
        new_name: &str,
    ) -> ServiceResult<ParentRef> {
        self.update_and_refresh_with(Propagation::JoinExisting, Some(session), child_id, new_name)
    }

    /// Renames a child under the given propagation, then refreshes its
    /// parent.
    ///
    /// # Contract
    /// - `ChildNotFound` / `InvalidName` / `ChildHasNoParent` abort before
    ///   any write is kept and before any refresh.
    /// - Returns the parent as the orchestrating session saw it; this is a
    ///   `ParentRef::Reference` unless that session had already loaded the
    ///   parent. Read `cache().get(..)` for the materialized value.
    pub fn update_and_refresh_with(
        &self,
        propagation: Propagation,
        current: Option<&mut Session<'_>>,
        child_id: ChildId,
        new_name: &str,
    ) -> ServiceResult<ParentRef> {
        let started_at = Instant::now();
        info!(
            "event=update_and_refresh module=service status=start child_id={}",
            child_id
        );

        let result = self
            .sessions
            .run(propagation, current, |session| -> ServiceResult<ParentRef> {
                let parent_ref = rename_child(session, child_id, new_name)?;
                session.flush()?;
                session.clear();
                Ok(parent_ref)
            })
            .and_then(|parent_ref| -> ServiceResult<ParentRef> {
                self.cache.refresh(parent_ref.id())?;
                Ok(parent_ref)
            });

        match &result {
            Ok(parent_ref) => info!(
                "event=update_and_refresh module=service status=ok child_id={} parent_id={} returned_materialized={} duration_ms={}",
                child_id,
                parent_ref.id(),
                parent_ref.is_materialized(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=update_and_refresh module=service status=error child_id={} duration_ms={} error={}",
                child_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Creates a parent and its children in one unit of work.
    pub fn create_parent(&self, name: &str, child_names: &[&str]) -> ServiceResult<ParentGraph> {
        self.sessions
            .run_in_new_scope(|session| -> ServiceResult<ParentGraph> {
                let parent_id = session.persist_parent(name)?;
                for child_name in child_names {
                    session.persist_child(child_name, Some(parent_id))?;
                }
                Ok(session.load_parent_with_children(parent_id)?)
            })
    }

    /// Eagerly loads a parent and its children from committed storage.
    pub fn load_parent_with_children(&self, parent_id: ParentId) -> ServiceResult<ParentGraph> {
        self.sessions
            .run_in_read_scope(|session| -> ServiceResult<ParentGraph> {
                Ok(session.load_parent_with_children(parent_id)?)
            })
    }
}

fn rename_child(
    session: &mut Session<'_>,
    child_id: ChildId,
    new_name: &str,
) -> ServiceResult<ParentRef> {
    session.child_mut(child_id)?.rename(new_name)?;
    session
        .parent_ref_of(child_id)?
        .ok_or(ServiceError::ChildHasNoParent(child_id))
}
