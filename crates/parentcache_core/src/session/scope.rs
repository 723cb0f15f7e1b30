//! Scope boundaries: start an isolated unit of work or join the caller's.

use super::unit_of_work::Session;
use crate::db::{open_store, DbResult, StoreConfig};
use crate::repo::record_store::RepoError;
use log::warn;
use rusqlite::{Connection, TransactionBehavior};

/// How a unit-of-work primitive relates to the caller's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Run inside the caller's session when one is given; otherwise start one.
    JoinExisting,
    /// Always run in a new session on its own connection.
    StartIsolated,
}

/// Opens sessions against one configured store.
///
/// Cheap to clone and safe to share across threads; every scope it starts
/// opens a connection of its own.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: StoreConfig,
}

impl SessionFactory {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a bootstrapped connection for a caller that manages its own
    /// session lifetime via `Session::begin`.
    pub fn open_connection(&self) -> DbResult<Connection> {
        open_store(&self.config)
    }

    /// Runs `f` in a freshly created unit of work that may write.
    ///
    /// # Contract
    /// - Starts an immediate transaction: the write lock is taken up front,
    ///   and a scope that finds it held waits within the busy timeout.
    /// - Commits (flushing first) when `f` returns `Ok`.
    /// - Rolls back when `f` returns `Err`; the original error is returned.
    /// - The session and its connection are discarded when this returns.
    pub fn run_in_new_scope<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.run_scope(TransactionBehavior::Immediate, f)
    }

    /// Runs `f` in a freshly created read-only unit of work.
    ///
    /// The transaction is deferred, so it never waits on writers and reads
    /// the committed state as of its first statement. `f` must not write.
    pub fn run_in_read_scope<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.run_scope(TransactionBehavior::Deferred, f)
    }

    /// Runs `f` sharing the caller's unit of work. Commit stays with the
    /// caller.
    pub fn run_in_current_scope<T, E, F>(&self, current: &mut Session<'_>, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
    {
        f(current)
    }

    /// Runs `f` with the given propagation.
    ///
    /// `JoinExisting` without a current session behaves like
    /// `StartIsolated`. A new scope is opened with `run_in_new_scope`.
    pub fn run<T, E, F>(
        &self,
        propagation: Propagation,
        current: Option<&mut Session<'_>>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
        E: From<RepoError>,
    {
        match (propagation, current) {
            (Propagation::JoinExisting, Some(session)) => self.run_in_current_scope(session, f),
            _ => self.run_in_new_scope(f),
        }
    }

    fn run_scope<T, E, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
        E: From<RepoError>,
    {
        let mut conn = self.open_connection().map_err(RepoError::from)?;
        let mut session = Session::begin_with(&mut conn, behavior)?;

        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(err) => {
                let session_id = session.id();
                if let Err(rollback_err) = session.rollback() {
                    warn!(
                        "event=session_end module=session status=error session_id={} error_code=rollback_failed error={}",
                        session_id, rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}
