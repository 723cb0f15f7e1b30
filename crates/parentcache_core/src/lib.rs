//! Core logic for the parent snapshot cache.
//! Keeps cached parents fully loaded no matter what the caller's unit of
//! work has or has not loaded.

pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;

pub use cache::materialized_cache::{CacheError, CacheResult, MaterializedCache};
pub use db::StoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::child::{Child, ChildId};
pub use model::parent::{Parent, ParentGraph, ParentId, ParentRef};
pub use model::validation::ModelError;
pub use repo::record_store::{EntityKey, RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use service::update_service::{ServiceError, ServiceResult, UpdateService};
pub use session::{Propagation, Session, SessionFactory, SessionState};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
