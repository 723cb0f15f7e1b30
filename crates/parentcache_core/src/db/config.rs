//! Store connection settings.
//!
//! # Invariants
//! - `path` points at a file database; isolated units of work need a store
//!   that more than one connection can open.
//! - `wal` keeps readers in one unit of work from blocking on a pending
//!   write in another.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a connection waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings used every time a unit of work opens its own connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
    /// Lock wait budget per statement.
    #[serde(default = "default_busy_timeout", with = "duration_millis")]
    pub busy_timeout: Duration,
    /// Run the database in write-ahead-log journal mode.
    #[serde(default = "default_wal")]
    pub wal: bool,
}

impl StoreConfig {
    /// Creates a config for `path` with default timeout and WAL enabled.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: true,
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

fn default_busy_timeout() -> Duration {
    DEFAULT_BUSY_TIMEOUT
}

fn default_wal() -> bool {
    true
}

mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
