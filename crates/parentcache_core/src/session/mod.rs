//! Units of work over the record store.
//!
//! # Responsibility
//! - Provide `Session`, one SQLite transaction plus a first-level identity
//!   map with write-behind dirty tracking.
//! - Provide `SessionFactory`, the only way to start a unit of work, with
//!   propagation chosen explicitly by the caller.
//!
//! # Invariants
//! - A session is passed around explicitly; there is no ambient or
//!   thread-local current session.
//! - A session owns its connection's transaction; an isolated scope opens a
//!   fresh connection and shares nothing with the caller.
//! - Dropping a session without `commit` rolls its writes back.

mod scope;
mod unit_of_work;

pub use scope::{Propagation, SessionFactory};
pub use unit_of_work::{Session, SessionState};
