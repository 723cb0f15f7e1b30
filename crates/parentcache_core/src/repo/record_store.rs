//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and write `parents` / `children` rows.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Loads return fully materialized values or `NotFound`; never a partial row.
//! - Writes trim and validate names and reject dangling parent ids.
//! - The store reads through whatever connection or transaction it wraps; it
//!   holds no state of its own.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::child::{Child, ChildId};
use crate::model::parent::{Parent, ParentGraph, ParentId};
use crate::model::validation::{normalize_name, ModelError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CHILD_SELECT_SQL: &str = "SELECT
    id,
    name,
    parent_id
FROM children";

pub type RepoResult<T> = Result<T, RepoError>;

/// Identity of any stored record, used in not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Parent(ParentId),
    Child(ChildId),
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parent(id) => write!(f, "parent {id}"),
            Self::Child(id) => write!(f, "child {id}"),
        }
    }
}

/// Errors from record store and unit-of-work operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Model(ModelError),
    NotFound(EntityKey),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl RepoError {
    /// Returns the missing record when this is a not-found error.
    pub fn not_found_key(&self) -> Option<EntityKey> {
        match self {
            Self::NotFound(key) => Some(*key),
            _ => None,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Model(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "{key} not found"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Model(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ModelError> for RepoError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for parent/child persistence.
pub trait RecordStore {
    /// Inserts a parent and returns its storage-assigned id.
    fn insert_parent(&self, name: &str) -> RepoResult<ParentId>;
    /// Inserts a child, optionally attached to an existing parent.
    fn insert_child(&self, name: &str, parent_id: Option<ParentId>) -> RepoResult<ChildId>;
    /// Writes the parent's scalar fields.
    fn update_parent(&self, parent: &Parent) -> RepoResult<()>;
    /// Writes the child's name and parent link.
    fn update_child(&self, child: &Child) -> RepoResult<()>;
    fn load_child(&self, id: ChildId) -> RepoResult<Child>;
    /// Loads a parent with its child id set.
    fn load_parent(&self, id: ParentId) -> RepoResult<Parent>;
    /// Loads a parent and every attached child record.
    fn load_parent_with_children(&self, id: ParentId) -> RepoResult<ParentGraph>;
}

/// SQLite-backed record store.
///
/// Wraps a plain connection or, through deref, an open transaction.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema the caller has already checked.
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_parent_exists(&self, id: ParentId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM parents WHERE id = ?1);",
            [id.0],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound(EntityKey::Parent(id)));
        }
        Ok(())
    }

    fn load_parent_row(&self, id: ParentId) -> RepoResult<(ParentId, String)> {
        self.conn
            .query_row(
                "SELECT id, name FROM parents WHERE id = ?1;",
                [id.0],
                |row| Ok((ParentId(row.get("id")?), row.get::<_, String>("name")?)),
            )
            .optional()?
            .ok_or(RepoError::NotFound(EntityKey::Parent(id)))
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert_parent(&self, name: &str) -> RepoResult<ParentId> {
        let name = normalize_name(name)?;
        self.conn
            .execute("INSERT INTO parents (name) VALUES (?1);", [name.as_str()])?;
        Ok(ParentId(self.conn.last_insert_rowid()))
    }

    fn insert_child(&self, name: &str, parent_id: Option<ParentId>) -> RepoResult<ChildId> {
        let name = normalize_name(name)?;
        if let Some(parent_id) = parent_id {
            self.ensure_parent_exists(parent_id)?;
        }
        self.conn.execute(
            "INSERT INTO children (name, parent_id) VALUES (?1, ?2);",
            params![name.as_str(), parent_id.map(|id| id.0)],
        )?;
        Ok(ChildId(self.conn.last_insert_rowid()))
    }

    fn update_parent(&self, parent: &Parent) -> RepoResult<()> {
        let name = normalize_name(parent.name.as_str())?;

        let changed = self.conn.execute(
            "UPDATE parents SET name = ?1 WHERE id = ?2;",
            params![name.as_str(), parent.id.0],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKey::Parent(parent.id)));
        }
        Ok(())
    }

    fn update_child(&self, child: &Child) -> RepoResult<()> {
        let name = normalize_name(child.name.as_str())?;
        if let Some(parent_id) = child.parent_id {
            self.ensure_parent_exists(parent_id)?;
        }

        let changed = self.conn.execute(
            "UPDATE children SET name = ?1, parent_id = ?2 WHERE id = ?3;",
            params![
                name.as_str(),
                child.parent_id.map(|id| id.0),
                child.id.0
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKey::Child(child.id)));
        }
        Ok(())
    }

    fn load_child(&self, id: ChildId) -> RepoResult<Child> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHILD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.0])?;
        if let Some(row) = rows.next()? {
            return parse_child_row(row);
        }
        Err(RepoError::NotFound(EntityKey::Child(id)))
    }

    fn load_parent(&self, id: ParentId) -> RepoResult<Parent> {
        let (id, name) = self.load_parent_row(id)?;
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM children WHERE parent_id = ?1 ORDER BY id ASC;")?;
        let children = stmt
            .query_map([id.0], |row| row.get::<_, i64>(0).map(ChildId))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Parent { id, name, children })
    }

    fn load_parent_with_children(&self, id: ParentId) -> RepoResult<ParentGraph> {
        let (id, name) = self.load_parent_row(id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{CHILD_SELECT_SQL} WHERE parent_id = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([id.0])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            children.push(parse_child_row(row)?);
        }

        let parent = Parent {
            id,
            name,
            children: children.iter().map(|child| child.id).collect(),
        };
        Ok(ParentGraph { parent, children })
    }
}

fn parse_child_row(row: &Row<'_>) -> RepoResult<Child> {
    let id = ChildId(row.get("id")?);
    let child = Child {
        id,
        name: row.get("name")?,
        parent_id: row.get::<_, Option<i64>>("parent_id")?.map(ParentId),
    };
    child.validate().map_err(|_| {
        RepoError::InvalidData(format!("blank name in children.name for child {id}"))
    })?;
    Ok(child)
}
