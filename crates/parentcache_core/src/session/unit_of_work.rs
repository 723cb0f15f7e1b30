//! Session: transaction + identity map + write-behind.
//!
//! # Invariants
//! - At most one managed copy per record id per session.
//! - Loads go through the identity map: a managed record is returned as-is,
//!   even when storage holds something newer.
//! - `parent_ref` / `parent_ref_of` never load a parent.
//! - Managed edits reach storage only on `flush` (or `commit`, which flushes).
//!   Names are trimmed on the way out, so a name set through the public
//!   field is stored the same as one set through `rename`.
//! - Lifecycle: `Active -> Flushed -> Cleared`, ended by `Committed` or
//!   `RolledBack`. A load or edit after flush/clear returns to `Active`.

use crate::model::child::{Child, ChildId};
use crate::model::parent::{Parent, ParentGraph, ParentId, ParentRef};
use crate::repo::record_store::{RecordStore, RepoResult, SqliteRecordStore};
use log::{debug, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle state of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reads and edits are buffered in the identity map.
    Active,
    /// Pending edits are written to the transaction; identity map kept.
    Flushed,
    /// Identity map emptied; the next read goes to storage.
    Cleared,
    Committed,
    RolledBack,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Flushed => "flushed",
            Self::Cleared => "cleared",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// A record plus the state it had when last loaded or flushed.
#[derive(Debug)]
struct Managed<T> {
    baseline: T,
    current: T,
}

impl<T: Clone + PartialEq> Managed<T> {
    fn new(value: T) -> Self {
        Self {
            baseline: value.clone(),
            current: value,
        }
    }

    fn is_dirty(&self) -> bool {
        self.baseline != self.current
    }

    fn mark_clean(&mut self) {
        self.baseline = self.current.clone();
    }
}

/// One unit of work: a SQLite transaction with a first-level cache.
pub struct Session<'conn> {
    id: Uuid,
    tx: Transaction<'conn>,
    state: SessionState,
    started_at: Instant,
    parents: BTreeMap<ParentId, Managed<Parent>>,
    children: BTreeMap<ChildId, Managed<Child>>,
}

impl<'conn> Session<'conn> {
    /// Begins a deferred unit of work on `conn`.
    ///
    /// The read snapshot is taken at the first statement, so concurrent
    /// read-only sessions never wait on each other. A deferred session that
    /// later writes fails with `SQLITE_BUSY` if another writer committed
    /// after its snapshot; sessions meant to write use `begin_with` and
    /// `TransactionBehavior::Immediate`.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::begin_with(conn, TransactionBehavior::Deferred)
    }

    /// Begins a unit of work with an explicit transaction behavior.
    ///
    /// `Immediate` takes the write lock up front and waits for it within the
    /// connection's busy timeout.
    pub fn begin_with(
        conn: &'conn mut Connection,
        behavior: TransactionBehavior,
    ) -> RepoResult<Self> {
        let _ = SqliteRecordStore::try_new(conn)?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let id = Uuid::new_v4();
        info!(
            "event=session_begin module=session status=ok session_id={} mode={}",
            id,
            behavior_label(behavior)
        );

        Ok(Self {
            id,
            tx,
            state: SessionState::Active,
            started_at: Instant::now(),
            parents: BTreeMap::new(),
            children: BTreeMap::new(),
        })
    }

    /// Correlation id used in session log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_managed_parent(&self, id: ParentId) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn is_managed_child(&self, id: ChildId) -> bool {
        self.children.contains_key(&id)
    }

    /// Number of records currently held in the identity map.
    pub fn managed_count(&self) -> usize {
        self.parents.len() + self.children.len()
    }

    /// Inserts a parent immediately and manages it. Returns the assigned id.
    pub fn persist_parent(&mut self, name: &str) -> RepoResult<ParentId> {
        self.state = SessionState::Active;
        let store = SqliteRecordStore::new_unchecked(&self.tx);
        let id = store.insert_parent(name)?;
        let parent = store.load_parent(id)?;
        self.parents.insert(id, Managed::new(parent));
        Ok(id)
    }

    /// Inserts a child immediately and manages it. A managed parent gains
    /// the new child id.
    pub fn persist_child(
        &mut self,
        name: &str,
        parent_id: Option<ParentId>,
    ) -> RepoResult<ChildId> {
        self.state = SessionState::Active;
        let store = SqliteRecordStore::new_unchecked(&self.tx);
        let id = store.insert_child(name, parent_id)?;
        let child = store.load_child(id)?;
        self.children.insert(id, Managed::new(child));

        if let Some(parent_id) = parent_id {
            self.attach_to_managed_parent(parent_id, id);
        }
        Ok(id)
    }

    /// Returns the managed child, loading it on first access.
    pub fn child(&mut self, id: ChildId) -> RepoResult<&Child> {
        self.child_mut(id).map(|child| &*child)
    }

    /// Returns the managed child for editing. Edits are written on flush.
    pub fn child_mut(&mut self, id: ChildId) -> RepoResult<&mut Child> {
        self.state = SessionState::Active;
        match self.children.entry(id) {
            Entry::Occupied(entry) => Ok(&mut entry.into_mut().current),
            Entry::Vacant(entry) => {
                let child = SqliteRecordStore::new_unchecked(&self.tx).load_child(id)?;
                Ok(&mut entry.insert(Managed::new(child)).current)
            }
        }
    }

    /// Returns the managed parent for editing, loading it on first access.
    pub fn parent_mut(&mut self, id: ParentId) -> RepoResult<&mut Parent> {
        self.state = SessionState::Active;
        match self.parents.entry(id) {
            Entry::Occupied(entry) => Ok(&mut entry.into_mut().current),
            Entry::Vacant(entry) => {
                let parent = SqliteRecordStore::new_unchecked(&self.tx).load_parent(id)?;
                Ok(&mut entry.insert(Managed::new(parent)).current)
            }
        }
    }

    /// Explicit load step: returns this session's copy of the parent.
    ///
    /// A managed copy wins over storage, including unflushed edits.
    pub fn load_parent(&mut self, id: ParentId) -> RepoResult<Parent> {
        self.parent_mut(id).map(|parent| parent.clone())
    }

    /// Flushes, then loads the parent and all its children from the
    /// transaction and re-baselines the managed copies to match.
    pub fn load_parent_with_children(&mut self, id: ParentId) -> RepoResult<ParentGraph> {
        self.flush()?;
        self.state = SessionState::Active;
        let graph = SqliteRecordStore::new_unchecked(&self.tx).load_parent_with_children(id)?;

        self.parents
            .insert(graph.parent.id, Managed::new(graph.parent.clone()));
        for child in &graph.children {
            self.children.insert(child.id, Managed::new(child.clone()));
        }
        Ok(graph)
    }

    /// Returns what this session knows about a parent, without any I/O.
    pub fn parent_ref(&self, id: ParentId) -> ParentRef {
        match self.parents.get(&id) {
            Some(managed) => ParentRef::Loaded {
                parent: managed.current.clone(),
            },
            None => ParentRef::Reference { id },
        }
    }

    /// Returns the reference held by a child, loading the child if needed but
    /// never its parent. `None` when the child has no parent.
    pub fn parent_ref_of(&mut self, child_id: ChildId) -> RepoResult<Option<ParentRef>> {
        let parent_id = self.child(child_id)?.parent_id;
        Ok(parent_id.map(|parent_id| self.parent_ref(parent_id)))
    }

    /// Writes every dirty managed record to the transaction.
    ///
    /// Returns the number of rows written. Records stay managed.
    pub fn flush(&mut self) -> RepoResult<usize> {
        let store = SqliteRecordStore::new_unchecked(&self.tx);
        let mut written = 0;

        for managed in self.parents.values_mut() {
            if managed.is_dirty() {
                managed.current.rename(managed.current.name.clone())?;
                store.update_parent(&managed.current)?;
                managed.mark_clean();
                written += 1;
            }
        }

        let mut moved = Vec::new();
        for managed in self.children.values_mut() {
            if managed.is_dirty() {
                managed.current.rename(managed.current.name.clone())?;
                store.update_child(&managed.current)?;
                if managed.baseline.parent_id != managed.current.parent_id {
                    moved.push((
                        managed.current.id,
                        managed.baseline.parent_id,
                        managed.current.parent_id,
                    ));
                }
                managed.mark_clean();
                written += 1;
            }
        }

        for (child_id, from, to) in moved {
            if let Some(from) = from {
                self.detach_from_managed_parent(from, child_id);
            }
            if let Some(to) = to {
                self.attach_to_managed_parent(to, child_id);
            }
        }

        self.state = SessionState::Flushed;
        debug!(
            "event=session_flush module=session status=ok session_id={} written={}",
            self.id, written
        );
        Ok(written)
    }

    /// Empties the identity map. Unflushed edits are discarded.
    pub fn clear(&mut self) {
        let evicted = self.managed_count();
        self.parents.clear();
        self.children.clear();
        self.state = SessionState::Cleared;
        debug!(
            "event=session_clear module=session status=ok session_id={} evicted={}",
            self.id, evicted
        );
    }

    /// Flushes pending edits and commits the transaction.
    pub fn commit(mut self) -> RepoResult<()> {
        self.flush()?;
        let Self {
            id, tx, started_at, ..
        } = self;
        tx.commit()?;
        log_session_end(id, SessionState::Committed, started_at);
        Ok(())
    }

    /// Discards pending edits and rolls the transaction back.
    pub fn rollback(self) -> RepoResult<()> {
        let Self {
            id, tx, started_at, ..
        } = self;
        tx.rollback()?;
        log_session_end(id, SessionState::RolledBack, started_at);
        Ok(())
    }

    fn attach_to_managed_parent(&mut self, parent_id: ParentId, child_id: ChildId) {
        if let Some(parent) = self.parents.get_mut(&parent_id) {
            parent.baseline.children.insert(child_id);
            parent.current.children.insert(child_id);
        }
    }

    fn detach_from_managed_parent(&mut self, parent_id: ParentId, child_id: ChildId) {
        if let Some(parent) = self.parents.get_mut(&parent_id) {
            parent.baseline.children.remove(&child_id);
            parent.current.children.remove(&child_id);
        }
    }
}

fn behavior_label(behavior: TransactionBehavior) -> &'static str {
    match behavior {
        TransactionBehavior::Deferred => "deferred",
        TransactionBehavior::Immediate => "immediate",
        TransactionBehavior::Exclusive => "exclusive",
        _ => "other",
    }
}

fn log_session_end(id: Uuid, state: SessionState, started_at: Instant) {
    info!(
        "event=session_end module=session status=ok session_id={} state={} duration_ms={}",
        id,
        state.as_str(),
        started_at.elapsed().as_millis()
    );
}
