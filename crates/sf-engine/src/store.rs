//! # EntityStore
//!
//! The canonical local snapshot behind one view. The held collection is an
//! immutable `Arc<Vec<T>>`; every write swaps in a new vector, so a snapshot
//! handed out earlier is never affected and can be restored wholesale.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sf_core::{AppError, Entity, Result};
use tokio::sync::watch;
use uuid::Uuid;

/// A single-entity transformation applied through [`EntityStore::apply`].
pub enum Patch<T> {
    /// Mutate the entity in place.
    Modify(Box<dyn FnOnce(&mut T) + Send>),
    /// Swap the entity for a server-returned value.
    Replace(T),
    /// Drop the entity from the collection.
    Remove,
}

impl<T> Patch<T> {
    pub fn modify(f: impl FnOnce(&mut T) + Send + 'static) -> Self {
        Self::Modify(Box::new(f))
    }
}

impl<T> fmt::Debug for Patch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modify(_) => f.write_str("Patch::Modify"),
            Self::Replace(_) => f.write_str("Patch::Replace"),
            Self::Remove => f.write_str("Patch::Remove"),
        }
    }
}

/// An immutable view of the whole collection at one point in time.
#[derive(Debug)]
pub struct Snapshot<T>(Arc<Vec<T>>);

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Entity> Snapshot<T> {
    pub fn items(&self) -> &[T] {
        &self.0
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.0.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct Inner<T> {
    items: Arc<Vec<T>>,
    version: u64,
}

/// Holds the entities fetched for one view. Only `replace_all`, `apply` and
/// `restore` write; every write bumps the version published on `subscribe`.
pub struct EntityStore<T> {
    inner: RwLock<Inner<T>>,
    changes: watch::Sender<u64>,
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner {
                items: Arc::new(Vec::new()),
                version: 0,
            }),
            changes,
        }
    }

    pub fn with_items(items: Vec<T>) -> Self {
        let store = Self::new();
        store.replace_all(items);
        store
    }

    /// Atomically replace the tracked collection, e.g. after a full refresh.
    pub fn replace_all(&self, items: Vec<T>) {
        let mut inner = self.inner.write();
        inner.items = Arc::new(items);
        self.bump(&mut inner);
    }

    /// Apply `patch` to the entity with `id` and return the collection as it
    /// was before the patch. Fails with `NotFound`, leaving the store as is,
    /// when no such entity is held.
    pub fn apply(&self, id: Uuid, patch: Patch<T>) -> Result<Snapshot<T>> {
        let mut inner = self.inner.write();
        let index = inner
            .items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| AppError::not_found(T::KIND, id))?;

        let previous = Arc::clone(&inner.items);
        let mut next = (*previous).clone();
        match patch {
            Patch::Modify(f) => f(&mut next[index]),
            Patch::Replace(entity) => next[index] = entity,
            Patch::Remove => {
                next.remove(index);
            }
        }
        inner.items = Arc::new(next);
        self.bump(&mut inner);
        Ok(Snapshot(previous))
    }

    /// Reinstate a snapshot previously returned by [`apply`](Self::apply).
    pub fn restore(&self, snapshot: Snapshot<T>) {
        let mut inner = self.inner.write();
        inner.items = snapshot.0;
        self.bump(&mut inner);
    }

    pub fn get(&self, id: Uuid) -> Result<T> {
        self.inner
            .read()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
            .ok_or_else(|| AppError::not_found(T::KIND, id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.read().items.iter().any(|item| item.id() == id)
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot(Arc::clone(&self.inner.read().items))
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Change notifications; the value is the store version after the write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn bump(&self, inner: &mut Inner<T>) {
        inner.version += 1;
        self.changes.send_replace(inner.version);
    }
}
