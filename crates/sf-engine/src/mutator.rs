//! # OptimisticMutator
//!
//! The only writer of an interactable store besides a full refresh.
//!
//! Likes are optimistic: the toggle is applied locally before the remote
//! call and the whole pre-toggle snapshot is restored if the call fails.
//! Everything else is confirmed: the store changes only after the backend
//! accepted the mutation, and a resolution that lost the race against a
//! newer mutation on the same key is dropped.

use std::sync::Arc;

use chrono::Utc;
use sf_core::{
    AppError, Comments, EntityKind, Interactable, InteractableApi, Like, NewComment, Result, Session,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::inflight::{InFlight, Ticket};
use crate::store::{EntityStore, Patch};

/// Result of a confirmed mutation whose remote call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The local store now reflects the mutation.
    Committed,
    /// A newer mutation on the same key already committed; nothing was written.
    Discarded,
}

pub struct OptimisticMutator<T: Interactable> {
    store: Arc<EntityStore<T>>,
    api: Arc<dyn InteractableApi<T>>,
    inflight: InFlight,
    comment_adds: InFlight,
}

impl<T: Interactable> OptimisticMutator<T> {
    pub fn new(store: Arc<EntityStore<T>>, api: Arc<dyn InteractableApi<T>>) -> Self {
        Self {
            store,
            api,
            inflight: InFlight::new(),
            comment_adds: InFlight::new(),
        }
    }

    pub fn store(&self) -> &Arc<EntityStore<T>> {
        &self.store
    }

    /// Flip the session user's like on `parent_id`. Returns whether the user
    /// likes the parent afterwards.
    pub async fn toggle_like(&self, parent_id: Uuid, session: &Session) -> Result<bool> {
        let user_id = session.user_id;
        let now = Utc::now();

        // Read and flip under one store lock; the snapshot is the pre-toggle state.
        let snapshot = self.store.apply(
            parent_id,
            Patch::modify(move |item: &mut T| {
                if !item.likes_mut().remove(user_id) {
                    item.likes_mut().insert(Like::new(user_id, now));
                }
            }),
        )?;
        let was_liked = snapshot
            .get(parent_id)
            .is_some_and(|item| item.is_liked_by(user_id));

        debug!(kind = %T::KIND, %parent_id, was_liked, "issuing like toggle");
        let remote = if was_liked {
            self.api.remove_like(parent_id, user_id, &session.token).await
        } else {
            self.api.add_like(parent_id, user_id, &session.token).await
        };

        match remote {
            Ok(()) => Ok(!was_liked),
            Err(err) => {
                warn!(kind = %T::KIND, %parent_id, error = %err, "like toggle failed, rolling back");
                self.store.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Post a comment. The store only changes once the backend returns the
    /// parent with the new comment; that value replaces the local parent.
    ///
    /// Adds are ordered among themselves only, so an edit of the parent that
    /// commits meanwhile does not swallow the new comment.
    pub async fn add_comment(&self, parent_id: Uuid, content: &str, session: &Session) -> Result<MutationOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment cannot be empty".to_string()));
        }
        self.store.get(parent_id)?;

        let ticket = self.comment_adds.begin(parent_id);
        let comment = NewComment {
            author_id: session.user_id,
            content: content.to_string(),
        };
        let updated = self
            .api
            .add_comment(parent_id, comment, &session.token)
            .await
            .inspect_err(|err| warn!(kind = %T::KIND, %parent_id, error = %err, "add comment failed"))?;

        if !self.comment_adds.commit(&ticket) {
            debug!(kind = %T::KIND, %parent_id, "stale comment response dropped");
            return Ok(MutationOutcome::Discarded);
        }
        self.store.apply(parent_id, Patch::Replace(updated))?;
        Ok(MutationOutcome::Committed)
    }

    pub async fn update_comment(
        &self,
        parent_id: Uuid,
        comment_id: Uuid,
        content: &str,
        session: &Session,
    ) -> Result<MutationOutcome> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation("comment cannot be empty".to_string()));
        }

        let ticket = self.inflight.begin(comment_id);
        self.api
            .update_comment(parent_id, comment_id, &content, &session.token)
            .await
            .inspect_err(|err| warn!(kind = %T::KIND, %parent_id, %comment_id, error = %err, "update comment failed"))?;

        self.commit_comment(&ticket, parent_id, comment_id, move |comments| {
            comments.edit(comment_id, &content, Utc::now());
        })
    }

    pub async fn delete_comment(&self, parent_id: Uuid, comment_id: Uuid, session: &Session) -> Result<MutationOutcome> {
        let ticket = self.inflight.begin(comment_id);
        self.api
            .delete_comment(parent_id, comment_id, &session.token)
            .await
            .inspect_err(|err| warn!(kind = %T::KIND, %parent_id, %comment_id, error = %err, "delete comment failed"))?;

        self.commit_comment(&ticket, parent_id, comment_id, move |comments| {
            comments.remove(comment_id);
        })
    }

    /// Push an edited entity; the server's copy replaces the local one.
    pub async fn update_entity(&self, entity: T, session: &Session) -> Result<MutationOutcome> {
        let id = entity.id();
        let ticket = self.inflight.begin(id);
        let canonical = self
            .api
            .update(entity, &session.token)
            .await
            .inspect_err(|err| warn!(kind = %T::KIND, %id, error = %err, "update failed"))?;

        if !self.inflight.commit(&ticket) {
            debug!(kind = %T::KIND, %id, "stale update dropped");
            return Ok(MutationOutcome::Discarded);
        }
        self.store.apply(id, Patch::Replace(canonical))?;
        Ok(MutationOutcome::Committed)
    }

    pub async fn delete_entity(&self, id: Uuid, session: &Session) -> Result<MutationOutcome> {
        let ticket = self.inflight.begin(id);
        self.api
            .delete(id, &session.token)
            .await
            .inspect_err(|err| warn!(kind = %T::KIND, %id, error = %err, "delete failed"))?;

        if !self.inflight.commit(&ticket) {
            return Ok(MutationOutcome::Discarded);
        }
        match self.store.apply(id, Patch::Remove) {
            Ok(_) => Ok(MutationOutcome::Committed),
            // Already gone locally (e.g. a refresh landed first); the goal is met.
            Err(AppError::NotFound(..)) => Ok(MutationOutcome::Committed),
            Err(err) => Err(err),
        }
    }

    /// Apply a confirmed edit to one comment of `parent_id`, unless a newer
    /// mutation on the same comment already committed.
    fn commit_comment(
        &self,
        ticket: &Ticket<'_>,
        parent_id: Uuid,
        comment_id: Uuid,
        edit: impl FnOnce(&mut Comments) + Send + 'static,
    ) -> Result<MutationOutcome> {
        if !self.inflight.commit(ticket) {
            debug!(kind = %T::KIND, %parent_id, %comment_id, "stale comment resolution dropped");
            return Ok(MutationOutcome::Discarded);
        }
        if self.store.get(parent_id)?.comments().get(comment_id).is_none() {
            return Err(AppError::not_found(EntityKind::Comment, comment_id));
        }
        self.store
            .apply(parent_id, Patch::modify(move |item: &mut T| edit(item.comments_mut())))?;
        Ok(MutationOutcome::Committed)
    }
}
