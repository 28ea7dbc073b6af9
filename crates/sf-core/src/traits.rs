//! # Core Traits (Ports)
//!
//! Capability traits shared by the entity records, and the remote contracts
//! any backend plugin must implement to be driven by the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AuthToken, Comments, Community, CommunityScope, EntityKind, FetchScope, Likes, NewComment,
};

/// Anything the `EntityStore` can hold.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
}

/// What the feed composer needs to filter and sort an item.
pub trait FeedItem: Entity {
    /// `None` for items without an author (communities).
    fn author_id(&self) -> Option<Uuid>;
    fn created_at(&self) -> DateTime<Utc>;

    fn like_count(&self) -> usize {
        0
    }

    fn comment_count(&self) -> usize {
        0
    }

    /// Text the search box matches against (name, description, content...).
    fn search_fields(&self) -> Vec<&str>;

    fn category(&self) -> Option<&str> {
        None
    }
}

/// An entity carrying a likes set and a comment thread: posts, learning
/// plans and progress entries.
pub trait Interactable: FeedItem {
    fn likes(&self) -> &Likes;
    fn likes_mut(&mut self) -> &mut Likes;
    fn comments(&self) -> &Comments;
    fn comments_mut(&mut self) -> &mut Comments;
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    fn is_liked_by(&self, user_id: Uuid) -> bool {
        self.likes().contains(user_id)
    }

    /// Drives the "(updated)" marker next to the timestamp.
    fn was_edited(&self) -> bool {
        self.updated_at()
            .is_some_and(|updated| updated != self.created_at())
    }
}

/// Remote contract for one interactable family.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait InteractableApi<T: Interactable>: Send + Sync {
    async fn fetch_all(&self, scope: &FetchScope, token: &AuthToken) -> Result<Vec<T>>;

    async fn add_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()>;
    async fn remove_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()>;

    /// Returns the full parent with the server-numbered comment appended.
    async fn add_comment(&self, parent_id: Uuid, comment: NewComment, token: &AuthToken) -> Result<T>;
    async fn update_comment(
        &self,
        parent_id: Uuid,
        comment_id: Uuid,
        content: &str,
        token: &AuthToken,
    ) -> Result<()>;
    async fn delete_comment(&self, parent_id: Uuid, comment_id: Uuid, token: &AuthToken) -> Result<()>;

    /// Returns the canonical entity after the edit.
    async fn update(&self, entity: T, token: &AuthToken) -> Result<T>;
    async fn delete(&self, id: Uuid, token: &AuthToken) -> Result<()>;
}

/// Remote contract for community listings and membership.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommunityApi: Send + Sync {
    async fn fetch(&self, scope: CommunityScope, user_id: Uuid, token: &AuthToken) -> Result<Vec<Community>>;
    async fn join(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()>;
    async fn leave(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()>;
    async fn is_member(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<bool>;
}
