//! # sf-api-memory
//!
//! In-memory implementation of `InteractableApi` and `CommunityApi`.
//! Behaves like the real backend for the parts the client relies on
//! (server-numbered comments, auth and validation rejections, redacted
//! member lists of private communities) and can be scripted to fail or to
//! park individual calls.

pub mod script;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sf_core::{
    AppError, AuthToken, Comment, Community, CommunityApi, CommunityScope, EntityKind, FetchScope,
    Interactable, InteractableApi, Like, NewComment, Result,
};
use uuid::Uuid;

pub use script::{Operation, Release, Script};

fn authorize(token: &AuthToken) -> Result<()> {
    if token.is_empty() {
        return Err(AppError::Auth("missing bearer token".to_string()));
    }
    Ok(())
}

pub struct MemoryInteractableApi<T> {
    items: RwLock<Vec<T>>,
    script: Script,
}

impl<T: Interactable> Default for MemoryInteractableApi<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: Interactable> MemoryInteractableApi<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            script: Script::default(),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Server-side copy of the entity, for assertions.
    pub fn item(&self, id: Uuid) -> Option<T> {
        self.items.read().iter().find(|item| item.id() == id).cloned()
    }

    pub fn insert(&self, item: T) {
        self.items.write().push(item);
    }

    fn with_item<R>(&self, id: Uuid, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut items = self.items.write();
        let item = items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| AppError::not_found(T::KIND, id))?;
        Ok(f(item))
    }
}

#[async_trait]
impl<T: Interactable> InteractableApi<T> for MemoryInteractableApi<T> {
    async fn fetch_all(&self, scope: &FetchScope, token: &AuthToken) -> Result<Vec<T>> {
        self.script.enter(Operation::FetchAll).await?;
        authorize(token)?;
        let items = self.items.read();
        Ok(match scope {
            FetchScope::All => items.clone(),
            FetchScope::ByAuthor(author) => items
                .iter()
                .filter(|item| item.author_id() == Some(*author))
                .cloned()
                .collect(),
        })
    }

    async fn add_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::AddLike).await?;
        authorize(token)?;
        self.with_item(parent_id, |item| {
            item.likes_mut().insert(Like::new(user_id, Utc::now()));
        })
    }

    async fn remove_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::RemoveLike).await?;
        authorize(token)?;
        self.with_item(parent_id, |item| {
            item.likes_mut().remove(user_id);
        })
    }

    async fn add_comment(&self, parent_id: Uuid, comment: NewComment, token: &AuthToken) -> Result<T> {
        self.script.enter(Operation::AddComment).await?;
        authorize(token)?;
        if comment.content.trim().is_empty() {
            return Err(AppError::Validation("comment content is required".to_string()));
        }
        self.with_item(parent_id, |item| {
            item.comments_mut().push(Comment {
                id: Uuid::now_v7(),
                author_id: comment.author_id,
                content: comment.content,
                created_at: Utc::now(),
                updated_at: None,
            });
            item.clone()
        })
    }

    async fn update_comment(
        &self,
        parent_id: Uuid,
        comment_id: Uuid,
        content: &str,
        token: &AuthToken,
    ) -> Result<()> {
        self.script.enter(Operation::UpdateComment).await?;
        authorize(token)?;
        if content.trim().is_empty() {
            return Err(AppError::Validation("comment content is required".to_string()));
        }
        let edited = self.with_item(parent_id, |item| {
            item.comments_mut().edit(comment_id, content, Utc::now())
        })?;
        if !edited {
            return Err(AppError::not_found(EntityKind::Comment, comment_id));
        }
        Ok(())
    }

    async fn delete_comment(&self, parent_id: Uuid, comment_id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::DeleteComment).await?;
        authorize(token)?;
        self.with_item(parent_id, |item| item.comments_mut().remove(comment_id))?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(EntityKind::Comment, comment_id))
    }

    async fn update(&self, entity: T, token: &AuthToken) -> Result<T> {
        self.script.enter(Operation::Update).await?;
        authorize(token)?;
        // Likes and comments are owned by their own endpoints.
        self.with_item(entity.id(), move |stored| {
            let likes = stored.likes().clone();
            let comments = stored.comments().clone();
            *stored = entity;
            *stored.likes_mut() = likes;
            *stored.comments_mut() = comments;
            stored.clone()
        })
    }

    async fn delete(&self, id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::Delete).await?;
        authorize(token)?;
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() == before {
            return Err(AppError::not_found(T::KIND, id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCommunityApi {
    communities: RwLock<Vec<Community>>,
    script: Script,
}

impl MemoryCommunityApi {
    pub fn new(communities: Vec<Community>) -> Self {
        Self {
            communities: RwLock::new(communities),
            script: Script::default(),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Server-side copy, member list unredacted.
    pub fn community(&self, id: Uuid) -> Option<Community> {
        self.communities.read().iter().find(|c| c.id == id).cloned()
    }

    fn with_community<R>(&self, id: Uuid, f: impl FnOnce(&mut Community) -> R) -> Result<R> {
        let mut communities = self.communities.write();
        let community = communities
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found(EntityKind::Community, id))?;
        Ok(f(community))
    }
}

#[async_trait]
impl CommunityApi for MemoryCommunityApi {
    async fn fetch(&self, scope: CommunityScope, user_id: Uuid, token: &AuthToken) -> Result<Vec<Community>> {
        self.script.enter(Operation::FetchCommunities).await?;
        authorize(token)?;
        let communities = self.communities.read();
        Ok(communities
            .iter()
            .filter(|c| match scope {
                CommunityScope::All => true,
                CommunityScope::Mine => c.has_member(user_id),
                CommunityScope::Public => !c.is_private,
            })
            .map(|c| {
                let mut visible = c.clone();
                if visible.is_private && !visible.has_member(user_id) {
                    visible.member_ids.clear();
                }
                visible
            })
            .collect())
    }

    async fn join(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::Join).await?;
        authorize(token)?;
        self.with_community(community_id, |c| {
            if !c.has_member(user_id) {
                c.member_ids.push(user_id);
            }
        })
    }

    async fn leave(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        self.script.enter(Operation::Leave).await?;
        authorize(token)?;
        self.with_community(community_id, |c| c.member_ids.retain(|id| *id != user_id))
    }

    async fn is_member(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<bool> {
        self.script.enter(Operation::IsMember).await?;
        authorize(token)?;
        self.with_community(community_id, |c| c.has_member(user_id))
    }
}
