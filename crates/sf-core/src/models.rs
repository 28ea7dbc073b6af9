//! # Domain Models
//!
//! These structs represent the social entities the feed client holds locally.
//! Wire names follow the backend's camelCase JSON; the author of every entity
//! arrives as `userId`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::traits::{Entity, FeedItem, Interactable};

/// Discriminates the entity families for error messages and REST paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    LearningPlan,
    ProgressEntry,
    Comment,
    Community,
}

impl EntityKind {
    /// Collection segment under `/api/`.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::LearningPlan => "learning-plans",
            Self::ProgressEntry => "learning-progress",
            Self::Comment => "comments",
            Self::Community => "communities",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Post => "post",
            Self::LearningPlan => "learning plan",
            Self::ProgressEntry => "progress entry",
            Self::Comment => "comment",
            Self::Community => "community",
        };
        f.write_str(label)
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Opaque bearer credential. Cloning shares the secret, never copies it.
#[derive(Debug, Clone)]
pub struct AuthToken(Arc<SecretString>);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Arc::new(SecretString::from(raw.into())))
    }

    pub fn from_secret(secret: SecretString) -> Self {
        Self(Arc::new(secret))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

/// The logged-in user, threaded explicitly into every engine call.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub display_name: String,
    pub token: AuthToken,
    /// Ids of users this session follows (`followingUsers` on the wire)
    pub following: Vec<Uuid>,
}

impl Session {
    pub fn new(user_id: Uuid, display_name: impl Into<String>, token: AuthToken) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            token,
            following: Vec::new(),
        }
    }

    pub fn following(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.following = ids.into_iter().collect();
        self
    }

    pub fn following_set(&self) -> HashSet<Uuid> {
        self.following.iter().copied().collect()
    }
}

// ─── Likes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self { user_id, created_at }
    }
}

/// The likes on one parent. Holds at most one `Like` per user; duplicates
/// coming off the wire are collapsed, first one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Like>", into = "Vec<Like>")]
pub struct Likes(Vec<Like>);

impl Likes {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.0.iter().any(|like| like.user_id == user_id)
    }

    /// Returns `false` (and changes nothing) if the user already liked.
    pub fn insert(&mut self, like: Like) -> bool {
        if self.contains(like.user_id) {
            return false;
        }
        self.0.push(like);
        true
    }

    pub fn remove(&mut self, user_id: Uuid) -> bool {
        let before = self.0.len();
        self.0.retain(|like| like.user_id != user_id);
        self.0.len() != before
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Like> {
        self.0.iter()
    }

    pub fn user_ids(&self) -> Vec<Uuid> {
        self.0.iter().map(|like| like.user_id).collect()
    }
}

impl From<Vec<Like>> for Likes {
    fn from(raw: Vec<Like>) -> Self {
        let mut likes = Likes::default();
        for like in raw {
            likes.insert(like);
        }
        likes
    }
}

impl From<Likes> for Vec<Like> {
    fn from(likes: Likes) -> Self {
        likes.0
    }
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload of a comment creation request; the server assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(rename = "userId")]
    pub author_id: Uuid,
    pub content: String,
}

/// Comments in insertion (chronological) order. Edits happen in place and
/// deletes never reorder the survivors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comments(Vec<Comment>);

impl Comments {
    pub fn get(&self, id: Uuid) -> Option<&Comment> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn push(&mut self, comment: Comment) {
        self.0.push(comment);
    }

    pub fn edit(&mut self, id: Uuid, content: &str, at: DateTime<Utc>) -> bool {
        match self.0.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.content = content.to_string();
                comment.updated_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Comment> {
        let index = self.0.iter().position(|c| c.id == id)?;
        Some(self.0.remove(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.0.iter()
    }
}

impl From<Vec<Comment>> for Comments {
    fn from(comments: Vec<Comment>) -> Self {
        Self(comments)
    }
}

// ─── Interactables ───────────────────────────────────────────────────────────

/// A skill-sharing post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub author_id: Uuid,
    #[serde(default)]
    pub user_name: String,
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub likes: Likes,
    #[serde(default)]
    pub comments: Comments,
}

/// A learning plan. `topics` and `resources` travel as comma-separated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPlan {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub author_id: Uuid,
    #[serde(default)]
    pub user_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: String,
    #[serde(default)]
    pub resources: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub likes: Likes,
    #[serde(default)]
    pub comments: Comments,
}

impl LearningPlan {
    pub fn topic_tags(&self) -> Vec<&str> {
        split_list(&self.topics)
    }

    pub fn resource_list(&self) -> Vec<&str> {
        split_list(&self.resources)
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// A progress update, optionally attached to one of the author's plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub author_id: Uuid,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub learning_plan_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub likes: Likes,
    #[serde(default)]
    pub comments: Comments,
}

macro_rules! interactable {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }
        }

        impl Interactable for $ty {
            fn likes(&self) -> &Likes {
                &self.likes
            }

            fn likes_mut(&mut self) -> &mut Likes {
                &mut self.likes
            }

            fn comments(&self) -> &Comments {
                &self.comments
            }

            fn comments_mut(&mut self) -> &mut Comments {
                &mut self.comments
            }

            fn updated_at(&self) -> Option<DateTime<Utc>> {
                self.updated_at
            }
        }
    };
}

interactable!(Post, EntityKind::Post);
interactable!(LearningPlan, EntityKind::LearningPlan);
interactable!(ProgressEntry, EntityKind::ProgressEntry);

impl FeedItem for Post {
    fn author_id(&self) -> Option<Uuid> {
        Some(self.author_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn like_count(&self) -> usize {
        self.likes.len()
    }

    fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.content.as_str()]
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

impl FeedItem for LearningPlan {
    fn author_id(&self) -> Option<Uuid> {
        Some(self.author_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn like_count(&self) -> usize {
        self.likes.len()
    }

    fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str(), self.topics.as_str()]
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

impl FeedItem for ProgressEntry {
    fn author_id(&self) -> Option<Uuid> {
        Some(self.author_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn like_count(&self) -> usize {
        self.likes.len()
    }

    fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.content.as_str()]
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

// ─── Communities ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_private: bool,
    /// May be redacted by the server for private communities the caller is not in
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Community {
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Whether `member_ids` can answer "is `user_id` a member" on its own.
    ///
    /// Public communities always ship their full member list. A private one
    /// only proves membership positively; absence may just be redaction.
    pub fn membership_is_authoritative(&self, user_id: Uuid) -> bool {
        !self.is_private || self.has_member(user_id)
    }
}

impl Entity for Community {
    const KIND: EntityKind = EntityKind::Community;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl FeedItem for Community {
    fn author_id(&self) -> Option<Uuid> {
        None
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.description.as_str()]
    }

    fn category(&self) -> Option<&str> {
        Some(self.category.as_str())
    }
}

// ─── Query parameters ────────────────────────────────────────────────────────

/// Which slice of an interactable collection a view fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchScope {
    #[default]
    All,
    ByAuthor(Uuid),
}

/// Community listing tabs; resolved by the fetch, not by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityScope {
    #[default]
    All,
    Mine,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Newest `createdAt` first
    #[default]
    Latest,
    /// Most likes first
    Trending,
    /// Most comments first
    Popular,
}

impl FromStr for SortMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "trending" => Ok(Self::Trending),
            "popular" => Ok(Self::Popular),
            other => Err(AppError::Validation(format!("unknown sort mode `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn like(user: Uuid) -> Like {
        Like::new(user, Utc::now())
    }

    #[test]
    fn likes_stay_unique_per_user() {
        let user = Uuid::now_v7();
        let mut likes = Likes::default();
        assert!(likes.insert(like(user)));
        assert!(!likes.insert(like(user)));
        assert_eq!(likes.len(), 1);
        assert!(likes.remove(user));
        assert!(!likes.remove(user));
        assert!(likes.is_empty());
    }

    #[test]
    fn duplicate_likes_from_the_wire_collapse() {
        let user = Uuid::now_v7();
        let other = Uuid::now_v7();
        let raw = json!([
            { "userId": user, "createdAt": "2024-05-01T10:00:00Z" },
            { "userId": other, "createdAt": "2024-05-01T10:01:00Z" },
            { "userId": user, "createdAt": "2024-05-01T10:02:00Z" },
        ]);
        let likes: Likes = serde_json::from_value(raw).unwrap();
        assert_eq!(likes.user_ids(), vec![user, other]);
        let first = likes.iter().next().unwrap();
        assert_eq!(first.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn post_decodes_camel_case_and_missing_collections() {
        let id = Uuid::now_v7();
        let author = Uuid::now_v7();
        let raw = json!({
            "id": id,
            "userId": author,
            "content": "Ownership finally clicked",
            "createdAt": "2024-05-01T10:00:00Z",
        });
        let post: Post = serde_json::from_value(raw).unwrap();
        assert_eq!(post.author_id, author);
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
        assert!(!post.was_edited());
    }

    #[test]
    fn comment_edits_keep_order() {
        let now = Utc::now();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
        let mut comments = Comments::from(
            ids.iter()
                .map(|id| Comment {
                    id: *id,
                    author_id: Uuid::nil(),
                    content: "first".into(),
                    created_at: now,
                    updated_at: None,
                })
                .collect::<Vec<_>>(),
        );

        assert!(comments.edit(ids[1], "edited", now));
        assert!(comments.remove(ids[0]).is_some());
        assert!(!comments.edit(ids[0], "gone", now));

        let remaining: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![ids[1], ids[2]]);
        assert_eq!(comments.get(ids[1]).unwrap().content, "edited");
        assert_eq!(comments.get(ids[1]).unwrap().updated_at, Some(now));
    }

    #[test]
    fn plan_topics_and_resources_split_on_commas() {
        let plan = LearningPlan {
            id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            user_name: "ada".into(),
            title: "Async Rust".into(),
            description: String::new(),
            topics: "futures, pinning,, executors ".into(),
            resources: "https://rust-lang.github.io/async-book".into(),
            category: None,
            created_at: Utc::now(),
            updated_at: None,
            likes: Likes::default(),
            comments: Comments::default(),
        };
        assert_eq!(plan.topic_tags(), vec!["futures", "pinning", "executors"]);
        assert_eq!(plan.resource_list().len(), 1);
    }

    #[test]
    fn private_membership_is_only_authoritative_when_listed() {
        let me = Uuid::now_v7();
        let mut community = Community {
            id: Uuid::now_v7(),
            name: "Rustaceans".into(),
            description: String::new(),
            category: "Programming".into(),
            is_private: false,
            member_ids: vec![],
            created_at: Utc::now(),
        };
        assert!(community.membership_is_authoritative(me));

        community.is_private = true;
        assert!(!community.membership_is_authoritative(me));

        community.member_ids.push(me);
        assert!(community.membership_is_authoritative(me));
    }

    #[test]
    fn sort_mode_parses_case_insensitively() {
        assert_eq!("Trending".parse::<SortMode>().unwrap(), SortMode::Trending);
        assert!("oldest".parse::<SortMode>().is_err());
    }

    #[test]
    fn blank_token_is_empty() {
        assert!(AuthToken::new("  ").is_empty());
        assert_eq!(AuthToken::new("abc").expose(), "abc");
    }
}
