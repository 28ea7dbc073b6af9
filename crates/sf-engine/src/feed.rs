//! # Feed
//!
//! View controller for one list of interactables (the following feed, a
//! profile's plans, ...). It owns the store, the mutator and the current
//! query, and hands the renderer a composed [`FeedState`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sf_core::{AppError, FetchScope, Interactable, InteractableApi, Result, Session, SortMode};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::composer::{compose, FeedQuery};
use crate::inflight::InFlight;
use crate::mutator::OptimisticMutator;
use crate::store::EntityStore;

/// Everything the renderer needs to draw a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<AppError>,
}

pub struct Feed<T: Interactable> {
    api: Arc<dyn InteractableApi<T>>,
    store: Arc<EntityStore<T>>,
    mutator: OptimisticMutator<T>,
    query: RwLock<FeedQuery>,
    loading: AtomicBool,
    error: RwLock<Option<AppError>>,
    refreshes: InFlight,
}

impl<T: Interactable> Feed<T> {
    pub fn new(api: Arc<dyn InteractableApi<T>>) -> Self {
        Self::with_query(api, FeedQuery::default())
    }

    /// The main feed: only items authored by users `session` follows.
    pub fn following(api: Arc<dyn InteractableApi<T>>, session: &Session) -> Self {
        Self::with_query(api, FeedQuery::following(session.following.iter().copied()))
    }

    pub fn with_query(api: Arc<dyn InteractableApi<T>>, query: FeedQuery) -> Self {
        let store = Arc::new(EntityStore::new());
        Self {
            mutator: OptimisticMutator::new(Arc::clone(&store), Arc::clone(&api)),
            api,
            store,
            query: RwLock::new(query),
            loading: AtomicBool::new(false),
            error: RwLock::new(None),
            refreshes: InFlight::new(),
        }
    }

    /// Fetch the list and replace the store with it. On failure the previous
    /// snapshot stays and the error is kept for [`state`](Self::state).
    /// Returns the number of fetched items.
    pub async fn refresh(&self, session: &Session, scope: FetchScope) -> Result<usize> {
        let ticket = self.refreshes.begin(Uuid::nil());
        self.loading.store(true, Ordering::Release);
        debug!(kind = %T::KIND, ?scope, "refreshing feed");

        let fetched = self.api.fetch_all(&scope, &session.token).await;

        let latest = self.refreshes.is_latest(&ticket);
        if latest {
            self.loading.store(false, Ordering::Release);
        }
        match fetched {
            Ok(items) => {
                let count = items.len();
                if latest && self.refreshes.commit(&ticket) {
                    self.store.replace_all(items);
                    *self.error.write() = None;
                    info!(kind = %T::KIND, count, "feed refreshed");
                } else {
                    debug!(kind = %T::KIND, "stale refresh dropped");
                }
                Ok(count)
            }
            Err(err) => {
                warn!(kind = %T::KIND, error = %err, "feed refresh failed, keeping previous items");
                if latest {
                    *self.error.write() = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// The composed list for the current store snapshot and query.
    pub fn visible(&self) -> Vec<T> {
        compose(self.store.snapshot().items(), &self.query.read())
    }

    pub fn state(&self) -> FeedState<T> {
        FeedState {
            items: self.visible(),
            loading: self.is_loading(),
            error: self.error.read().clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn query(&self) -> FeedQuery {
        self.query.read().clone()
    }

    pub fn set_sort(&self, sort: SortMode) {
        self.query.write().sort = sort;
    }

    pub fn set_search(&self, term: impl Into<String>) {
        self.query.write().search = term.into();
    }

    pub fn set_category(&self, category: impl Into<String>) {
        self.query.write().category = category.into();
    }

    /// Like/comment/edit/delete entry points.
    pub fn mutator(&self) -> &OptimisticMutator<T> {
        &self.mutator
    }

    pub fn store(&self) -> &Arc<EntityStore<T>> {
        &self.store
    }

    /// Fires after every store write; re-read [`visible`](Self::visible) on change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sf_core::{AuthToken, Comments, Likes, MockInteractableApi, Post};

    fn post(author: Uuid, minutes_ago: i64) -> Post {
        Post {
            id: Uuid::now_v7(),
            author_id: author,
            user_name: String::new(),
            content: format!("post from {minutes_ago} minutes ago"),
            media_url: None,
            category: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            updated_at: None,
            likes: Likes::default(),
            comments: Comments::default(),
        }
    }

    #[tokio::test]
    async fn following_feed_shows_followed_authors_newest_first() {
        let friend = Uuid::now_v7();
        let stranger = Uuid::now_v7();
        let me = Session::new(Uuid::now_v7(), "me", AuthToken::new("t")).following([friend]);
        let items = vec![post(friend, 30), post(stranger, 5), post(friend, 1)];
        let expected = vec![items[2].id, items[0].id];

        let mut api = MockInteractableApi::<Post>::new();
        api.expect_fetch_all().returning(move |_, _| Ok(items.clone()));
        let feed = Feed::following(Arc::new(api), &me);

        assert_eq!(feed.refresh(&me, FetchScope::All).await.unwrap(), 3);
        let state = feed.state();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.items.iter().map(|p| p.id).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_items() {
        let me = Session::new(Uuid::now_v7(), "me", AuthToken::new("t"));
        let first = vec![post(me.user_id, 3)];
        let mut calls = 0;

        let mut api = MockInteractableApi::<Post>::new();
        api.expect_fetch_all().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(first.clone())
            } else {
                Err(AppError::Network("timeout".into()))
            }
        });
        let feed = Feed::new(Arc::new(api));

        feed.refresh(&me, FetchScope::All).await.unwrap();
        assert!(feed.refresh(&me, FetchScope::All).await.is_err());

        let state = feed.state();
        assert_eq!(state.items.len(), 1);
        assert!(!state.loading);
        assert_eq!(state.error, Some(AppError::Network("timeout".into())));
    }

    #[tokio::test]
    async fn query_changes_recompose_without_refetch() {
        let me = Session::new(Uuid::now_v7(), "me", AuthToken::new("t"));
        let mut rust = post(me.user_id, 2);
        rust.content = "Rust traits".into();
        let other = post(me.user_id, 1);

        let mut api = MockInteractableApi::<Post>::new();
        api.expect_fetch_all()
            .times(1)
            .returning(move |_, _| Ok(vec![rust.clone(), other.clone()]));
        let feed = Feed::new(Arc::new(api));
        feed.refresh(&me, FetchScope::All).await.unwrap();

        feed.set_search("rust");
        assert_eq!(feed.visible().len(), 1);
        feed.set_search("");
        feed.set_sort(SortMode::Trending);
        assert_eq!(feed.visible().len(), 2);
        assert_eq!(feed.query().sort, SortMode::Trending);
    }
}
