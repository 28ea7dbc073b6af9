//! # FeedComposer
//!
//! Pure derivation of the visible list from a store snapshot plus the
//! view's query. Nothing here writes back into a store.

use std::cmp::Reverse;
use std::collections::HashSet;

use sf_core::{FeedItem, ProgressEntry, SortMode};
use uuid::Uuid;

/// Filter and sort parameters of one view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    /// When set, only items authored by these users are visible.
    pub following: Option<HashSet<Uuid>>,
    pub search: String,
    pub category: String,
    pub sort: SortMode,
}

impl FeedQuery {
    pub fn following(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            following: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

/// Filter `items` by author, text and category, keeping input order.
pub fn filter<T: FeedItem>(items: &[T], query: &FeedQuery) -> Vec<T> {
    let needle = query.search.to_lowercase();

    items
        .iter()
        .filter(|item| match &query.following {
            Some(following) => item.author_id().is_some_and(|a| following.contains(&a)),
            None => true,
        })
        .filter(|item| {
            needle.is_empty()
                || item
                    .search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .filter(|item| query.category.is_empty() || item.category() == Some(query.category.as_str()))
        .cloned()
        .collect()
}

/// [`filter`], then sort by `query.sort`.
///
/// The sort is stable: items with equal keys keep their input order.
pub fn compose<T: FeedItem>(items: &[T], query: &FeedQuery) -> Vec<T> {
    let mut visible = filter(items, query);
    match query.sort {
        SortMode::Latest => visible.sort_by_key(|item| Reverse(item.created_at())),
        SortMode::Trending => visible.sort_by_key(|item| Reverse(item.like_count())),
        SortMode::Popular => visible.sort_by_key(|item| Reverse(item.comment_count())),
    }
    visible
}

/// Progress entries attached to `plan_id`, in input order.
pub fn related_progress(entries: &[ProgressEntry], plan_id: Uuid) -> Vec<ProgressEntry> {
    entries
        .iter()
        .filter(|entry| entry.learning_plan_id == Some(plan_id))
        .cloned()
        .collect()
}
