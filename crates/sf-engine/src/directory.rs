//! # CommunityDirectory
//!
//! View controller for the communities page: the scoped listing, the
//! search/category filters, and one [`MembershipCard`] per rendered item.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sf_core::{AppError, Community, CommunityApi, CommunityScope, Result, Session};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::composer::{filter, FeedQuery};
use crate::inflight::InFlight;
use crate::mutator::MutationOutcome;
use crate::probe::{MembershipCard, MembershipProbe};
use crate::store::{EntityStore, Patch};

pub struct CommunityDirectory {
    api: Arc<dyn CommunityApi>,
    store: Arc<EntityStore<Community>>,
    probe: MembershipProbe,
    scope: RwLock<CommunityScope>,
    query: RwLock<FeedQuery>,
    cards: Mutex<HashMap<Uuid, Arc<MembershipCard>>>,
    loading: AtomicBool,
    error: RwLock<Option<AppError>>,
    refreshes: InFlight,
}

impl CommunityDirectory {
    pub fn new(api: Arc<dyn CommunityApi>) -> Self {
        Self {
            probe: MembershipProbe::new(Arc::clone(&api)),
            api,
            store: Arc::new(EntityStore::new()),
            scope: RwLock::new(CommunityScope::All),
            query: RwLock::new(FeedQuery::default()),
            cards: Mutex::new(HashMap::new()),
            loading: AtomicBool::new(false),
            error: RwLock::new(None),
            refreshes: InFlight::new(),
        }
    }

    pub fn scope(&self) -> CommunityScope {
        *self.scope.read()
    }

    /// Switch tabs; the caller follows up with [`refresh`](Self::refresh).
    pub fn set_scope(&self, scope: CommunityScope) {
        *self.scope.write() = scope;
    }

    pub fn set_search(&self, term: impl Into<String>) {
        self.query.write().search = term.into();
    }

    pub fn set_category(&self, category: impl Into<String>) {
        self.query.write().category = category.into();
    }

    /// Fetch the current scope. A fetch that resolves after a newer one
    /// (e.g. from a tab switched meanwhile) leaves the store alone.
    pub async fn refresh(&self, session: &Session) -> Result<usize> {
        let scope = self.scope();
        let ticket = self.refreshes.begin(Uuid::nil());
        self.loading.store(true, Ordering::Release);
        let fetched = self.api.fetch(scope, session.user_id, &session.token).await;

        let latest = self.refreshes.is_latest(&ticket);
        if latest {
            self.loading.store(false, Ordering::Release);
        }
        match fetched {
            Ok(communities) => {
                let count = communities.len();
                if latest && self.refreshes.commit(&ticket) {
                    self.store.replace_all(communities);
                    *self.error.write() = None;
                    debug!(?scope, count, "communities refreshed");
                } else {
                    debug!(?scope, "stale community listing dropped");
                }
                Ok(count)
            }
            Err(err) => {
                warn!(?scope, error = %err, "community refresh failed");
                if latest {
                    *self.error.write() = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// Listing after search and category filters, in fetch order.
    pub fn visible(&self) -> Vec<Community> {
        filter(self.store.snapshot().items(), &self.query.read())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<AppError> {
        self.error.read().clone()
    }

    pub fn store(&self) -> &Arc<EntityStore<Community>> {
        &self.store
    }

    /// Mount (or re-mount) the card for `community_id` and resolve its flag.
    pub async fn mount_card(&self, community_id: Uuid, session: &Session) -> Result<Arc<MembershipCard>> {
        let community = self.store.get(community_id)?;
        let card = MembershipCard::new(community_id);
        if let Some(old) = self.cards.lock().insert(community_id, Arc::clone(&card)) {
            old.unmount();
        }
        self.probe.resolve(&card, &community, session).await?;
        Ok(card)
    }

    pub fn card(&self, community_id: Uuid) -> Option<Arc<MembershipCard>> {
        self.cards.lock().get(&community_id).cloned()
    }

    pub fn unmount_card(&self, community_id: Uuid) {
        if let Some(card) = self.cards.lock().remove(&community_id) {
            card.unmount();
        }
    }

    /// Tear down the page: every mounted card stops accepting writes.
    pub fn unmount(&self) {
        for (_, card) in self.cards.lock().drain() {
            card.unmount();
        }
    }

    pub async fn join(&self, card: &MembershipCard, session: &Session) -> Result<MutationOutcome> {
        let result = self.probe.join(card, session).await;
        self.after_membership_change(card.community_id(), session, &result, true).await;
        result
    }

    pub async fn leave(&self, card: &MembershipCard, session: &Session) -> Result<MutationOutcome> {
        let result = self.probe.leave(card, session).await;
        self.after_membership_change(card.community_id(), session, &result, false).await;
        result
    }

    /// Keep `member_ids` in step with a committed change, then re-fetch the
    /// listing so scoped tabs pick it up. A failed change may have overtaken
    /// an earlier one that did land remotely, so it re-fetches as well.
    async fn after_membership_change(
        &self,
        community_id: Uuid,
        session: &Session,
        result: &Result<MutationOutcome>,
        joined: bool,
    ) {
        match result {
            Ok(MutationOutcome::Committed) => self.patch_members(community_id, session.user_id, joined),
            Ok(MutationOutcome::Discarded) => return,
            Err(_) => debug!(%community_id, joined, "membership change failed, re-syncing the listing"),
        }
        if let Err(err) = self.refresh(session).await {
            warn!(%community_id, error = %err, "listing refresh after membership change failed");
        }
    }

    fn patch_members(&self, community_id: Uuid, user_id: Uuid, joined: bool) {
        let patched = self.store.apply(
            community_id,
            Patch::modify(move |community: &mut Community| {
                community.member_ids.retain(|id| *id != user_id);
                if joined {
                    community.member_ids.push(user_id);
                }
            }),
        );
        if let Err(err) = patched {
            debug!(%community_id, error = %err, "community left the listing before membership change landed");
        }
    }
}
