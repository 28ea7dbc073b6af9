//! # MembershipProbe
//!
//! Per-card membership state for community listings.
//!
//! A card's initial flag comes from the community's `member_ids` when that
//! list is authoritative, and from a remote `is_member` probe otherwise.
//! Join and leave flip the flag before the remote call and roll it back if
//! the call fails. Every async step is bound to the card's [`ViewScope`];
//! once the card is unmounted nothing writes into it again.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::{Community, CommunityApi, Result, Session};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::inflight::InFlight;
use crate::mutator::MutationOutcome;

/// Owner side of a view lifetime. Closing it (or dropping it) cancels every
/// token handed out.
#[derive(Debug)]
pub struct ViewScope {
    closed: watch::Sender<bool>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self { closed }
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            closed: self.closed.subscribe(),
        }
    }

    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cooperative cancellation token tied to a [`ViewScope`].
#[derive(Debug, Clone)]
pub struct ScopeToken {
    closed: watch::Receiver<bool>,
}

impl ScopeToken {
    pub fn is_cancelled(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the scope is closed or dropped.
    pub async fn cancelled(&self) {
        let mut closed = self.closed.clone();
        // An error means the sender is gone, which also ends the scope.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

/// Where a card's flag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSource {
    /// Not resolved yet (or the probe failed).
    Unknown,
    /// Read from the community's member list.
    MemberList,
    /// Answered by the remote `is_member` probe.
    Probe,
    /// Set by a join/leave issued from this card.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardState {
    pub is_member: bool,
    pub busy: bool,
    pub source: MembershipSource,
}

/// Local UI state of one rendered community card.
#[derive(Debug)]
pub struct MembershipCard {
    community_id: Uuid,
    state: Mutex<CardState>,
    scope: ViewScope,
}

impl MembershipCard {
    pub fn new(community_id: Uuid) -> Arc<Self> {
        Arc::new(Self {
            community_id,
            state: Mutex::new(CardState {
                is_member: false,
                busy: false,
                source: MembershipSource::Unknown,
            }),
            scope: ViewScope::new(),
        })
    }

    pub fn community_id(&self) -> Uuid {
        self.community_id
    }

    pub fn state(&self) -> CardState {
        *self.state.lock()
    }

    pub fn is_member(&self) -> bool {
        self.state.lock().is_member
    }

    pub fn token(&self) -> ScopeToken {
        self.scope.token()
    }

    /// Tear the card down; pending probes and mutations stop writing to it.
    pub fn unmount(&self) {
        self.scope.close();
    }

    pub fn is_mounted(&self) -> bool {
        !self.scope.is_closed()
    }

    /// Writes only while mounted. Returns whether the write happened.
    fn write(&self, f: impl FnOnce(&mut CardState)) -> bool {
        if !self.is_mounted() {
            return false;
        }
        f(&mut self.state.lock());
        true
    }
}

pub struct MembershipProbe {
    api: Arc<dyn CommunityApi>,
    inflight: InFlight,
}

impl MembershipProbe {
    pub fn new(api: Arc<dyn CommunityApi>) -> Self {
        Self {
            api,
            inflight: InFlight::new(),
        }
    }

    /// Seed `card` with the session user's membership of `community`.
    pub async fn resolve(
        &self,
        card: &MembershipCard,
        community: &Community,
        session: &Session,
    ) -> Result<MutationOutcome> {
        let user_id = session.user_id;
        if community.membership_is_authoritative(user_id) {
            let is_member = community.has_member(user_id);
            return Ok(outcome(card.write(|state| {
                state.is_member = is_member;
                state.source = MembershipSource::MemberList;
            })));
        }

        let ticket = self.inflight.begin(card.community_id);
        let token = card.token();
        let answer = tokio::select! {
            _ = token.cancelled() => {
                debug!(community_id = %card.community_id, "membership probe cancelled by unmount");
                return Ok(MutationOutcome::Discarded);
            }
            answer = self.api.is_member(community.id, user_id, &session.token) => answer,
        };
        let is_member = answer.inspect_err(|err| {
            warn!(community_id = %card.community_id, error = %err, "membership probe failed");
        })?;

        // A join/leave issued meanwhile owns the flag now.
        if !(self.inflight.is_latest(&ticket) && self.inflight.commit(&ticket)) {
            return Ok(MutationOutcome::Discarded);
        }
        Ok(outcome(card.write(|state| {
            state.is_member = is_member;
            state.source = MembershipSource::Probe;
        })))
    }

    pub async fn join(&self, card: &MembershipCard, session: &Session) -> Result<MutationOutcome> {
        self.set_membership(card, session, true).await
    }

    pub async fn leave(&self, card: &MembershipCard, session: &Session) -> Result<MutationOutcome> {
        self.set_membership(card, session, false).await
    }

    async fn set_membership(
        &self,
        card: &MembershipCard,
        session: &Session,
        join: bool,
    ) -> Result<MutationOutcome> {
        let community_id = card.community_id;
        let previous = card.state();
        let ticket = self.inflight.begin(community_id);
        card.write(|state| {
            state.is_member = join;
            state.busy = true;
            state.source = MembershipSource::Local;
        });

        let token = card.token();
        let remote = async {
            if join {
                self.api.join(community_id, session.user_id, &session.token).await
            } else {
                self.api.leave(community_id, session.user_id, &session.token).await
            }
        };
        // Unmounting only stops local writes; the request itself still resolves.
        let result = remote.await;
        if token.is_cancelled() {
            debug!(%community_id, join, "membership change resolved after unmount");
            return result.map(|()| MutationOutcome::Discarded);
        }

        match result {
            Ok(()) => {
                let latest = self.inflight.commit(&ticket) && self.inflight.is_latest(&ticket);
                if latest {
                    card.write(|state| state.busy = false);
                    Ok(MutationOutcome::Committed)
                } else {
                    Ok(MutationOutcome::Discarded)
                }
            }
            Err(err) => {
                if self.inflight.is_latest(&ticket) {
                    warn!(%community_id, join, error = %err, "membership change failed, rolling back");
                    card.write(|state| *state = CardState { busy: false, ..previous });
                }
                Err(err)
            }
        }
    }
}

fn outcome(written: bool) -> MutationOutcome {
    if written {
        MutationOutcome::Committed
    } else {
        MutationOutcome::Discarded
    }
}
