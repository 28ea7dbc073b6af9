//! Per-key tickets for confirmed mutations.
//!
//! Two requests on the same key may resolve out of order. Each request takes
//! a ticket when issued; a resolution may only write if no later-issued
//! ticket on that key has committed already.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

/// Issued by [`InFlight::begin`]. The key's bookkeeping is dropped once no
/// ticket on it is alive.
#[derive(Debug)]
pub struct Ticket<'a> {
    inflight: &'a InFlight,
    key: Uuid,
    seq: u64,
}

impl Ticket<'_> {
    pub fn key(&self) -> Uuid {
        self.key
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.inflight.release(self.key);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    issued: u64,
    committed: u64,
    open: usize,
}

#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, key: Uuid) -> Ticket<'_> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_default();
        slot.issued += 1;
        slot.open += 1;
        Ticket {
            inflight: self,
            key,
            seq: slot.issued,
        }
    }

    /// Marks `ticket` as committed. Returns `false` when a newer ticket on
    /// the same key already committed; the caller must then drop its result.
    pub fn commit(&self, ticket: &Ticket<'_>) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&ticket.key) else {
            return true;
        };
        if slot.committed > ticket.seq {
            return false;
        }
        slot.committed = ticket.seq;
        true
    }

    /// No ticket was issued on this key after `ticket`.
    pub fn is_latest(&self, ticket: &Ticket<'_>) -> bool {
        self.slots
            .lock()
            .get(&ticket.key)
            .is_none_or(|slot| slot.issued == ticket.seq)
    }

    /// Keys with at least one live ticket.
    pub fn tracked(&self) -> usize {
        self.slots.lock().len()
    }

    // Sequence numbers only need to be comparable among live tickets, so a
    // key with none left can start over.
    fn release(&self, key: Uuid) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&key) {
            slot.open = slot.open.saturating_sub(1);
            if slot.open == 0 {
                slots.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_resolution_after_newer_commit_is_stale() {
        let inflight = InFlight::new();
        let key = Uuid::now_v7();
        let first = inflight.begin(key);
        let second = inflight.begin(key);

        assert!(inflight.commit(&second));
        assert!(!inflight.commit(&first));
    }

    #[test]
    fn in_order_resolutions_both_commit() {
        let inflight = InFlight::new();
        let key = Uuid::now_v7();
        let first = inflight.begin(key);
        let second = inflight.begin(key);

        assert!(inflight.commit(&first));
        assert!(inflight.commit(&second));
    }

    #[test]
    fn keys_are_independent() {
        let inflight = InFlight::new();
        let a = inflight.begin(Uuid::now_v7());
        let b = inflight.begin(Uuid::now_v7());
        assert!(inflight.commit(&b));
        assert!(inflight.commit(&a));
        assert!(inflight.is_latest(&a));
    }

    #[test]
    fn is_latest_tracks_issue_order() {
        let inflight = InFlight::new();
        let key = Uuid::now_v7();
        let first = inflight.begin(key);
        assert!(inflight.is_latest(&first));
        let second = inflight.begin(key);
        assert!(!inflight.is_latest(&first));
        assert!(inflight.is_latest(&second));
    }

    #[test]
    fn settled_keys_are_forgotten() {
        let inflight = InFlight::new();
        let key = Uuid::now_v7();
        {
            let first = inflight.begin(key);
            let second = inflight.begin(key);
            assert!(inflight.commit(&second));
            assert!(!inflight.commit(&first));
            assert_eq!(inflight.tracked(), 1);
        }
        assert_eq!(inflight.tracked(), 0);

        let again = inflight.begin(key);
        assert!(inflight.is_latest(&again));
        assert!(inflight.commit(&again));
    }

    #[test]
    fn open_older_ticket_keeps_the_key_alive() {
        let inflight = InFlight::new();
        let key = Uuid::now_v7();
        let first = inflight.begin(key);
        let second = inflight.begin(key);
        assert!(inflight.commit(&second));
        drop(second);

        assert_eq!(inflight.tracked(), 1);
        assert!(!inflight.commit(&first));
        drop(first);
        assert_eq!(inflight.tracked(), 0);
    }
}
