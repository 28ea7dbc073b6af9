//! Scripted behaviour for the in-memory backend: queued faults, hold gates
//! that park a call until released, and per-operation call counters.

use std::collections::VecDeque;

use dashmap::DashMap;
use sf_core::{AppError, Result};
use tokio::sync::oneshot;

/// Every remote operation the backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchAll,
    AddLike,
    RemoveLike,
    AddComment,
    UpdateComment,
    DeleteComment,
    Update,
    Delete,
    FetchCommunities,
    Join,
    Leave,
    IsMember,
}

/// Lets a parked call proceed. Dropping it without calling
/// [`release`](Release::release) also lets the call through.
#[derive(Debug)]
pub struct Release(oneshot::Sender<()>);

impl Release {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug, Default)]
pub struct Script {
    faults: DashMap<Operation, VecDeque<AppError>>,
    gates: DashMap<Operation, VecDeque<oneshot::Receiver<()>>>,
    calls: DashMap<Operation, usize>,
}

impl Script {
    /// The next call of `op` fails with `err`. Queued faults fire in order.
    pub fn fail_next(&self, op: Operation, err: AppError) {
        self.faults.entry(op).or_default().push_back(err);
    }

    /// The next call of `op` waits until the returned handle is released.
    pub fn hold_next(&self, op: Operation) -> Release {
        let (tx, rx) = oneshot::channel();
        self.gates.entry(op).or_default().push_back(rx);
        Release(tx)
    }

    /// How many calls of `op` have started, including parked ones.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.get(&op).map_or(0, |count| *count)
    }

    /// Wait until at least `n` calls of `op` have started.
    pub async fn reached(&self, op: Operation, n: usize) {
        while self.calls(op) < n {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) async fn enter(&self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        let gate = self.gates.get_mut(&op).and_then(|mut queue| queue.pop_front());
        if let Some(gate) = gate {
            tracing::trace!(?op, "call parked");
            let _ = gate.await;
        }

        match self.faults.get_mut(&op).and_then(|mut queue| queue.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
