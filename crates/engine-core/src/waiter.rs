//! Race-free handoff between piece workers waiting on several candidate
//! lines and the factory tick that frees lines one at a time.
//!
//! Rendered as an atomic CAS on a two-state enum guarding a
//! `oneshot::Sender` pulled out of its `Option` under the same
//! compare-exchange, rather than the mutex-across-tasks handoff a literal
//! port would need: only the caller that wins the CAS ever touches the
//! sender, so there is never a lock held across an await point.

use model::LineId;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const OPEN: u8 = 0;
const CLAIMED: u8 = 1;

/// A piece's rendezvous object, registered on every line it's willing to
/// accept per the leniency-window policy. Exactly one line wins the
/// claim; every other registration is later pruned.
pub struct Waiter {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<LineId>>>,
}

impl Waiter {
    /// Creates a fresh, open waiter and the receiver its piece worker
    /// blocks on to learn which line claimed it.
    pub fn new() -> (Arc<Waiter>, oneshot::Receiver<LineId>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            state: AtomicU8::new(OPEN),
            sender: Mutex::new(Some(tx)),
        };
        (Arc::new(waiter), rx)
    }

    pub fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLAIMED
    }

    /// Attempts to claim this waiter for `line`. Returns `true` iff this
    /// caller won the race; on success the line id has already been sent
    /// to the piece worker. A losing caller observes no side effect.
    pub fn try_claim(&self, line: LineId) -> bool {
        if self
            .state
            .compare_exchange(OPEN, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // Only the CAS winner ever reaches here, so this is at most one
        // send for the lifetime of the waiter.
        if let Some(tx) = self.sender.lock().unwrap().take() {
            let _ = tx.send(line);
        }
        true
    }
}

/// FIFO registry of waiters a line is currently holding, in registration
/// order — matches the reference's "iterate in registration order"
/// requirement for `claimWaitingPiece`.
#[derive(Default)]
pub struct WaiterQueue {
    waiters: Vec<Arc<Waiter>>,
}

impl WaiterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, waiter: Arc<Waiter>) {
        self.waiters.push(waiter);
    }

    pub fn prune_dead(&mut self) {
        self.waiters.retain(|w| !w.is_claimed());
    }

    /// Prunes already-claimed waiters, then offers `line` to each
    /// remaining one in order, stopping at the first that accepts.
    /// Returns whether a waiter was claimed this call.
    pub fn claim_one(&mut self, line: LineId) -> bool {
        self.prune_dead();
        let claimed = self.waiters.iter().any(|w| w.try_claim(line));
        if claimed {
            self.prune_dead();
        }
        claimed
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_claim_delivers_line_id() {
        let (waiter, rx) = Waiter::new();
        assert!(waiter.try_claim(LineId(2)));
        assert_eq!(rx.await.unwrap(), LineId(2));
    }

    #[test]
    fn second_claim_attempt_loses() {
        let (waiter, _rx) = Waiter::new();
        assert!(waiter.try_claim(LineId(1)));
        assert!(!waiter.try_claim(LineId(2)));
    }

    #[test]
    fn queue_claims_in_registration_order() {
        let mut queue = WaiterQueue::new();
        let (w1, _rx1) = Waiter::new();
        let (w2, _rx2) = Waiter::new();
        queue.register(w1.clone());
        queue.register(w2.clone());

        assert!(queue.claim_one(LineId(1)));
        assert!(w1.is_claimed());
        assert!(!w2.is_claimed());
    }

    #[test]
    fn claimed_waiters_are_pruned_on_next_pass() {
        let mut queue = WaiterQueue::new();
        let (w1, _rx1) = Waiter::new();
        queue.register(w1.clone());
        queue.claim_one(LineId(1));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn dead_waiter_does_not_block_live_ones() {
        let mut queue = WaiterQueue::new();
        let (dead, dead_rx) = Waiter::new();
        dead.try_claim(LineId(9));
        drop(dead_rx);
        let (live, _rx) = Waiter::new();
        queue.register(dead);
        queue.register(live.clone());

        assert!(queue.claim_one(LineId(4)));
        assert!(live.is_claimed());
    }
}
