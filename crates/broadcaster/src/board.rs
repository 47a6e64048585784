//! Shared state between the producer thread and the listener thread, replacing the original's
//! watchdog spinlock + fixed `sessions[MAX_REVISED_SESSIONS_PER_STEP]` array
//! (`Broadcaster/desk.h`) with a `parking_lot`-guarded `Vec` of sessions still awaiting
//! acknowledgment plus a `Condvar` the listener parks on between batches
//! (`MarkDelivering` -> `Transmit` in `spec.md` §4.D). A session leaves the desk only once its
//! receipt id comes back acknowledged; until then it survives across listener reconnects, since
//! the database row it came from has already been deleted by `FillBatch` and there is nowhere
//! else to recover it from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::wire::Session;

pub struct Board {
    pending: Mutex<Vec<Session>>,
    ready: Condvar,
    next_receipt_id: AtomicU64,
}

impl Board {
    pub fn new() -> Board {
        Board {
            pending: Mutex::new(Vec::new()),
            ready: Condvar::new(),
            next_receipt_id: AtomicU64::new(1),
        }
    }

    /// Assigns the next receipt id a freshly dequeued session will carry. Called once per
    /// session inside `FillBatch`, before the batch is published to the desk.
    pub fn next_receipt_id(&self) -> u64 {
        self.next_receipt_id.fetch_add(1, Ordering::Relaxed)
    }

    /// `MarkDelivering`: stores a freshly produced batch on the desk and wakes the listener.
    /// Appends rather than replaces, so a batch that arrives while the listener is mid-`Transmit`
    /// on an earlier one is not lost.
    pub fn publish(&self, mut batch: Vec<Session>) {
        if batch.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        pending.append(&mut batch);
        self.ready.notify_one();
    }

    /// `Transmit`: the listener's wait for something to send. Returns a snapshot of every
    /// session still outstanding, or `None` if nothing arrived before `timeout` (the listener's
    /// cue to send a keepalive instead).
    pub fn wait_for_batch(&self, timeout: Duration) -> Option<Vec<Session>> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            let result = self.ready.wait_for(&mut pending, timeout);
            if result.timed_out() && pending.is_empty() {
                return None;
            }
        }
        if pending.is_empty() {
            None
        } else {
            Some(pending.clone())
        }
    }

    /// `AckWait`: removes every session in `receipt_ids` from the desk. Only these leave; any
    /// session the listener sent but did not get acknowledged for (a disconnect mid-`AckWait`)
    /// stays queued and is resent to the next connection.
    pub fn acknowledge(&self, receipt_ids: &[u64]) {
        if receipt_ids.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        pending.retain(|session| !receipt_ids.contains(&session.receipt_id));
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(receipt_id: u64, session_id: i64) -> Session {
        Session {
            receipt_id,
            session_id,
            on_radar_revision: 1,
            in_sight_revision: 0,
            on_map_revision: 0,
        }
    }

    #[test]
    fn a_published_batch_is_visible_to_wait_for_batch() {
        let board = Board::new();
        board.publish(vec![session(1, 10), session(2, 11)]);
        let batch = board.wait_for_batch(Duration::from_millis(10)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(board.pending_count(), 2);
    }

    #[test]
    fn acknowledging_a_receipt_removes_only_that_session() {
        let board = Board::new();
        board.publish(vec![session(1, 10), session(2, 11)]);
        board.acknowledge(&[1]);
        assert_eq!(board.pending_count(), 1);
        let remaining = board.wait_for_batch(Duration::from_millis(10)).unwrap();
        assert_eq!(remaining[0].session_id, 11);
    }

    #[test]
    fn an_unacknowledged_session_survives_a_reconnect() {
        let board = Board::new();
        board.publish(vec![session(1, 10)]);
        // Simulates the listener losing the connection after `Transmit` but before `AckWait`
        // confirms anything: the session is still on the desk for the next connection.
        let _ = board.wait_for_batch(Duration::from_millis(10));
        assert_eq!(board.pending_count(), 1);
    }

    #[test]
    fn waiting_with_nothing_published_times_out() {
        let board = Board::new();
        assert!(board.wait_for_batch(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn receipt_ids_are_distinct_and_increasing() {
        let board = Board::new();
        let a = board.next_receipt_id();
        let b = board.next_receipt_id();
        assert!(b > a);
    }
}
