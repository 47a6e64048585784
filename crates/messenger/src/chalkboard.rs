//! The four-queue notification lifecycle (`spec.md` §4.E): `outstanding` -> `in_the_air` ->
//! `sent` -> `processed`, each behind its own mutex. Kept as four literal `VecDeque`s rather than
//! one collection with a state tag (`spec.md` §9 Design Note, declined per `SPEC_FULL.md` §4.E:
//! testable property 5 and scenario 6 describe four named states transitioning in order, and
//! tests exercise exactly that sequence). Named after `original_source/Messanger/chalkboard.c`,
//! which held the same four buffer lists plus the APNs ready-to-go condition.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::notification::Notification;

pub struct Chalkboard {
    outstanding: Mutex<VecDeque<Notification>>,
    in_the_air: Mutex<VecDeque<Notification>>,
    sent: Mutex<VecDeque<Notification>>,
    processed: Mutex<VecDeque<Notification>>,
    ready_to_go: Condvar,
    signaled: Mutex<bool>,
}

impl Chalkboard {
    pub fn new() -> Chalkboard {
        Chalkboard {
            outstanding: Mutex::new(VecDeque::new()),
            in_the_air: Mutex::new(VecDeque::new()),
            sent: Mutex::new(VecDeque::new()),
            processed: Mutex::new(VecDeque::new()),
            ready_to_go: Condvar::new(),
            signaled: Mutex::new(false),
        }
    }

    pub fn enqueue_outstanding(&self, notifications: Vec<Notification>) {
        self.outstanding.lock().extend(notifications);
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.lock().len()
    }

    /// `spec.md` §4.E's "atomic swap under both queue locks in a consistent order": source
    /// (`outstanding`) is locked before destination (`in_the_air`), the same fixed order every
    /// cross-queue move in this module uses.
    pub fn move_outstanding_to_in_the_air(&self) -> usize {
        let mut outstanding = self.outstanding.lock();
        let mut in_the_air = self.in_the_air.lock();
        let moved = outstanding.len();
        in_the_air.extend(outstanding.drain(..));
        moved
    }

    /// Hands the APNS sender the whole `in_the_air` batch; the sender owns each notification
    /// transiently until it either reaches `sent` or is returned here on a disconnect.
    pub fn take_in_the_air(&self) -> VecDeque<Notification> {
        std::mem::take(&mut *self.in_the_air.lock())
    }

    /// Puts notifications the sender didn't get to back at the front of `in_the_air`, preserving
    /// their original order ahead of anything enqueued since.
    pub fn return_to_in_the_air(&self, mut remaining: VecDeque<Notification>) {
        if remaining.is_empty() {
            return;
        }
        let mut in_the_air = self.in_the_air.lock();
        remaining.append(&mut in_the_air);
        *in_the_air = remaining;
    }

    pub fn move_to_sent(&self, notification: Notification) {
        self.sent.lock().push_back(notification);
    }

    pub fn drain_sent(&self) -> VecDeque<Notification> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn move_to_processed(&self, notification: Notification) {
        self.processed.lock().push_back(notification);
    }

    pub fn drain_processed(&self) -> VecDeque<Notification> {
        std::mem::take(&mut *self.processed.lock())
    }

    /// Wakes the APNS sender thread, parked on `wait_ready_to_go`.
    pub fn signal_ready_to_go(&self) {
        *self.signaled.lock() = true;
        self.ready_to_go.notify_one();
    }

    /// The APNS thread's "timed-wait on the ready-to-go condition" (`spec.md` §4.E step 1).
    /// Returns `true` if a signal was observed, `false` on timeout.
    pub fn wait_ready_to_go(&self, timeout: Duration) -> bool {
        let mut signaled = self.signaled.lock();
        if !*signaled {
            let result = self.ready_to_go.wait_for(&mut signaled, timeout);
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        *signaled = false;
        true
    }
}

impl Default for Chalkboard {
    fn default() -> Self {
        Chalkboard::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::NotificationRecord;
    use mmps::bank::{Bank, BankId};
    use mmps::Pool;

    fn pool() -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 2048, 0, 16)).unwrap();
        pool
    }

    fn notification(pool: &Pool, id: i64) -> Notification {
        let record = NotificationRecord {
            notification_id: id,
            device_id: 1,
            device_token: [0u8; crate::wire::DEVICE_TOKEN_SIZE],
            message_key: "k".into(),
            message_arguments: "".into(),
        };
        Notification::encode(pool, record).unwrap()
    }

    #[test]
    fn outstanding_moves_to_in_the_air_whole() {
        let pool = pool();
        let board = Chalkboard::new();
        board.enqueue_outstanding(vec![notification(&pool, 1), notification(&pool, 2)]);
        assert_eq!(board.outstanding_count(), 2);

        let moved = board.move_outstanding_to_in_the_air();
        assert_eq!(moved, 2);
        assert_eq!(board.outstanding_count(), 0);

        let in_the_air = board.take_in_the_air();
        assert_eq!(in_the_air.len(), 2);
    }

    #[test]
    fn unsent_notifications_survive_a_return_to_in_the_air() {
        let pool = pool();
        let board = Chalkboard::new();
        board.enqueue_outstanding(vec![notification(&pool, 1)]);
        board.move_outstanding_to_in_the_air();
        let batch = board.take_in_the_air();
        assert_eq!(board.take_in_the_air().len(), 0);

        board.return_to_in_the_air(batch);
        let back = board.take_in_the_air();
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn wait_ready_to_go_times_out_with_no_signal() {
        let board = Chalkboard::new();
        assert!(!board.wait_ready_to_go(Duration::from_millis(20)));
    }

    #[test]
    fn signal_wakes_a_waiting_apns_thread() {
        use std::sync::Arc;
        let board = Arc::new(Chalkboard::new());
        let waiter = Arc::clone(&board);
        let handle = std::thread::spawn(move || waiter.wait_ready_to_go(Duration::from_secs(5)));

        std::thread::sleep(Duration::from_millis(50));
        board.signal_ready_to_go();

        assert!(handle.join().unwrap());
    }
}
