//! The broadcast wakeup a `broadcast_subscribe` paquet parks on. Replaces the original's
//! editMutex + waitMutex + waitCondition + pending-pointer quad (`Satellite/paquet_broadcast.h`)
//! with one guarded revision triple and a generation counter: a task has at most one broadcast
//! paquet parked at a time, and a second `broadcast_subscribe` arriving while one is already
//! parked preempts it rather than racing it for the wakeup.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::wire::Revisions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhichChannel {
    OnRadar,
    InSight,
    OnMap,
}

pub struct BroadcastRendezvous {
    current: Mutex<Revisions>,
    generation: Mutex<u64>,
    condvar: Condvar,
}

impl BroadcastRendezvous {
    pub fn new() -> Self {
        BroadcastRendezvous {
            current: Mutex::new(Revisions::default()),
            generation: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    pub fn current(&self) -> Revisions {
        *self.current.lock()
    }

    /// Called by the broadcaster consumer thread when a fresh revision triple arrives for this
    /// task's session. Updates the shared state and wakes whichever paquet is parked, if any.
    pub fn update(&self, revisions: Revisions) {
        *self.current.lock() = revisions;
        self.condvar.notify_all();
    }

    /// Parks the calling paquet thread until `last_known` (already clamped against `current()` by
    /// the caller, per `Revisions::clamped_to`) falls behind the current revisions, or `timeout`
    /// elapses. Returns the channel that advanced first, in onRadar -> inSight -> onMap priority
    /// order, and the fresh revision triple. Returns `None` on timeout, or immediately if a later
    /// call to `wait` takes the rendezvous slot first.
    pub fn wait(&self, last_known: Revisions, timeout: Duration) -> Option<(WhichChannel, Revisions)> {
        let my_generation = {
            let mut generation = self.generation.lock();
            *generation += 1;
            *generation
        };

        let mut guard = self.current.lock();
        loop {
            if *self.generation.lock() != my_generation {
                return None;
            }
            if let Some(result) = advanced_channel(last_known, *guard) {
                return Some(result);
            }
            let wait_result = self.condvar.wait_for(&mut guard, timeout);
            if wait_result.timed_out() {
                return None;
            }
        }
    }
}

impl Default for BroadcastRendezvous {
    fn default() -> Self {
        BroadcastRendezvous::new()
    }
}

fn advanced_channel(last_known: Revisions, current: Revisions) -> Option<(WhichChannel, Revisions)> {
    if current.on_radar > last_known.on_radar {
        Some((WhichChannel::OnRadar, current))
    } else if current.in_sight > last_known.in_sight {
        Some((WhichChannel::InSight, current))
    } else if current.on_map > last_known.on_map {
        Some((WhichChannel::OnMap, current))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_immediately_when_already_advanced() {
        let rendezvous = BroadcastRendezvous::new();
        rendezvous.update(Revisions {
            on_radar: 1,
            in_sight: 0,
            on_map: 0,
        });
        let (which, current) = rendezvous.wait(Revisions::default(), Duration::from_millis(50)).unwrap();
        assert_eq!(which, WhichChannel::OnRadar);
        assert_eq!(current.on_radar, 1);
    }

    #[test]
    fn wait_times_out_with_no_update() {
        let rendezvous = BroadcastRendezvous::new();
        assert!(rendezvous.wait(Revisions::default(), Duration::from_millis(20)).is_none());
    }

    #[test]
    fn update_wakes_a_parked_waiter() {
        let rendezvous = Arc::new(BroadcastRendezvous::new());
        let waiter = Arc::clone(&rendezvous);
        let handle = thread::spawn(move || waiter.wait(Revisions::default(), Duration::from_secs(5)));

        // Give the waiter thread a chance to park before signaling it.
        thread::sleep(Duration::from_millis(50));
        rendezvous.update(Revisions {
            on_radar: 0,
            in_sight: 3,
            on_map: 0,
        });

        let (which, current) = handle.join().unwrap().expect("expected a wakeup, not a timeout");
        assert_eq!(which, WhichChannel::InSight);
        assert_eq!(current.in_sight, 3);
    }

    #[test]
    fn a_later_wait_preempts_an_earlier_one() {
        let rendezvous = Arc::new(BroadcastRendezvous::new());
        let first = Arc::clone(&rendezvous);
        let handle = thread::spawn(move || first.wait(Revisions::default(), Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(50));
        // A second subscribe takes the slot; the first parked waiter should give up rather than
        // racing it for the next wakeup.
        let _ = rendezvous.wait(Revisions::default(), Duration::from_millis(10));

        assert!(handle.join().unwrap().is_none());
    }
}
