//! Polls the database for sessions whose on-radar/in-sight/on-map revision counters moved since
//! the last poll and stages them on the `Board` for the listener to deliver. Grounded on
//! `Broadcaster/kernel.c`'s `numberOfRevisedSessions`/`getListOfRevisedSessions` pair and
//! `Broadcaster/main.c`'s main loop, which alternates a short "busy" sleep after a step that
//! found work and a longer "idle" sleep after a step that found none, rather than polling on a
//! single fixed interval.
//!
//! Implements `spec.md` §4.D's `DetectRevised` -> `FillBatch` -> `MarkDelivering` path: one
//! transaction dequeues up to `MAX_REVISED_SESSIONS_PER_STEP` revised sessions (the stored
//! procedure both returns and deletes the rows, so a row is never dequeued twice), assigns each
//! one a fresh receipt id, marks the batch delivered, and publishes it to the desk. `Transmit`
//! and `AckWait` are the listener's job (`listener.rs`), not this thread's.

use std::sync::Arc;
use std::time::Duration;

use dbpool::{sql::procedures, validate, Chain as DbChain};
use plat_log::logging::Logger;

use crate::board::Board;
use crate::error::BroadcasterFault;
use crate::wire::Session;

/// The original's `MAX_REVISED_SESSIONS_PER_STEP` (`Broadcaster/desk.h`): the most sessions
/// dequeued and delivered in a single step, bounding both the query's result size and one
/// batch's size.
pub const MAX_REVISED_SESSIONS_PER_STEP: i32 = 100;

pub struct ProducerConfig {
    pub idle_interval: Duration,
    pub busy_interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        ProducerConfig {
            idle_interval: Duration::from_millis(1000),
            busy_interval: Duration::from_millis(500),
        }
    }
}

pub fn run(db: Arc<DbChain>, board: Arc<Board>, logger: Logger, config: ProducerConfig, shutdown: Arc<std::sync::atomic::AtomicBool>) {
    use std::sync::atomic::Ordering;

    while !shutdown.load(Ordering::Relaxed) {
        match step(&db, &board, &logger) {
            Ok(found_work) => {
                let sleep_for = if found_work { config.busy_interval } else { config.idle_interval };
                std::thread::sleep(sleep_for);
            }
            Err(err) => {
                plat_log::logging::error!(logger, "revised session poll failed"; "error" => %err);
                std::thread::sleep(config.idle_interval);
            }
        }
    }
}

fn step(db: &DbChain, board: &Board, logger: &Logger) -> Result<bool, BroadcasterFault> {
    let mut handle = db.peek_handle()?;

    handle.push_integer(Some(MAX_REVISED_SESSIONS_PER_STEP));
    let rows = match handle.execute(procedures::DEQUEUE_REVISED_SESSIONS) {
        Ok(rows) => rows,
        Err(err) => {
            let _ = db.reset_handle(handle);
            return Err(err.into());
        }
    };

    if rows.is_empty() {
        db.poke_handle(handle)?;
        return Ok(false);
    }

    let sessions: Vec<Session> = rows
        .iter()
        .map(|row| Session {
            receipt_id: board.next_receipt_id(),
            session_id: row.get::<_, i64>(0),
            on_radar_revision: row.get::<_, i32>(1),
            in_sight_revision: row.get::<_, i32>(2),
            on_map_revision: row.get::<_, i32>(3),
        })
        .collect();

    let ids: Vec<i64> = sessions.iter().map(|s| s.session_id).collect();
    handle.push_bigint_array(ids);
    if let Err(err) = handle.execute(procedures::MARK_SESSIONS_DELIVERED) {
        let _ = db.reset_handle(handle);
        return Err(err.into());
    }
    validate::command_ok(logger, "producer::step", procedures::MARK_SESSIONS_DELIVERED, sessions.len() as u64)?;

    db.poke_handle(handle)?;
    board.publish(sessions);
    Ok(true)
}
