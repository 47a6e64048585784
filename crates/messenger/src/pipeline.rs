//! The main pipeline thread (`spec.md` §4.E "Pipeline (main thread)"): fetch outstanding rows,
//! hand the whole batch to the APNS sender, then walk `sent` and `processed` to flush database
//! flags and return buffers to the pool. Grounded on
//! `original_source/Messanger/main.c`'s main loop, which runs exactly this five-step sequence
//! once per wakeup and then waits on a process latch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dbpool::Chain as DbChain;
use mmps::Pool;
use plat_log::logging::Logger;

use crate::chalkboard::Chalkboard;
use crate::notification;

pub struct PipelineConfig {
    /// How long the main thread waits between passes when nothing obliges it to wake early.
    pub tick_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            tick_interval: Duration::from_millis(2000),
        }
    }
}

pub fn run(
    pool: Arc<Pool>,
    db: Arc<DbChain>,
    board: Arc<Chalkboard>,
    logger: Logger,
    config: PipelineConfig,
    shutdown: Arc<AtomicBool>,
) {
    if let Err(err) = notification::reset_stale_in_messanger(&db) {
        plat_log::logging::error!(logger, "failed to reset stale in_messanger rows at startup"; "error" => %err);
    }

    while !shutdown.load(Ordering::Relaxed) {
        if let Err(err) = tick(&pool, &db, &board, &logger) {
            plat_log::logging::error!(logger, "messenger pipeline tick failed"; "error" => %err);
        }
        std::thread::sleep(config.tick_interval);
    }
}

fn tick(pool: &Pool, db: &DbChain, board: &Chalkboard, logger: &Logger) -> crate::error::MessengerResult<()> {
    fetch_and_enqueue(pool, db, board, logger)?;

    let moved = board.move_outstanding_to_in_the_air();
    if moved > 0 {
        board.signal_ready_to_go();
    }

    flush_sent(db, board, logger)?;
    flush_processed(pool, db, board, logger)?;
    Ok(())
}

fn fetch_and_enqueue(pool: &Pool, db: &DbChain, board: &Chalkboard, logger: &Logger) -> crate::error::MessengerResult<()> {
    let mut handle = db.peek_handle()?;
    let result = notification::fetch_outstanding(pool, &mut handle, logger);
    match result {
        Ok(fetched) => {
            db.poke_handle(handle)?;
            if !fetched.is_empty() {
                board.enqueue_outstanding(fetched);
            }
            Ok(())
        }
        Err(err) => {
            let _ = db.reset_handle(handle);
            Err(err)
        }
    }
}

/// Walks `sent`: sets the database `sent` flag per row, then moves the notification onto
/// `processed`. One handle checkout covers the whole walk.
fn flush_sent(db: &DbChain, board: &Chalkboard, logger: &Logger) -> crate::error::MessengerResult<()> {
    let mut sent = board.drain_sent();
    if sent.is_empty() {
        return Ok(());
    }

    let mut handle = db.peek_handle()?;
    while let Some(mut notification) = sent.pop_front() {
        if let Err(err) = notification::mark_sent(&mut handle, notification.notification_id) {
            plat_log::logging::error!(
                *logger,
                "failed to flag a sent notification";
                "notification_id" => notification.notification_id,
                "error" => %err,
            );
            let _ = db.reset_handle(handle);
            board.move_to_processed(notification);
            return Err(err);
        }
        board.move_to_processed(notification);
    }
    db.poke_handle(handle)?;
    Ok(())
}

/// Walks `processed`: clears the database `in_messanger` flag per row, then returns the
/// notification's buffer to the pool.
fn flush_processed(pool: &Pool, db: &DbChain, board: &Chalkboard, logger: &Logger) -> crate::error::MessengerResult<()> {
    let mut processed = board.drain_processed();
    if processed.is_empty() {
        return Ok(());
    }

    let mut handle = db.peek_handle()?;
    while let Some(notification) = processed.pop_front() {
        let notification_id = notification.notification_id;
        if let Err(err) = notification::clear_in_messanger(&mut handle, notification_id) {
            plat_log::logging::error!(
                *logger,
                "failed to clear in_messanger";
                "notification_id" => notification_id,
                "error" => %err,
            );
            let _ = db.reset_handle(handle);
            let _ = pool.poke(notification.into_buffer());
            return Err(err);
        }
        let _ = pool.poke(notification.into_buffer());
    }
    db.poke_handle(handle)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{NotificationRecord, DEVICE_TOKEN_SIZE};
    use mmps::bank::{Bank, BankId};

    fn pool_with(buffers: usize) -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 2048, 0, buffers)).unwrap();
        pool
    }

    fn notification(pool: &Pool, id: i64) -> notification::Notification {
        let record = NotificationRecord {
            notification_id: id,
            device_id: 1,
            device_token: [0u8; DEVICE_TOKEN_SIZE],
            message_key: "plaque.nearby".into(),
            message_arguments: "".into(),
        };
        notification::Notification::encode(pool, record).unwrap()
    }

    /// Three notifications walk `outstanding -> in_the_air -> sent -> processed` and the bank's
    /// in-use count returns to zero once the last one is poked back, without touching a database.
    #[test]
    fn three_notifications_return_their_buffers_after_the_full_queue_walk() {
        let pool = pool_with(8);
        let board = Chalkboard::new();

        board.enqueue_outstanding(vec![
            notification(&pool, 1),
            notification(&pool, 2),
            notification(&pool, 3),
        ]);
        assert_eq!(pool.bank_in_use_count(BankId(0)).unwrap(), 3);

        let moved = board.move_outstanding_to_in_the_air();
        assert_eq!(moved, 3);

        let mut in_the_air = board.take_in_the_air();
        while let Some(notification) = in_the_air.pop_front() {
            board.move_to_sent(notification);
        }

        let mut sent = board.drain_sent();
        assert_eq!(sent.len(), 3);
        while let Some(notification) = sent.pop_front() {
            board.move_to_processed(notification);
        }

        let mut processed = board.drain_processed();
        assert_eq!(processed.len(), 3);
        while let Some(notification) = processed.pop_front() {
            pool.poke(notification.into_buffer()).unwrap();
        }

        assert_eq!(pool.bank_in_use_count(BankId(0)).unwrap(), 0);
        assert_eq!(pool.bank_free_count(BankId(0)).unwrap(), 8);
    }
}
