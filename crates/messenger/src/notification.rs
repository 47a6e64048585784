//! One in-flight notification. Owns exactly one `mmps::Buffer` carved from the notifications
//! bank, holding the encoded `NotificationRecord`; the buffer is what actually moves (or gets
//! poked back to the pool) as the notification travels through the chalkboard's four queues,
//! matching `spec.md` §4.E's "each [transition] moves the whole buffer chain."

use dbpool::{sql::procedures, Chain as DbChain, Handle};
use mmps::{Buffer, Pool};
use plat_log::logging::Logger;

use crate::error::MessengerResult;
use crate::wire::{NotificationRecord, DEVICE_TOKEN_SIZE};

/// The original's `MAX_NOTIFICATIONS` (`original_source/Messanger/notification.h`): the most
/// rows fetched and staged into `outstanding` in a single pipeline pass.
pub const MAX_NOTIFICATIONS_PER_FETCH: i32 = 5;

pub struct Notification {
    pub notification_id: i64,
    buffer: Buffer,
}

impl Notification {
    pub(crate) fn encode(pool: &Pool, record: NotificationRecord) -> MessengerResult<Notification> {
        let mut buffer = pool.peek_for(record_wire_size(&record))?;
        record.write(&mut buffer)?;
        Ok(Notification {
            notification_id: record.notification_id,
            buffer,
        })
    }

    pub fn record(&mut self) -> MessengerResult<NotificationRecord> {
        let record = NotificationRecord::read(&mut self.buffer)?;
        self.buffer.rewind();
        Ok(record)
    }

    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }
}

fn record_wire_size(record: &NotificationRecord) -> usize {
    8 + 8 + DEVICE_TOKEN_SIZE + 2 + record.message_key.len() + 2 + record.message_arguments.len()
}

/// `journal.fetch_outstanding_notifications` both returns and flags the rows it selects (sets
/// `in_messanger = TRUE` server-side), the same fetch-and-mark-atomically shape
/// `DEQUEUE_REVISED_SESSIONS` uses in the broadcaster, so there is no separate "mark" step here.
pub fn fetch_outstanding(pool: &Pool, handle: &mut Handle, logger: &Logger) -> MessengerResult<Vec<Notification>> {
    handle.push_integer(Some(MAX_NOTIFICATIONS_PER_FETCH));
    let rows = handle.execute(procedures::FETCH_OUTSTANDING_NOTIFICATIONS)?;

    if rows.is_empty() {
        plat_log::logging::debug!(*logger, "no outstanding notifications this pass");
    }

    let mut notifications = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = NotificationRecord {
            notification_id: row.get::<_, i64>(0),
            device_id: row.get::<_, i64>(1),
            device_token: decode_hex_token(row.get::<_, &str>(2)),
            message_key: row.get::<_, String>(3),
            message_arguments: row.get::<_, String>(4),
        };
        notifications.push(Notification::encode(pool, record)?);
    }

    Ok(notifications)
}

pub fn mark_sent(handle: &mut Handle, notification_id: i64) -> MessengerResult<()> {
    handle.push_bigint(Some(notification_id));
    handle.execute(procedures::MARK_NOTIFICATION_SENT)?;
    Ok(())
}

pub fn clear_in_messanger(handle: &mut Handle, notification_id: i64) -> MessengerResult<()> {
    handle.push_bigint(Some(notification_id));
    handle.execute(procedures::CLEAR_IN_MESSANGER)?;
    Ok(())
}

/// Run once at startup (`spec.md` §4.E's crash-recovery invariant): any row still flagged
/// `in_messanger = TRUE` from a process that died mid-pipeline is reset so the next fetch picks
/// it back up.
pub fn reset_stale_in_messanger(db: &DbChain) -> MessengerResult<()> {
    let mut handle = db.peek_handle()?;
    match handle.execute(procedures::RESET_STALE_IN_MESSANGER) {
        Ok(_) => {
            db.poke_handle(handle)?;
            Ok(())
        }
        Err(err) => {
            let _ = db.reset_handle(handle);
            Err(err.into())
        }
    }
}

fn decode_hex_token(hex: &str) -> [u8; DEVICE_TOKEN_SIZE] {
    let mut token = [0u8; DEVICE_TOKEN_SIZE];
    for (i, byte) in token.iter_mut().enumerate() {
        let offset = i * 2;
        if offset + 2 > hex.len() {
            break;
        }
        *byte = u8::from_str_radix(&hex[offset..offset + 2], 16).unwrap_or(0);
    }
    token
}
