//! The loopback listener thread. Binds `127.0.0.1:20000` (`spec.md` §6) and runs one
//! accept-then-converse loop: `spec.md` §4.D requires no event loop, and `spec.md` §1's
//! "horizontal scaling beyond a single Satellite instance" non-goal means there is only ever one
//! consumer to serve, so a conversation is handled to completion before the next `accept` runs.
//!
//! One conversation is `Transmit` -> `AckWait`, repeated: wait on the desk for a batch (or time
//! out into a keepalive), write it, then read back receipt-id acknowledgments for a bounded
//! window. Anything left unacknowledged when the socket drops stays on the desk
//! (`Board::acknowledge` only removes what was actually confirmed) and is resent to whichever
//! client connects next.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mmps::Pool;
use plat_log::logging::Logger;

use crate::board::Board;
use crate::error::{BroadcasterFault, BroadcasterResult};
use crate::wire::{self, Session};

pub struct ListenerConfig {
    pub bind_address: std::net::SocketAddr,
    /// How long `Transmit` waits for a fresh batch before sending a keepalive instead
    /// (`spec.md` §4.D's listener "wait on a semaphore with an idle timeout").
    pub idle_timeout: Duration,
    /// How long `AckWait` waits for each receipt id before giving up on the rest of the batch
    /// (`spec.md` §5: "broadcaster loopback: 5 s receipt poll").
    pub ack_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            bind_address: "127.0.0.1:20000".parse().unwrap(),
            idle_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

pub fn run(
    board: Arc<Board>,
    pool: Arc<Pool>,
    logger: Logger,
    config: ListenerConfig,
    shutdown: Arc<AtomicBool>,
) -> BroadcasterResult<()> {
    let listener = TcpListener::bind(config.bind_address).map_err(BroadcasterFault::CannotBindListener)?;

    plat_log::logging::info!(logger, "broadcaster listening"; "addr" => %config.bind_address);

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                plat_log::logging::info!(logger, "broadcaster subscriber connected"; "peer" => %peer);
                converse(&stream, &board, &pool, &logger, &config);
                plat_log::logging::info!(logger, "broadcaster subscriber disconnected"; "peer" => %peer);
            }
            Err(err) => {
                plat_log::logging::warn!(logger, "failed to accept a broadcaster subscriber"; "error" => %err);
            }
        }
    }
    Ok(())
}

/// Runs `Transmit` -> `AckWait` repeatedly until the socket errors, at which point the caller's
/// `accept` loop takes over again.
fn converse(stream: &TcpStream, board: &Board, pool: &Pool, logger: &Logger, config: &ListenerConfig) {
    let mut writer = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut reader = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };

    loop {
        let batch = board.wait_for_batch(config.idle_timeout);
        let sessions: Vec<Session> = batch.unwrap_or_default();

        let bytes = match frame_bytes(pool, &sessions) {
            Ok(bytes) => bytes,
            Err(err) => {
                plat_log::logging::error!(*logger, "failed to encode a broadcaster frame"; "error" => %err);
                return;
            }
        };
        if writer.write_all(&bytes).is_err() {
            return;
        }
        if sessions.is_empty() {
            continue;
        }

        let acked = read_acks(&mut reader, sessions.len(), config.ack_timeout);
        board.acknowledge(&acked);
        if acked.len() != sessions.len() {
            // Socket dropped or went idle mid-`AckWait`; unacknowledged sessions remain on the
            // desk for the next connection, so just let the caller's `accept` loop take over.
            return;
        }
    }
}

fn frame_bytes(pool: &Pool, sessions: &[Session]) -> mmps::MmpsResult<Vec<u8>> {
    let mut frame = wire::write_frame(pool, sessions)?;
    frame.rewind();
    let len = frame.len();
    frame.get_data(len)
}

/// Reads up to `expected` 8-byte receipt-id acknowledgments, each bounded by `timeout`. Stops
/// early on the first timeout or read error, since that means the client has gone quiet or away;
/// whatever was read before that is still a valid partial acknowledgment.
fn read_acks(reader: &mut TcpStream, expected: usize, timeout: Duration) -> Vec<u64> {
    let mut acked = Vec::with_capacity(expected);
    let _ = reader.set_read_timeout(Some(timeout));
    for _ in 0..expected {
        let mut buf = [0u8; 8];
        if reader.read_exact(&mut buf).is_err() {
            break;
        }
        acked.push(wire::decode_receipt_ack(&buf));
    }
    acked
}
