//! The consumer side of the Broadcaster's loopback fan-out (`spec.md` §4.D, "Consumer side:
//! Satellite's `BroadcasterThread`"). Connects to the configured Broadcaster loopback address,
//! reads session-revision frames, and routes each one to the task that owns that session through
//! `TaskRegistry::get_by_session`, waking its parked `broadcast_subscribe` paquet if one is
//! waiting. Runs as its own thread for the process's lifetime, reconnecting with a short backoff
//! whenever the Broadcaster side isn't there yet or the connection drops.
//!
//! Deliberately has no compile-time dependency on the `broadcaster` crate: the two processes only
//! ever agree on the wire bytes, the same boundary `spec.md` §6 draws between Satellite and every
//! other component it talks to over a socket. The frame layout decoded here (count, then
//! receipt id / session id / three revisions per record, all big-endian) must stay in lockstep
//! with `broadcaster::wire::write_frame`.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mmps::Chain;
use plat_log::logging::Logger;

use crate::registry::TaskRegistry;
use crate::wire::Revisions;

const RECORD_SIZE: usize = 8 + 8 + 4 + 4 + 4;

pub struct BroadcasterClientConfig {
    pub broadcaster_address: SocketAddr,
    pub reconnect_backoff: Duration,
}

impl Default for BroadcasterClientConfig {
    fn default() -> Self {
        BroadcasterClientConfig {
            broadcaster_address: "127.0.0.1:20000".parse().unwrap(),
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

pub fn run(registry: Arc<TaskRegistry>, logger: Logger, config: BroadcasterClientConfig, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match TcpStream::connect(config.broadcaster_address) {
            Ok(stream) => {
                plat_log::logging::info!(logger, "connected to broadcaster"; "addr" => %config.broadcaster_address);
                converse(stream, &registry, &logger, &shutdown);
                plat_log::logging::warn!(logger, "lost connection to broadcaster, reconnecting");
            }
            Err(err) => {
                plat_log::logging::warn!(logger, "failed to connect to broadcaster"; "error" => %err);
            }
        }
        std::thread::sleep(config.reconnect_backoff);
    }
}

fn converse(mut stream: TcpStream, registry: &TaskRegistry, logger: &Logger, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        let count = match read_i32(&mut stream) {
            Ok(n) => n,
            Err(_) => return,
        };
        if count <= 0 {
            continue;
        }

        for _ in 0..count {
            let mut raw = [0u8; RECORD_SIZE];
            if stream.read_exact(&mut raw).is_err() {
                return;
            }
            let mut chain = Chain::new();
            let Ok(()) = chain.put_data(&scratch_pool(), &raw) else { return };
            chain.rewind();
            let receipt_id = chain.get_i64().unwrap_or_default() as u64;
            let session_id = chain.get_i64().unwrap_or_default();
            let revisions = Revisions {
                on_radar: chain.get_i32().unwrap_or_default() as u32,
                in_sight: chain.get_i32().unwrap_or_default() as u32,
                on_map: chain.get_i32().unwrap_or_default() as u32,
            };

            if let Some(task) = registry.get_by_session(session_id) {
                task.rendezvous.update(revisions);
            } else {
                plat_log::logging::debug!(
                    *logger,
                    "revised session has no live task on this satellite";
                    "session_id" => session_id,
                );
            }

            if stream.write_all(&receipt_ack(receipt_id)).is_err() {
                return;
            }
        }
    }
}

fn read_i32(stream: &mut TcpStream) -> std::io::Result<i32> {
    let mut raw = [0u8; 4];
    stream.read_exact(&mut raw)?;
    Ok(i32::from_be_bytes(raw))
}

fn receipt_ack(receipt_id: u64) -> [u8; 8] {
    receipt_id.to_be_bytes()
}

/// A single-buffer pool sized for exactly one wire record, built fresh per record rather than
/// threaded through from `Context`: this decode path never needs to chain across buffers (one
/// record always fits in one buffer) and it runs on its own dedicated thread, not in a paquet
/// worker's hot path.
fn scratch_pool() -> mmps::Pool {
    let mut pool = mmps::Pool::new();
    pool.add_bank(mmps::Bank::new_heap(mmps::BankId(0), RECORD_SIZE, 0, 1))
        .expect("scratch pool has exactly one bank");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskId};
    use std::net::TcpListener;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn a_revised_session_wakes_the_owning_tasks_rendezvous() {
        let registry = Arc::new(TaskRegistry::new());
        let (satellite_end, mut broadcaster_end) = loopback_pair();

        let task_id = registry.allocate_id();
        let write_half = satellite_end.try_clone().unwrap();
        let task = Arc::new(Task::new(task_id, satellite_end.peer_addr().unwrap(), write_half));
        registry.insert(Arc::clone(&task));
        registry.bind_session(77, task_id);

        // One record: receiptId=9, sessionId=77, onRadar=3, inSight=0, onMap=0.
        let mut frame = Vec::new();
        frame.extend_from_slice(&1i32.to_be_bytes());
        frame.extend_from_slice(&9i64.to_be_bytes());
        frame.extend_from_slice(&77i64.to_be_bytes());
        frame.extend_from_slice(&3i32.to_be_bytes());
        frame.extend_from_slice(&0i32.to_be_bytes());
        frame.extend_from_slice(&0i32.to_be_bytes());
        broadcaster_end.write_all(&frame).unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let registry = Arc::clone(&registry);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || converse(satellite_end, &registry, &plat_log::logging::discard(), &shutdown))
        };

        let mut ack = [0u8; 8];
        broadcaster_end.read_exact(&mut ack).unwrap();
        assert_eq!(u64::from_be_bytes(ack), 9);
        assert_eq!(task.rendezvous.current().on_radar, 3);

        shutdown.store(true, Ordering::Relaxed);
        drop(broadcaster_end);
        let _ = handle.join();
    }
}
