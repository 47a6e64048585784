//! TCP accept loop. One OS thread is spawned per accepted connection; that thread owns the
//! connection end-to-end, from the dialogue handshake through the ordinary paquet loop, until it
//! terminates.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::context::Context;
use crate::dialogue;
use crate::paquet;
use crate::task::{DialogueState, Task};

/// `spec.md` §4.C.5/§5: every socket read and write on a task is gated by a bounded poll — 10 s
/// for a pilot, 10 s for a paquet body, 10 s begin-to-transmit on a write. Since `SO_RCVTIMEO`/
/// `SO_SNDTIMEO` are socket-level (shared by every `try_clone`d descriptor), setting both here
/// once, before the write half is cloned off for `Task`, covers the dialogue handshake, the
/// paquet receive loop, and every paquet worker's response write.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub fn serve(ctx: Context, bind_addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    plat_log::logging::info!(ctx.logger, "satellite listening"; "addr" => %bind_addr);

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                plat_log::logging::warn!(ctx.logger, "failed to accept a connection"; "error" => %err);
                continue;
            }
        };

        let conn_ctx = ctx.clone();
        thread::spawn(move || handle_connection(conn_ctx, stream));
    }

    Ok(())
}

fn handle_connection(ctx: Context, mut stream: TcpStream) {
    let peer = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };
    let _ = stream.set_read_timeout(Some(SOCKET_TIMEOUT));
    let _ = stream.set_write_timeout(Some(SOCKET_TIMEOUT));
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };

    let task_id = ctx.registry.allocate_id();
    let task = Arc::new(Task::new(task_id, peer, write_half));
    ctx.registry.insert(Arc::clone(&task));

    if let Err(fault) = dialogue::run(&ctx, &task, &mut stream) {
        plat_log::logging::info!(
            ctx.logger,
            "dialogue rejected, closing connection";
            "peer" => %peer,
            "fault" => %fault,
        );
        ctx.registry.remove(task_id);
        return;
    }

    match task.state() {
        // Anticipant connections have already sent their device token and terminated inside
        // `dialogue::run`; only an authenticated regular dialogue enters the ordinary paquet
        // loop (`spec.md` §4.C.1: `Anticipant` has no `RegularLoop`).
        DialogueState::Authenticated => paquet::run(ctx, task, stream),
        _ => ctx.registry.remove(task_id),
    }
}
