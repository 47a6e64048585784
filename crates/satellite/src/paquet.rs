//! The ordinary per-connection receive loop, entered once the dialogue handshake leaves the task
//! in `Authenticated` state (the anticipant path never reaches here; it terminates inside
//! `dialogue::run`). One thread owns the socket's read half for the task's whole lifetime; every
//! complete paquet it reads off the wire is handed to a fresh worker thread, so a slow handler
//! never blocks the next paquet's header from being read.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use mmps::Chain;

use crate::commands;
use crate::context::Context;
use crate::error::TaskFault;
use crate::task::{DialogueState, PaquetId, Task};
use crate::wire::{PaquetPilot, DIALOGUE_SIGNATURE};

pub fn run(ctx: Context, task: Arc<Task>, mut stream: TcpStream) {
    task.set_state(DialogueState::RegularLoop);

    loop {
        if task.is_terminated() {
            break;
        }
        match read_one_paquet(&ctx, &mut stream) {
            Ok((pilot, payload)) => spawn_worker(&ctx, &task, pilot, payload),
            Err(fault) => {
                task.record_fault(fault);
                break;
            }
        }
    }

    ctx.registry.remove(task.id);
}

/// Reads one complete paquet (pilot, then its payload) off the task's socket. Both reads are
/// bounded by the read timeout `listener.rs` set on the underlying socket before this thread
/// ever touches it (`spec.md` §5: "read: 10 s pilot, 10 s paquet body"); a read that times out
/// surfaces as `PollForReceiveTimeout`, which `TaskFault::is_transport_fatal` tears the task down
/// on, same as any other receive failure.
fn read_one_paquet(ctx: &Context, stream: &mut TcpStream) -> Result<(PaquetPilot, Chain), TaskFault> {
    let mut header_bytes = vec![0u8; PaquetPilot::SIZE];
    stream
        .read_exact(&mut header_bytes)
        .map_err(|err| TaskFault::from_receive_error(&err))?;

    let mut header_chain = Chain::new();
    header_chain.put_data(&ctx.pool, &header_bytes)?;
    header_chain.rewind();
    let pilot = PaquetPilot::read(&mut header_chain)?;

    if pilot.signature != DIALOGUE_SIGNATURE {
        return Err(TaskFault::MissingSignature);
    }

    let mut payload = Chain::new();
    if pilot.payload_size > 0 {
        let mut payload_bytes = vec![0u8; pilot.payload_size as usize];
        stream
            .read_exact(&mut payload_bytes)
            .map_err(|err| TaskFault::from_receive_error(&err))?;
        payload.put_data(&ctx.pool, &payload_bytes)?;
        payload.rewind();
    }

    Ok((pilot, payload))
}

fn spawn_worker(ctx: &Context, task: &Arc<Task>, pilot: PaquetPilot, mut payload: Chain) {
    let paquet_id = PaquetId(pilot.paquet_id);
    task.begin_paquet(paquet_id);

    let worker_ctx = ctx.clone();
    let worker_task = Arc::clone(task);

    let spawned = thread::Builder::new()
        .name(format!("paquet-{}", pilot.paquet_id))
        .spawn(move || {
            let outcome = commands::dispatch(&worker_ctx, &worker_task, pilot.command_code, &mut payload);
            let (subcode, body) = match outcome {
                Ok(output) => (0u32, output),
                Err(fault) => {
                    worker_task.record_fault(fault);
                    (fault_subcode(fault), Chain::new())
                }
            };
            write_response(&worker_ctx, &worker_task, pilot.paquet_id, pilot.command_code, subcode, body);
            worker_task.end_paquet(paquet_id);
        });

    if spawned.is_err() {
        task.record_fault(TaskFault::CannotCreatePaquetThread);
        task.end_paquet(paquet_id);
    }
}

/// Maps a failed paquet's fault to the value placed in the response pilot's `command_subcode`,
/// distinct from `wire::PAQUET_REJECT_BUSY`. Any nonzero value tells the client the paquet
/// failed; the specific code lets it decide whether retrying (e.g. after re-authenticating on
/// `DeviceAuthenticationFailed`) makes sense instead of treating every failure alike.
fn fault_subcode(fault: TaskFault) -> u32 {
    match fault {
        TaskFault::DeviceAuthenticationFailed => 1,
        TaskFault::ProfileAuthenticationFailed => 2,
        TaskFault::CannotGetSession => 3,
        TaskFault::NoDatabaseHandlers => 4,
        TaskFault::UnexpectedDatabaseResult => 5,
        _ => 0xFFFF_FFFE,
    }
}

fn write_response(ctx: &Context, task: &Task, paquet_id: u32, command_code: u32, subcode: u32, mut body: Chain) {
    let pilot = PaquetPilot {
        signature: DIALOGUE_SIGNATURE,
        paquet_id,
        command_code,
        command_subcode: subcode,
        payload_size: body.len() as u32,
    };

    let mut out = Chain::new();
    if pilot.write(&ctx.pool, &mut out).is_err() {
        task.record_fault(TaskFault::WriteToSocketFailed);
        return;
    }

    let payload_size = body.len();
    if payload_size > 0 {
        body.rewind();
        match body.get_data(payload_size) {
            Ok(bytes) => {
                if out.put_data(&ctx.pool, &bytes).is_err() {
                    task.record_fault(TaskFault::WriteToSocketFailed);
                    return;
                }
            }
            Err(_) => {
                task.record_fault(TaskFault::WriteToSocketFailed);
                return;
            }
        }
    }

    out.rewind();
    let total = out.len();
    match out.get_data(total) {
        Ok(bytes) => {
            if task.send(&bytes).is_err() {
                task.record_fault(TaskFault::WriteToSocketFailed);
            }
        }
        Err(_) => task.record_fault(TaskFault::WriteToSocketFailed),
    }
}
