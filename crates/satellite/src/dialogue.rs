//! The handshake that runs once per connection, right after accept, before any ordinary paquet
//! is serviced. `DialogueDemande::dialogue_type` decides which of the two paths the task takes:
//! `Anticipant`, which registers a fresh device, hands it back a sixteen-byte device token, and
//! terminates the connection right there (`spec.md` §4.C.1: `Anticipant` has no `RegularLoop`),
//! or `Regular`, which authenticates an existing device, profile and session, replies with a
//! verdict, and leaves the task able to run the ordinary paquet loop.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use mmps::Chain;

use crate::commands::with_handle;
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::{DialogueState, Task};
use crate::wire::{DialogueAnticipant, DialogueDemande, DialogueType, DialogueVerdict, VerdictCode, Revisions, DIALOGUE_SIGNATURE};
use dbpool::sql::procedures;
use dbpool::validate;
use plat_log::TOKEN_SIZE;

fn read_exact_into_chain(stream: &mut TcpStream, pool: &mmps::Pool, n: usize) -> TaskResult<Chain> {
    let mut raw = vec![0u8; n];
    stream.read_exact(&mut raw).map_err(|err| TaskFault::from_receive_error(&err))?;
    let mut chain = Chain::new();
    chain.put_data(pool, &raw)?;
    chain.rewind();
    Ok(chain)
}

/// Runs the handshake to completion. On success the task's state is `Terminated` (anticipant
/// path: the device token has already been sent and there is nothing left to serve) or
/// `Authenticated` (regular path: the caller should enter the ordinary paquet loop); on failure
/// the task's state is `Rejected` or `Terminated` and the caller should close the connection
/// without entering the paquet loop either way.
pub fn run(ctx: &Context, task: &Arc<Task>, stream: &mut TcpStream) -> TaskResult<()> {
    let mut greeting = read_exact_into_chain(stream, &ctx.pool, DialogueDemande::SIZE)?;
    let demande = DialogueDemande::read(&mut greeting)?;
    if demande.signature != DIALOGUE_SIGNATURE {
        task.set_state(DialogueState::Rejected);
        return Err(TaskFault::MissingSignature);
    }
    task.set_state(DialogueState::DialogueReceived);

    match DialogueType::from_u32(demande.dialogue_type) {
        Some(DialogueType::Anticipant) => run_anticipant(ctx, task, stream),
        Some(DialogueType::Regular) => run_regular(ctx, task, stream, &demande),
        None => {
            task.set_state(DialogueState::Rejected);
            Err(TaskFault::Other("unknown dialogue type"))
        }
    }
}

fn run_anticipant(ctx: &Context, task: &Arc<Task>, stream: &mut TcpStream) -> TaskResult<()> {
    let mut chain = read_exact_into_chain(stream, &ctx.pool, DialogueAnticipant::SIZE)?;
    let anticipant = DialogueAnticipant::read(&mut chain)?;
    if anticipant.signature != DIALOGUE_SIGNATURE {
        task.set_state(DialogueState::Rejected);
        return Err(TaskFault::MissingSignature);
    }

    let (device_id, device_token) = with_handle(ctx, |handle| {
        handle.push_integer(Some(anticipant.device_type as i32));
        handle.push_bytea(Some(anticipant.application_build.to_vec()));
        handle.push_bytea(None);
        let rows = handle.execute(procedures::REGISTER_DEVICE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "dialogue::anticipant", procedures::REGISTER_DEVICE, &rows).map_err(TaskFault::from)?;
        let row = &rows[0];
        let token_bytes = row.get::<_, Vec<u8>>(1);
        if token_bytes.len() != TOKEN_SIZE {
            return Err(TaskFault::UnexpectedDatabaseResult);
        }
        let mut token = [0u8; TOKEN_SIZE];
        token.copy_from_slice(&token_bytes);
        Ok::<(i64, [u8; TOKEN_SIZE]), TaskFault>((row.get::<_, i64>(0), token))
    })?;

    *task.device_id.lock() = Some(device_id);
    task.set_state(DialogueState::Anticipant);
    send_device_token(stream, &device_token)?;
    task.set_state(DialogueState::Terminated);
    Ok(())
}

/// The anticipant path's whole response: the original's `sendFixed(task, &deviceToken,
/// sizeof(deviceToken))` (`Satellite/task_kernel.c:155-160`) — sixteen raw bytes, with no pilot
/// or verdict wrapper, since the anticipant dialogue ends the moment this is sent.
fn send_device_token(stream: &mut TcpStream, token: &[u8; TOKEN_SIZE]) -> TaskResult<()> {
    stream.write_all(token).map_err(|_| TaskFault::CannotSendDialogueVerdict)
}

fn run_regular(ctx: &Context, task: &Arc<Task>, stream: &mut TcpStream, demande: &DialogueDemande) -> TaskResult<()> {
    let device_id = with_handle(ctx, |handle| {
        handle.push_bytea(Some(demande.device_token.to_vec()));
        let rows = handle.execute(procedures::AUTHENTICATE_DEVICE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "dialogue::authenticate_device", procedures::AUTHENTICATE_DEVICE, &rows)
            .map_err(TaskFault::from)?;
        Ok::<i64, TaskFault>(rows[0].get::<_, i64>(0))
    });
    let device_id = match device_id {
        Ok(id) => id,
        Err(_) => return reject(ctx, stream, task, VerdictCode::InvalidDevice),
    };
    *task.device_id.lock() = Some(device_id);

    if !demande.has_profile_token() {
        return reject(ctx, stream, task, VerdictCode::InvalidProfile);
    }
    let profile_id = with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_bytea(Some(demande.profile_token.to_vec()));
        let rows = handle.execute(procedures::AUTHENTICATE_PROFILE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "dialogue::authenticate_profile", procedures::AUTHENTICATE_PROFILE, &rows)
            .map_err(TaskFault::from)?;
        Ok::<i64, TaskFault>(rows[0].get::<_, i64>(0))
    });
    let profile_id = match profile_id {
        Ok(id) => id,
        Err(_) => return reject(ctx, stream, task, VerdictCode::InvalidProfile),
    };
    *task.profile_id.lock() = Some(profile_id);

    let (session_id, session_token, verdict_code, revisions) = with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_bigint(Some(profile_id));
        let rows = handle.execute(procedures::GET_SESSION).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "dialogue::get_session", procedures::GET_SESSION, &rows).map_err(TaskFault::from)?;
        let row = &rows[0];
        let session_id = row.get::<_, i64>(0);
        let token_bytes = row.get::<_, Vec<u8>>(1);
        if token_bytes.len() != TOKEN_SIZE {
            return Err(TaskFault::UnexpectedDatabaseResult);
        }
        let mut token = [0u8; TOKEN_SIZE];
        token.copy_from_slice(&token_bytes);
        let verdict_code = if demande.has_session_token() && demande.session_token == token {
            VerdictCode::Welcome
        } else {
            VerdictCode::NewSession
        };
        let revisions = Revisions {
            on_radar: row.get::<_, i32>(2) as u32,
            in_sight: row.get::<_, i32>(3) as u32,
            on_map: row.get::<_, i32>(4) as u32,
        };
        Ok::<(i64, [u8; TOKEN_SIZE], VerdictCode, Revisions), TaskFault>((session_id, token, verdict_code, revisions))
    })?;

    *task.session_id.lock() = Some(session_id);
    task.rendezvous.update(revisions);
    ctx.registry.bind_session(session_id, task.id);

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(session_id));
        handle.push_bigint(Some(device_id));
        let rows = handle.execute(procedures::SET_SESSION_ONLINE).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "dialogue::set_session_online", procedures::SET_SESSION_ONLINE, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;

    send_verdict(
        ctx,
        stream,
        &DialogueVerdict {
            signature: DIALOGUE_SIGNATURE,
            verdict_code: verdict_code as u32,
            session_token,
        },
    )?;
    task.set_state(DialogueState::Authenticated);
    Ok(())
}

fn reject(ctx: &Context, stream: &mut TcpStream, task: &Arc<Task>, verdict_code: VerdictCode) -> TaskResult<()> {
    let _ = send_verdict(
        ctx,
        stream,
        &DialogueVerdict {
            signature: DIALOGUE_SIGNATURE,
            verdict_code: verdict_code as u32,
            session_token: [0u8; TOKEN_SIZE],
        },
    );
    task.set_state(DialogueState::Rejected);
    Err(TaskFault::DeviceAuthenticationFailed)
}

fn send_verdict(ctx: &Context, stream: &mut TcpStream, verdict: &DialogueVerdict) -> TaskResult<()> {
    let mut chain = Chain::new();
    verdict.write(&ctx.pool, &mut chain)?;
    chain.rewind();
    let bytes = chain.get_data(DialogueVerdict::SIZE)?;
    stream.write_all(&bytes).map_err(|_| TaskFault::CannotSendDialogueVerdict)
}
