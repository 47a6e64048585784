//! Command dispatch table. Each paquet's `command_code` (from its `PaquetPilot`) selects one of
//! these handlers; the handler reads its own payload shape out of the input chain and returns a
//! freshly-built output chain carrying the response payload, which `paquet.rs` wraps in a
//! response `PaquetPilot` before writing it back to the task's socket.

mod broadcast;
mod displacement;
mod plaques;
mod profiles;
mod reports;
mod session;

use std::sync::Arc;

use mmps::Chain;

use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandCode {
    CreatePlaque = 100,
    ChangePlaqueLocation = 101,
    ChangePlaqueOrientation = 102,
    ChangePlaqueSize = 103,
    ChangePlaqueColors = 104,
    ChangePlaqueFont = 105,
    ChangePlaqueInscription = 106,
    DownloadPlaques = 107,
    ListPlaquesInSight = 108,
    ListPlaquesOnMap = 109,
    ValidateProfileName = 200,
    CreateProfile = 201,
    RegisterDevice = 202,
    DisplacementOnRadar = 300,
    DisplacementInSight = 301,
    DisplacementOnMap = 302,
    BroadcastSubscribe = 400,
    NotificationsToken = 500,
    ReportMessage = 600,
}

impl CommandCode {
    pub fn from_u32(value: u32) -> Option<CommandCode> {
        use CommandCode::*;
        Some(match value {
            100 => CreatePlaque,
            101 => ChangePlaqueLocation,
            102 => ChangePlaqueOrientation,
            103 => ChangePlaqueSize,
            104 => ChangePlaqueColors,
            105 => ChangePlaqueFont,
            106 => ChangePlaqueInscription,
            107 => DownloadPlaques,
            108 => ListPlaquesInSight,
            109 => ListPlaquesOnMap,
            200 => ValidateProfileName,
            201 => CreateProfile,
            202 => RegisterDevice,
            300 => DisplacementOnRadar,
            301 => DisplacementInSight,
            302 => DisplacementOnMap,
            400 => BroadcastSubscribe,
            500 => NotificationsToken,
            600 => ReportMessage,
            _ => return None,
        })
    }
}

/// Runs one paquet's handler to completion. `input` is the paquet's payload, already positioned
/// at its first byte; the returned chain is the response payload, not yet wrapped in a pilot.
pub fn dispatch(ctx: &Context, task: &Arc<Task>, command_code: u32, input: &mut Chain) -> TaskResult<Chain> {
    let command = CommandCode::from_u32(command_code).ok_or(TaskFault::Other("unknown command code"))?;

    match command {
        CommandCode::CreatePlaque => plaques::create_plaque(ctx, task, input),
        CommandCode::ChangePlaqueLocation => plaques::change_plaque_location(ctx, task, input),
        CommandCode::ChangePlaqueOrientation => plaques::change_plaque_orientation(ctx, task, input),
        CommandCode::ChangePlaqueSize => plaques::change_plaque_size(ctx, task, input),
        CommandCode::ChangePlaqueColors => plaques::change_plaque_colors(ctx, task, input),
        CommandCode::ChangePlaqueFont => plaques::change_plaque_font(ctx, task, input),
        CommandCode::ChangePlaqueInscription => plaques::change_plaque_inscription(ctx, task, input),
        CommandCode::DownloadPlaques => plaques::download_plaques(ctx, task, input),
        CommandCode::ListPlaquesInSight => plaques::list_plaques_in_sight(ctx, task, input),
        CommandCode::ListPlaquesOnMap => plaques::list_plaques_on_map(ctx, task, input),
        CommandCode::ValidateProfileName => profiles::validate_profile_name(ctx, task, input),
        CommandCode::CreateProfile => profiles::create_profile(ctx, task, input),
        CommandCode::RegisterDevice => profiles::register_device(ctx, task, input),
        CommandCode::DisplacementOnRadar => displacement::displacement_on_radar(ctx, task, input),
        CommandCode::DisplacementInSight => displacement::displacement_in_sight(ctx, task, input),
        CommandCode::DisplacementOnMap => displacement::displacement_on_map(ctx, task, input),
        CommandCode::BroadcastSubscribe => broadcast::broadcast_subscribe(ctx, task, input),
        CommandCode::NotificationsToken => session::notifications_token(ctx, task, input),
        CommandCode::ReportMessage => reports::report_message(ctx, task, input),
    }
}

/// Handlers share this shape: peek a handle, bind parameters, run one statement, and either
/// commit (success) or roll the handle's transaction back and reconnect (any error) before
/// propagating. Kept as a free function rather than a method on `Context` since not every
/// handler needs exactly one statement (`download_plaques` loops over several ids on one
/// handle), but all of them need this same peek/commit-or-reset bracket.
pub(crate) fn with_handle<T>(ctx: &Context, f: impl FnOnce(&mut dbpool::Handle) -> TaskResult<T>) -> TaskResult<T> {
    let mut handle = ctx.db.peek_handle().map_err(TaskFault::from)?;
    match f(&mut handle) {
        Ok(value) => {
            ctx.db.poke_handle(handle).map_err(TaskFault::from)?;
            Ok(value)
        }
        Err(err) => {
            let _ = ctx.db.reset_handle(handle);
            Err(err)
        }
    }
}

pub(crate) fn require_device_id(task: &Task) -> TaskResult<i64> {
    task.device_id.lock().ok_or(TaskFault::DeviceAuthenticationFailed)
}

pub(crate) fn require_profile_id(task: &Task) -> TaskResult<i64> {
    task.profile_id.lock().ok_or(TaskFault::ProfileAuthenticationFailed)
}

pub(crate) fn require_session_id(task: &Task) -> TaskResult<i64> {
    task.session_id.lock().ok_or(TaskFault::CannotGetSession)
}
