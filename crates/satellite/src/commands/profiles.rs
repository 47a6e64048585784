use std::sync::Arc;

use mmps::Chain;

use super::{require_device_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;
use dbpool::sql::procedures;
use dbpool::validate;
use plat_log::TOKEN_SIZE;

pub fn validate_profile_name(ctx: &Context, _task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let name = input.get_string()?;

    let available = with_handle(ctx, |handle| {
        handle.push_varchar(Some(name));
        let rows = handle.execute(procedures::VALIDATE_PROFILE_NAME).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "validate_profile_name", procedures::VALIDATE_PROFILE_NAME, &rows)
            .map_err(TaskFault::from)?;
        Ok::<bool, TaskFault>(rows[0].get::<_, bool>(0))
    })?;

    let mut output = Chain::new();
    output.put_u8(&ctx.pool, available as u8)?;
    Ok(output)
}

pub fn create_profile(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let device_id = require_device_id(task)?;
    let name = input.get_string()?;

    let (profile_id, profile_token) = with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_varchar(Some(name));
        let rows = handle.execute(procedures::CREATE_PROFILE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "create_profile", procedures::CREATE_PROFILE, &rows).map_err(TaskFault::from)?;
        let row = &rows[0];
        let token_bytes = row.get::<_, Vec<u8>>(1);
        if token_bytes.len() != TOKEN_SIZE {
            return Err(TaskFault::UnexpectedDatabaseResult);
        }
        let mut token = [0u8; TOKEN_SIZE];
        token.copy_from_slice(&token_bytes);
        Ok::<(i64, [u8; TOKEN_SIZE]), TaskFault>((row.get::<_, i64>(0), token))
    })?;

    *task.profile_id.lock() = Some(profile_id);

    let mut output = Chain::new();
    output.put_data(&ctx.pool, &profile_token)?;
    Ok(output)
}

/// Re-registers the calling device, in case its stored device token was lost (app reinstall,
/// device wipe) and the client has nothing else to authenticate with on this paquet.
pub fn register_device(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let device_type = input.get_i16()? as i32;
    let mut application_build = vec![0u8; 6];
    application_build.copy_from_slice(&input.get_data(6)?);

    let (device_id, device_token) = with_handle(ctx, |handle| {
        handle.push_integer(Some(device_type));
        handle.push_bytea(Some(application_build));
        handle.push_bytea(None);
        let rows = handle.execute(procedures::REGISTER_DEVICE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "register_device", procedures::REGISTER_DEVICE, &rows).map_err(TaskFault::from)?;
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

    let mut output = Chain::new();
    output.put_data(&ctx.pool, &device_token)?;
    Ok(output)
}
