//! Registers (or clears, on reinstall) the APNs device token the messenger uses to reach this
//! device while it's disconnected. Stored as raw bytes rather than the hex text the original
//! app-layer encoded it as before handing it to the database, since `push_bytea` already gives a
//! bytea column without needing a text round trip first.

use std::sync::Arc;

use mmps::Chain;

use super::{require_device_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;
use dbpool::sql::procedures;
use dbpool::validate;

const APNS_TOKEN_SIZE: usize = 32;

pub fn notifications_token(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let device_id = require_device_id(task)?;
    let present = input.get_u8()? != 0;
    let token = if present { Some(input.get_data(APNS_TOKEN_SIZE)?) } else { None };

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_bytea(token);
        let rows = handle.execute(procedures::SET_APNS_TOKEN).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "notifications_token", procedures::SET_APNS_TOKEN, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;

    Ok(Chain::new())
}
