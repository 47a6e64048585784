//! Free-form diagnostic messages a client posts when it wants to flag something for a human to
//! look at later (a paquet it couldn't decode, a rendering glitch, anything not worth its own
//! command code). `category` lets the stored procedure route different kinds of reports without
//! the server having to parse `message`.

use std::sync::Arc;

use mmps::Chain;

use super::{require_device_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;
use dbpool::sql::procedures;
use dbpool::validate;

pub fn report_message(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let device_id = require_device_id(task)?;
    let category = input.get_u8()?;
    let message = input.get_string()?;

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_char(Some(category as i8));
        handle.push_varchar(Some(message));
        let rows = handle.execute(procedures::REPORT_MESSAGE).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "report_message", procedures::REPORT_MESSAGE, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;

    Ok(Chain::new())
}
