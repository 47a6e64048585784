//! The single long-poll paquet on the regular dialogue path. The client reports the last
//! revision triple it has seen; this handler answers immediately if the server is already ahead
//! (or if a later `broadcast_subscribe` on this task already advanced past it), otherwise it
//! parks the calling paquet worker thread on the task's rendezvous until the broadcaster's
//! consumer thread wakes it with a fresh revision, or `ctx.broadcast_wait` elapses.

use std::sync::Arc;

use mmps::Chain;

use super::{require_session_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::rendezvous::WhichChannel;
use crate::task::Task;
use crate::wire::Revisions;
use dbpool::sql::procedures;

pub fn broadcast_subscribe(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let session_id = require_session_id(task)?;
    let claimed = Revisions::read(input)?;
    let last_known = claimed.clamped_to(task.rendezvous.current());

    let mut output = Chain::new();
    match task.rendezvous.wait(last_known, ctx.broadcast_wait) {
        None => {
            output.put_u8(&ctx.pool, 0)?;
        }
        Some((channel, current)) => {
            let (sql, since, caller) = match channel {
                WhichChannel::OnRadar => (procedures::QUERY_PLAQUES_CHANGED_ON_RADAR, last_known.on_radar, "broadcast_subscribe:on_radar"),
                WhichChannel::InSight => (procedures::QUERY_PLAQUES_CHANGED_IN_SIGHT, last_known.in_sight, "broadcast_subscribe:in_sight"),
                WhichChannel::OnMap => (procedures::QUERY_PLAQUES_CHANGED_ON_MAP, last_known.on_map, "broadcast_subscribe:on_map"),
            };
            let _ = caller;

            let changes = with_handle(ctx, |handle| {
                handle.push_bigint(Some(session_id));
                handle.push_bigint(Some(since as i64));
                let rows = handle.execute(sql).map_err(TaskFault::from)?;
                Ok::<Vec<(Vec<u8>, i64, bool)>, TaskFault>(
                    rows.iter()
                        .map(|row| (row.get::<_, Vec<u8>>(0), row.get::<_, i64>(1), row.get::<_, bool>(2)))
                        .collect(),
                )
            })?;

            output.put_u8(&ctx.pool, 1)?;
            output.put_u8(&ctx.pool, channel as u8)?;
            output.put_i32(&ctx.pool, current.on_radar as i32)?;
            output.put_i32(&ctx.pool, current.in_sight as i32)?;
            output.put_i32(&ctx.pool, current.on_map as i32)?;
            output.put_i32(&ctx.pool, changes.len() as i32)?;
            for (token, revision, disappeared) in changes {
                output.put_data(&ctx.pool, &token)?;
                output.put_i64(&ctx.pool, revision)?;
                output.put_u8(&ctx.pool, disappeared as u8)?;
            }
        }
    }
    Ok(output)
}
