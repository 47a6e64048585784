//! Device position updates. The client posts its position on each of three channels — on-radar
//! (coarse proximity), in-sight (nearby plaques worth rendering), on-map (whatever the user's
//! current map viewport covers) — and each write bumps the revision counter that the affected
//! sessions' `broadcast_subscribe` paquets are long-polling on.

use std::sync::Arc;

use mmps::Chain;

use super::{require_device_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;
use dbpool::sql::procedures;
use dbpool::validate;

/// One device displacement report, per `paquetDisplacement` (`Satellite/paquet.h`). `course` and
/// `floor_level` are each guarded by their own "available" flag, since a device without a
/// magnetometer or barometer cannot supply them.
struct Displacement {
    altitude: f32,
    course: Option<f32>,
    floor_level: Option<i32>,
    range: f32,
    latitude: f64,
    longitude: f64,
}

impl Displacement {
    fn read(input: &mut Chain) -> TaskResult<Displacement> {
        let latitude = f64::from_bits(input.get_i64()? as u64);
        let longitude = f64::from_bits(input.get_i64()? as u64);
        let altitude = f32::from_bits(input.get_i32()? as u32);
        let course_available = input.get_u8()? != 0;
        let course_bits = input.get_i32()? as u32;
        let floor_level_available = input.get_u8()? != 0;
        let floor_level_bits = input.get_i32()?;
        let range = f32::from_bits(input.get_i32()? as u32);
        Ok(Displacement {
            latitude,
            longitude,
            altitude,
            course: course_available.then(|| f32::from_bits(course_bits)),
            floor_level: floor_level_available.then_some(floor_level_bits),
            range,
        })
    }
}

pub fn displacement_on_radar(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    record_displacement(ctx, task, input, procedures::DISPLACEMENT_ON_RADAR, "displacement_on_radar")
}

pub fn displacement_in_sight(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    record_displacement(ctx, task, input, procedures::DISPLACEMENT_IN_SIGHT, "displacement_in_sight")
}

pub fn displacement_on_map(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    record_displacement(ctx, task, input, procedures::DISPLACEMENT_ON_MAP, "displacement_on_map")
}

/// Shared by all three channels: they differ only in which revision counter the stored
/// procedure bumps, not in the payload shape or the parameters passed to it.
fn record_displacement(ctx: &Context, task: &Arc<Task>, input: &mut Chain, sql: &'static str, caller: &'static str) -> TaskResult<Chain> {
    let device_id = require_device_id(task)?;
    let displacement = Displacement::read(input)?;

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(device_id));
        handle.push_double(Some(displacement.latitude));
        handle.push_double(Some(displacement.longitude));
        handle.push_real(Some(displacement.range));
        let rows = handle.execute(sql).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, caller, sql, rows.len() as u64).map_err(TaskFault::from)?;

        handle.push_bigint(Some(device_id));
        handle.push_double(Some(displacement.latitude));
        handle.push_double(Some(displacement.longitude));
        handle.push_real(Some(displacement.altitude));
        handle.push_real(displacement.course);
        handle.push_integer(displacement.floor_level);
        let rows = handle.execute(procedures::REGISTER_MOVEMENT).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "register_movement", procedures::REGISTER_MOVEMENT, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;

    plat_log::logging::debug!(
        ctx.logger,
        "recorded a device displacement";
        "caller" => caller,
        "altitude" => displacement.altitude,
        "course" => ?displacement.course,
        "floor_level" => ?displacement.floor_level,
        "range" => displacement.range,
    );

    Ok(Chain::new())
}
