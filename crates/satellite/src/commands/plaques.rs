use std::sync::Arc;

use mmps::Chain;

use super::{require_profile_id, require_session_id, with_handle};
use crate::context::Context;
use crate::error::{TaskFault, TaskResult};
use crate::task::Task;
use dbpool::sql::procedures;
use dbpool::validate;

pub fn create_plaque(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let latitude = f64::from_bits(input.get_i64()? as u64);
    let longitude = f64::from_bits(input.get_i64()? as u64);
    let inscription = input.get_string()?;

    let plaque_id = with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_double(Some(latitude));
        handle.push_double(Some(longitude));
        handle.push_varchar(Some(inscription));
        let rows = handle.execute(procedures::CREATE_PLAQUE).map_err(TaskFault::from)?;
        validate::tuples_ok(&ctx.logger, "create_plaque", procedures::CREATE_PLAQUE, &rows).map_err(TaskFault::from)?;
        Ok::<i64, TaskFault>(rows[0].get::<_, i64>(0))
    })?;

    let mut output = Chain::new();
    output.put_i64(&ctx.pool, plaque_id)?;
    Ok(output)
}

pub fn change_plaque_location(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let latitude = f64::from_bits(input.get_i64()? as u64);
    let longitude = f64::from_bits(input.get_i64()? as u64);

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_double(Some(latitude));
        handle.push_double(Some(longitude));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_LOCATION).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_location", procedures::CHANGE_PLAQUE_LOCATION, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

pub fn change_plaque_orientation(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let orientation = f32::from_bits(input.get_i32()? as u32);

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_real(Some(orientation));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_ORIENTATION).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_orientation", procedures::CHANGE_PLAQUE_ORIENTATION, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

pub fn change_plaque_size(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let size = f32::from_bits(input.get_i32()? as u32);

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_real(Some(size));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_SIZE).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_size", procedures::CHANGE_PLAQUE_SIZE, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

pub fn change_plaque_colors(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let packed_argb = input.get_i32()?;

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_integer(Some(packed_argb));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_COLORS).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_colors", procedures::CHANGE_PLAQUE_COLORS, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

pub fn change_plaque_font(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let font_id = input.get_i32()?;

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_integer(Some(font_id));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_FONT).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_font", procedures::CHANGE_PLAQUE_FONT, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

pub fn change_plaque_inscription(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let profile_id = require_profile_id(task)?;
    let plaque_id = input.get_i64()?;
    let inscription = input.get_string()?;

    with_handle(ctx, |handle| {
        handle.push_bigint(Some(profile_id));
        handle.push_bigint(Some(plaque_id));
        handle.push_varchar(Some(inscription));
        let rows = handle.execute(procedures::CHANGE_PLAQUE_INSCRIPTION).map_err(TaskFault::from)?;
        validate::command_ok(&ctx.logger, "change_plaque_inscription", procedures::CHANGE_PLAQUE_INSCRIPTION, rows.len() as u64)
            .map_err(TaskFault::from)
    })?;
    Ok(Chain::new())
}

/// One row's worth of a downloaded plaque, as it goes out over the wire: id, position,
/// orientation, size, packed colors, font id, and the inscription text.
struct PlaqueRecord {
    plaque_id: i64,
    latitude: f64,
    longitude: f64,
    orientation: f32,
    size: f32,
    colors: i32,
    font_id: i32,
    inscription: String,
}

pub fn download_plaques(ctx: &Context, _task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let count = input.get_i32()? as usize;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(input.get_i64()?);
    }

    let records = with_handle(ctx, |handle| {
        let mut records = Vec::with_capacity(ids.len());
        for plaque_id in &ids {
            handle.push_bigint(Some(*plaque_id));
            let rows = handle.execute(procedures::DOWNLOAD_PLAQUES).map_err(TaskFault::from)?;
            validate::tuples_ok(&ctx.logger, "download_plaques", procedures::DOWNLOAD_PLAQUES, &rows).map_err(TaskFault::from)?;
            let row = &rows[0];
            records.push(PlaqueRecord {
                plaque_id: row.get::<_, i64>(0),
                latitude: row.get::<_, f64>(1),
                longitude: row.get::<_, f64>(2),
                orientation: row.get::<_, f32>(3),
                size: row.get::<_, f32>(4),
                colors: row.get::<_, i32>(5),
                font_id: row.get::<_, i32>(6),
                inscription: row.get::<_, String>(7),
            });
        }
        Ok::<Vec<PlaqueRecord>, TaskFault>(records)
    })?;

    let mut output = Chain::new();
    output.put_i32(&ctx.pool, records.len() as i32)?;
    for record in records {
        output.put_i64(&ctx.pool, record.plaque_id)?;
        output.put_i64(&ctx.pool, record.latitude.to_bits() as i64)?;
        output.put_i64(&ctx.pool, record.longitude.to_bits() as i64)?;
        output.put_i32(&ctx.pool, record.orientation.to_bits() as i32)?;
        output.put_i32(&ctx.pool, record.size.to_bits() as i32)?;
        output.put_i32(&ctx.pool, record.colors)?;
        output.put_i32(&ctx.pool, record.font_id)?;
        output.put_string(&ctx.pool, &record.inscription)?;
    }
    Ok(output)
}

pub fn list_plaques_in_sight(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let session_id = require_session_id(task)?;
    let latitude = f64::from_bits(input.get_i64()? as u64);
    let longitude = f64::from_bits(input.get_i64()? as u64);

    let ids = with_handle(ctx, |handle| {
        handle.push_bigint(Some(session_id));
        handle.push_double(Some(latitude));
        handle.push_double(Some(longitude));
        let rows = handle.execute(procedures::QUERY_PLAQUES_IN_SIGHT).map_err(TaskFault::from)?;
        Ok::<Vec<i64>, TaskFault>(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    })?;

    let mut output = Chain::new();
    output.put_i32(&ctx.pool, ids.len() as i32)?;
    for id in ids {
        output.put_i64(&ctx.pool, id)?;
    }
    Ok(output)
}

pub fn list_plaques_on_map(ctx: &Context, task: &Arc<Task>, input: &mut Chain) -> TaskResult<Chain> {
    let session_id = require_session_id(task)?;
    let zoom_level = input.get_i32()?;

    let ids = with_handle(ctx, |handle| {
        handle.push_bigint(Some(session_id));
        handle.push_integer(Some(zoom_level));
        let rows = handle.execute(procedures::QUERY_PLAQUES_ON_MAP).map_err(TaskFault::from)?;
        Ok::<Vec<i64>, TaskFault>(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    })?;

    let mut output = Chain::new();
    output.put_i32(&ctx.pool, ids.len() as i32)?;
    for id in ids {
        output.put_i64(&ctx.pool, id)?;
    }
    Ok(output)
}
