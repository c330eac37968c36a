use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    blocks_from_params_or_store, db_conn, layout_options, load_layout_setup, optional_bool, optional_day,
    parse_axes, parse_block, parse_blocks, parse_candidate,
};
use crate::ipc::types::{AppState, Request};
use crate::timetable::slots::{generate_slots, generate_slots_from_data, SlotGrid};
use crate::timetable::{check_conflicts, group_by_day, DayOfWeek, TimeBlock};
use serde_json::json;
use std::collections::BTreeMap;

fn timetable_layout(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let mut blocks = blocks_from_params_or_store(state, req, "blocks")?;
    if let Some(day) = optional_day(req, "day")? {
        blocks.retain(|b| b.day == day);
    }
    let options = layout_options(state, req)?;
    let (layout, cache_hit) = state.layouts.get_or_compute(&blocks, &options)?;
    tracing::debug!(blocks = blocks.len(), cache_hit, "timetable laid out");
    Ok(json!({
        "layout": &*layout,
        "options": options,
        "cacheHit": cache_hit,
    }))
}

/// `existing` may be a flat block array or an object keyed by day name.
fn existing_by_day(
    state: &AppState,
    req: &Request,
) -> Result<BTreeMap<DayOfWeek, Vec<TimeBlock>>, HandlerErr> {
    if let Some(obj) = req.params.get("existing").and_then(|v| v.as_object()) {
        let mut out: BTreeMap<DayOfWeek, Vec<TimeBlock>> = BTreeMap::new();
        for (key, items) in obj {
            let day: DayOfWeek = key.parse()?;
            let items = items.as_array().ok_or_else(|| {
                HandlerErr::new("bad_params", format!("existing.{} must be an array", key))
            })?;
            for (i, item) in items.iter().enumerate() {
                let details = || json!({ "field": format!("existing.{}", key), "index": i });
                let block = parse_block(item).map_err(|e| e.with_details(details()))?;
                if block.day != day {
                    return Err(HandlerErr::new(
                        "bad_params",
                        format!("block on {} filed under {}", block.day, day),
                    )
                    .with_details(details()));
                }
                out.entry(day).or_default().push(block);
            }
        }
        return Ok(out);
    }
    if let Some(blocks) = parse_blocks(req, "existing")? {
        return Ok(group_by_day(blocks));
    }
    let conn = db_conn(state)?;
    let stored = db::blocks_list(conn, None).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(group_by_day(stored))
}

fn timetable_check_conflicts(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let candidate = parse_candidate(req)?;
    let axes = parse_axes(req)?;
    let existing = existing_by_day(state, req)?;
    let report = check_conflicts(&candidate, &existing, axes);
    tracing::info!(
        candidate = candidate.id.as_deref().unwrap_or("-"),
        conflicts = report.all_conflicts.len(),
        skipped = report.skipped_axes.len(),
        "conflict check"
    );
    Ok(json!(report))
}

fn timetable_slots(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let defaults = load_layout_setup(state.db.as_ref())?;
    let start = req
        .params
        .get("startTime")
        .and_then(|v| v.as_str())
        .unwrap_or(defaults.start_time.as_str());
    let end = req
        .params
        .get("endTime")
        .and_then(|v| v.as_str())
        .unwrap_or(defaults.end_time.as_str());
    let interval = match req.params.get("slotMinutes") {
        None => i64::from(defaults.slot_minutes),
        Some(v) if v.is_null() => i64::from(defaults.slot_minutes),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::new("bad_params", "slotMinutes must be an integer"))?,
    };
    let grid = SlotGrid::parse(start, end, interval)?;

    let slots = if optional_bool(req, "fromData", false)? {
        let blocks = blocks_from_params_or_store(state, req, "blocks")?;
        generate_slots_from_data(&grid, &blocks)
    } else {
        generate_slots(&grid)
    };
    Ok(json!({ "slots": slots }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "timetable.layout" => timetable_layout(state, req),
        "timetable.checkConflicts" => timetable_check_conflicts(state, req),
        "timetable.slots" => timetable_slots(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
