use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_conn, optional_bool, optional_day, parse_axes, parse_block, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{check_conflicts, group_by_day, ScheduleCandidate};
use serde_json::json;

fn blocks_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let day = optional_day(req, "day")?;
    let blocks = db::blocks_list(conn, day).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "blocks": blocks }))
}

/// Check-then-act write: the conflict check runs against the stored snapshot
/// immediately before the insert, on the same connection.
fn blocks_upsert(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let raw = req
        .params
        .get("block")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing block"))?;
    let mut block = parse_block(raw)?;
    let axes = parse_axes(req)?;
    let force = optional_bool(req, "force", false)?;
    if block.id.is_empty() {
        block.id = uuid::Uuid::new_v4().to_string();
    }

    let same_day = db::blocks_list(conn, Some(block.day))
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let report = check_conflicts(
        &ScheduleCandidate::from_block(&block),
        &group_by_day(same_day),
        axes,
    );
    if report.has_conflict && !force {
        tracing::info!(
            block = %block.id,
            conflicts = report.all_conflicts.len(),
            "block write refused"
        );
        let first = report
            .all_conflicts
            .first()
            .map(|c| c.message.clone())
            .unwrap_or_else(|| "conflict".to_string());
        return Err(HandlerErr::new("conflict", first).with_details(json!(report)));
    }

    db::block_upsert(conn, &block).map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    tracing::info!(block = %block.id, day = %block.day, forced = report.has_conflict, "block stored");
    Ok(json!({
        "blockId": block.id,
        "block": block,
        "conflicts": report,
    }))
}

fn blocks_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = required_str(req, "id")?;
    let removed = db::block_delete(conn, &id).map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if !removed {
        return Err(HandlerErr::new("not_found", "block not found"));
    }
    tracing::info!(block = %id, "block deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "blocks.list" => blocks_list(state, req),
        "blocks.upsert" => blocks_upsert(state, req),
        "blocks.delete" => blocks_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
