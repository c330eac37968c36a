use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::timetable::block::TimeBlockRecord;
use crate::timetable::conflict::ScheduleCandidateRecord;
use crate::timetable::{ConflictAxes, DayOfWeek, LayoutOptions, ScheduleCandidate, TimeBlock};
use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};

pub const SETUP_TIMETABLE_KEY: &str = "setup.timetable";

pub fn db_conn<'a>(state: &'a AppState) -> Result<&'a Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn optional_day(req: &Request, key: &str) -> Result<Option<DayOfWeek>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a string", key)))?;
            Ok(Some(s.parse()?))
        }
    }
}

pub fn optional_bool(req: &Request, key: &str, default: bool) -> Result<bool, HandlerErr> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be boolean", key))),
    }
}

/// Validates one loosely-typed record into a block.
pub fn parse_block(v: &JsonValue) -> Result<TimeBlock, HandlerErr> {
    let record: TimeBlockRecord = serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("malformed block: {}", e)))?;
    Ok(TimeBlock::try_from(record)?)
}

/// Parses `params[key]` as a block array, reporting the index of the first bad record.
pub fn parse_blocks(req: &Request, key: &str) -> Result<Option<Vec<TimeBlock>>, HandlerErr> {
    let Some(raw) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let items = raw
        .as_array()
        .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be an array", key)))?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let block = parse_block(item).map_err(|e| e.with_details(json!({ "field": key, "index": i })))?;
        out.push(block);
    }
    Ok(Some(out))
}

/// Blocks from `params[key]` when given, otherwise the workspace store.
pub fn blocks_from_params_or_store(
    state: &AppState,
    req: &Request,
    key: &str,
) -> Result<Vec<TimeBlock>, HandlerErr> {
    if let Some(blocks) = parse_blocks(req, key)? {
        return Ok(blocks);
    }
    let conn = db_conn(state)?;
    db::blocks_list(conn, None).map_err(|e| HandlerErr::db("db_query_failed", e))
}

pub fn parse_candidate(req: &Request) -> Result<ScheduleCandidate, HandlerErr> {
    let raw = req
        .params
        .get("candidate")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing candidate"))?;
    let record: ScheduleCandidateRecord = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("malformed candidate: {}", e)))?;
    let candidate = ScheduleCandidate::try_from(record)?;
    if candidate.entries.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            "candidate needs dayOfWeek/startTime/endTime or entries",
        ));
    }
    Ok(candidate)
}

pub fn parse_axes(req: &Request) -> Result<ConflictAxes, HandlerErr> {
    match req.params.get("axes") {
        None => Ok(ConflictAxes::default()),
        Some(v) if v.is_null() => Ok(ConflictAxes::default()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("malformed axes: {}", e))),
    }
}

/// Persisted layout defaults. Saved keys that fail to apply fall back to the
/// built-in value so a bad saved section never blocks rendering; a store that
/// cannot be read is an error.
pub fn load_layout_setup(conn: Option<&Connection>) -> Result<LayoutOptions, HandlerErr> {
    let saved = match conn {
        Some(c) => db::settings_get_json(c, SETUP_TIMETABLE_KEY)
            .map_err(|e| HandlerErr::db("db_query_failed", e))?,
        None => None,
    };
    let obj = saved.and_then(|v| v.as_object().cloned()).unwrap_or_default();
    let mut opts = LayoutOptions::default();
    if opts.apply_patch(&obj).is_ok() && opts.validate().is_ok() {
        return Ok(opts);
    }
    tracing::warn!(key = SETUP_TIMETABLE_KEY, "saved layout setup is invalid, applying valid keys only");
    opts = LayoutOptions::default();
    for (k, v) in obj {
        let mut single = serde_json::Map::new();
        single.insert(k, v);
        let mut candidate = opts.clone();
        if candidate.apply_patch(&single).is_ok() && candidate.validate().is_ok() {
            opts = candidate;
        }
    }
    Ok(opts)
}

/// Persisted defaults overridden by `params.options`, strictly validated.
pub fn layout_options(state: &AppState, req: &Request) -> Result<LayoutOptions, HandlerErr> {
    let mut opts = load_layout_setup(state.db.as_ref())?;
    if let Some(raw) = req.params.get("options").filter(|v| !v.is_null()) {
        let patch = raw
            .as_object()
            .ok_or_else(|| HandlerErr::new("bad_params", "options must be an object"))?;
        opts.apply_patch(patch)?;
    }
    opts.validate()?;
    Ok(opts)
}
