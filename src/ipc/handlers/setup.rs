use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{load_layout_setup, SETUP_TIMETABLE_KEY};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

#[derive(Clone, Copy)]
enum SetupSection {
    Timetable,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "timetable" => Some(Self::Timetable),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Timetable => SETUP_TIMETABLE_KEY,
        }
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match load_layout_setup(Some(conn)) {
        Ok(timetable) => ok(&req.id, json!({ "timetable": timetable })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let loaded = match section {
        SetupSection::Timetable => load_layout_setup(Some(conn)),
    };
    let mut current = match loaded {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = current.apply_patch(patch_obj).and_then(|_| current.validate()) {
        return err(&req.id, e.code(), e.to_string(), None);
    }
    let value = json!(current);
    if let Err(e) = db::settings_set_json(conn, section.key(), &value) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, "setup section updated");
    ok(&req.id, json!({ "ok": true, "timetable": value }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
