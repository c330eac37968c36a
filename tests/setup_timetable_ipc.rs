use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn is_ok(v: &serde_json::Value) -> bool {
    v.get("ok").and_then(|v| v.as_bool()) == Some(true)
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        is_ok(&value),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn timetable_setup_persists_and_drives_defaults() {
    let workspace = temp_dir("timetabled-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        defaults["timetable"],
        json!({
            "startTime": "08:00",
            "endTime": "18:00",
            "slotMinutes": 30,
            "pixelsPerMinute": 1.0,
            "gutter": 2.0,
            "minBlockHeight": 20.0
        })
    );

    let slots = request_ok(&mut stdin, &mut reader, "3", "timetable.slots", json!({}));
    let slots = slots["slots"].as_array().expect("slots");
    assert_eq!(slots.len(), 21);
    assert_eq!(slots[0].as_str(), Some("08:00"));
    assert_eq!(slots[20].as_str(), Some("18:00"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({
            "section": "timetable",
            "patch": { "startTime": "09:00", "endTime": "10:00", "slotMinutes": 20 }
        }),
    );
    let updated = request_ok(&mut stdin, &mut reader, "5", "setup.get", json!({}));
    assert_eq!(updated["timetable"]["slotMinutes"].as_u64(), Some(20));
    assert_eq!(updated["timetable"]["gutter"].as_f64(), Some(2.0));

    let slots = request_ok(&mut stdin, &mut reader, "6", "timetable.slots", json!({}));
    assert_eq!(slots["slots"], json!(["09:00", "09:20", "09:40", "10:00"]));

    // Per-request values override the stored section.
    let slots = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "timetable.slots",
        json!({ "slotMinutes": 25 }),
    );
    assert_eq!(slots["slots"], json!(["09:00", "09:25", "09:50"]));

    let from_data = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "timetable.slots",
        json!({
            "fromData": true,
            "blocks": [ { "dayOfWeek": "monday", "startTime": "09:05", "endTime": "09:50" } ]
        }),
    );
    assert_eq!(
        from_data["slots"],
        json!(["09:00", "09:05", "09:20", "09:40", "09:50", "10:00"])
    );

    // Reopening the workspace keeps the section.
    drop(stdin);
    let _ = child.wait();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let reopened = request_ok(&mut stdin, &mut reader, "10", "setup.get", json!({}));
    assert_eq!(reopened["timetable"]["startTime"].as_str(), Some("09:00"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_setup_updates_are_rejected_and_not_stored() {
    let workspace = temp_dir("timetabled-setup-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let zero = request(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "timetable", "patch": { "slotMinutes": 0 } }),
    );
    assert_eq!(zero["error"]["code"].as_str(), Some("invalid_slot_interval"));

    let inverted = request(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "timetable", "patch": { "startTime": "17:00", "endTime": "09:00" } }),
    );
    assert_eq!(inverted["ok"].as_bool(), Some(false));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "reports", "patch": {} }),
    );
    assert_eq!(unknown["error"]["code"].as_str(), Some("bad_params"));

    let current = request_ok(&mut stdin, &mut reader, "5", "setup.get", json!({}));
    assert_eq!(current["timetable"]["slotMinutes"].as_u64(), Some(30));
    assert_eq!(current["timetable"]["startTime"].as_str(), Some("08:00"));

    let bad_interval = request(
        &mut stdin,
        &mut reader,
        "6",
        "timetable.slots",
        json!({ "slotMinutes": -15 }),
    );
    assert_eq!(bad_interval["error"]["code"].as_str(), Some("invalid_slot_interval"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unreadable_saved_setup_is_reported_not_defaulted() {
    let workspace = temp_dir("timetabled-setup-unreadable");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    {
        let conn = rusqlite::Connection::open(workspace.join("timetable.sqlite3")).expect("open db");
        conn.execute(
            "INSERT INTO settings(key, value_json) VALUES('setup.timetable', '{not json')",
            [],
        )
        .expect("corrupt setup row");
    }

    let get = request(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(get["error"]["code"].as_str(), Some("db_query_failed"));

    let slots = request(&mut stdin, &mut reader, "3", "timetable.slots", json!({}));
    assert_eq!(slots["error"]["code"].as_str(), Some("db_query_failed"));

    let layout = request(&mut stdin, &mut reader, "4", "timetable.layout", json!({ "blocks": [] }));
    assert_eq!(layout["error"]["code"].as_str(), Some("db_query_failed"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn saved_setup_with_bad_values_keeps_the_valid_keys() {
    let workspace = temp_dir("timetabled-setup-partial");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    {
        let conn = rusqlite::Connection::open(workspace.join("timetable.sqlite3")).expect("open db");
        conn.execute(
            "INSERT INTO settings(key, value_json) VALUES('setup.timetable', ?)",
            [json!({ "slotMinutes": 0, "startTime": "09:00" }).to_string()],
        )
        .expect("write setup row");
    }

    let current = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(current["timetable"]["slotMinutes"].as_u64(), Some(30));
    assert_eq!(current["timetable"]["startTime"].as_str(), Some("09:00"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
