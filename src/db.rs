use crate::timetable::{DayOfWeek, TimeBlock, TimeBlockRecord};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::path::Path;

pub const DB_FILE: &str = "timetable.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_blocks(
            id TEXT PRIMARY KEY,
            day_of_week TEXT NOT NULL,
            day_index INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            start_minute INTEGER NOT NULL,
            end_minute INTEGER NOT NULL,
            title TEXT NOT NULL,
            teacher_id TEXT,
            classroom_id TEXT,
            student_ids_json TEXT NOT NULL,
            display_json TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_blocks_day ON timetable_blocks(day_index, start_minute)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_blocks_teacher ON timetable_blocks(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_blocks_classroom ON timetable_blocks(classroom_id)",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else { return Ok(None) };
    let v = serde_json::from_str(&raw).with_context(|| format!("settings {} is not json", key))?;
    Ok(Some(v))
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

/// Stored blocks ordered by day, start, end, id. Rows that no longer validate are
/// reported, not skipped.
pub fn blocks_list(conn: &Connection, day: Option<DayOfWeek>) -> anyhow::Result<Vec<TimeBlock>> {
    let mut stmt = conn.prepare(
        "SELECT id, day_of_week, start_time, end_time, title, teacher_id, classroom_id,
                student_ids_json, display_json
         FROM timetable_blocks
         WHERE (?1 IS NULL OR day_index = ?1)
         ORDER BY day_index, start_minute, end_minute, id",
    )?;
    let rows = stmt
        .query_map([day.map(|d| i64::from(d.index()))], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, Option<String>>(5)?,
                r.get::<_, Option<String>>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, Option<String>>(8)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, day_of_week, start_time, end_time, title, teacher_id, classroom_id, students, display) in rows {
        let student_ids: Vec<String> = serde_json::from_str(&students)
            .with_context(|| format!("block {} has malformed student ids", id))?;
        let display: serde_json::Value = match display {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("block {} has malformed display payload", id))?,
            None => serde_json::Value::Null,
        };
        let record = TimeBlockRecord {
            id: id.clone(),
            day_of_week,
            start_time,
            end_time,
            title,
            student_id: None,
            student_ids,
            teacher_id,
            classroom_id,
            color: display.get("color").and_then(|v| v.as_str()).map(str::to_string),
            label: display.get("label").and_then(|v| v.as_str()).map(str::to_string),
            meta: display.get("meta").filter(|v| !v.is_null()).cloned(),
        };
        let block = TimeBlock::try_from(record).with_context(|| format!("stored block {} is invalid", id))?;
        out.push(block);
    }
    Ok(out)
}

pub fn block_upsert(conn: &Connection, block: &TimeBlock) -> anyhow::Result<()> {
    let display = json!({
        "color": block.display.color,
        "label": block.display.label,
        "meta": block.display.meta,
    });
    let updated_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO timetable_blocks(
            id, day_of_week, day_index, start_time, end_time, start_minute, end_minute,
            title, teacher_id, classroom_id, student_ids_json, display_json, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            day_of_week = excluded.day_of_week,
            day_index = excluded.day_index,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            start_minute = excluded.start_minute,
            end_minute = excluded.end_minute,
            title = excluded.title,
            teacher_id = excluded.teacher_id,
            classroom_id = excluded.classroom_id,
            student_ids_json = excluded.student_ids_json,
            display_json = excluded.display_json,
            updated_at = excluded.updated_at",
        rusqlite::params![
            block.id,
            block.day.as_str(),
            i64::from(block.day.index()),
            block.start_time(),
            block.end_time(),
            i64::from(block.start),
            i64::from(block.end),
            block.title,
            block.owners.teacher_id,
            block.owners.classroom_id,
            serde_json::to_string(&block.owners.student_ids)?,
            display.to_string(),
            updated_at,
        ],
    )?;
    Ok(())
}

pub fn block_delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM timetable_blocks WHERE id = ?", [id])?;
    Ok(n > 0)
}
