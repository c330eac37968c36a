use crate::timetable::error::{TimetableError, TimetableResult};

/// Parses a wall-clock `HH:MM` (or `H:MM`) string into minutes since midnight.
///
/// Hours run 0-23 and minutes must be exactly two digits. Surrounding whitespace
/// is not stripped. A malformed value is an error, never midnight.
pub fn to_minutes(time: &str) -> TimetableResult<u32> {
    let invalid = || TimetableError::InvalidTimeFormat {
        value: time.to_string(),
    };
    let (h, m) = time.split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(invalid());
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Formats minutes since midnight as zero-padded `HH:MM`.
pub fn to_time_string(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Length of `start..end` in minutes. Non-positive ranges are rejected.
pub fn duration(start: &str, end: &str) -> TimetableResult<u32> {
    let s = to_minutes(start)?;
    let e = to_minutes(end)?;
    if e <= s {
        return Err(TimetableError::InvalidBlockRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(e - s)
}

/// Half-open overlap test: touching ranges (`a_end == b_start`) do not overlap.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}
