use crate::timetable::error::{TimetableError, TimetableResult};
use crate::timetable::time::{duration, to_minutes, to_time_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    /// Monday is 0.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Capitalized name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        let day = match t.as_str() {
            "monday" | "mon" => DayOfWeek::Monday,
            "tuesday" | "tue" => DayOfWeek::Tuesday,
            "wednesday" | "wed" => DayOfWeek::Wednesday,
            "thursday" | "thu" => DayOfWeek::Thursday,
            "friday" | "fri" => DayOfWeek::Friday,
            "saturday" | "sat" => DayOfWeek::Saturday,
            "sunday" | "sun" => DayOfWeek::Sunday,
            _ => {
                return Err(TimetableError::InvalidDay {
                    value: s.to_string(),
                })
            }
        };
        Ok(day)
    }
}

impl TryFrom<String> for DayOfWeek {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayOfWeek> for String {
    fn from(day: DayOfWeek) -> Self {
        day.as_str().to_string()
    }
}

/// Resource identities a block occupies. Only the conflict detector reads these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceKeys {
    /// Sorted and deduplicated.
    pub student_ids: Vec<String>,
    pub teacher_id: Option<String>,
    pub classroom_id: Option<String>,
}

impl ResourceKeys {
    pub fn new(
        student_ids: impl IntoIterator<Item = String>,
        teacher_id: Option<String>,
        classroom_id: Option<String>,
    ) -> Self {
        let mut student_ids: Vec<String> = student_ids
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        student_ids.sort();
        student_ids.dedup();
        Self {
            student_ids,
            teacher_id: non_empty(teacher_id),
            classroom_id: non_empty(classroom_id),
        }
    }

    pub fn shares_student(&self, other: &ResourceKeys) -> bool {
        // Both sides are sorted.
        let (mut i, mut j) = (0, 0);
        while i < self.student_ids.len() && j < other.student_ids.len() {
            match self.student_ids[i].cmp(&other.student_ids[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Loosely-typed block as it arrives from the data-access boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlockRecord {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "day")]
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub student_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Opaque rendering payload carried through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayMeta {
    pub color: Option<String>,
    pub label: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// A validated scheduled block. Times are minutes since midnight with `start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimeBlockRecord", into = "TimeBlockRecord")]
pub struct TimeBlock {
    pub id: String,
    pub day: DayOfWeek,
    pub start: u32,
    pub end: u32,
    pub title: String,
    pub owners: ResourceKeys,
    pub display: DisplayMeta,
}

impl TimeBlock {
    pub fn start_time(&self) -> String {
        to_time_string(self.start)
    }

    pub fn end_time(&self) -> String {
        to_time_string(self.end)
    }

    pub fn duration(&self) -> u32 {
        self.end - self.start
    }

    pub fn entry(&self) -> ScheduleEntry {
        ScheduleEntry {
            day: self.day,
            start: self.start,
            end: self.end,
        }
    }
}

impl TryFrom<TimeBlockRecord> for TimeBlock {
    type Error = TimetableError;

    fn try_from(r: TimeBlockRecord) -> Result<Self, Self::Error> {
        let entry = ScheduleEntry::parse(&r.day_of_week, &r.start_time, &r.end_time)?;
        let students = r.student_id.into_iter().chain(r.student_ids);
        Ok(TimeBlock {
            id: r.id.trim().to_string(),
            day: entry.day,
            start: entry.start,
            end: entry.end,
            title: r.title,
            owners: ResourceKeys::new(students, r.teacher_id, r.classroom_id),
            display: DisplayMeta {
                color: r.color,
                label: r.label,
                meta: r.meta,
            },
        })
    }
}

impl From<TimeBlock> for TimeBlockRecord {
    fn from(b: TimeBlock) -> Self {
        TimeBlockRecord {
            id: b.id,
            day_of_week: b.day.as_str().to_string(),
            start_time: to_time_string(b.start),
            end_time: to_time_string(b.end),
            title: b.title,
            student_id: None,
            student_ids: b.owners.student_ids,
            teacher_id: b.owners.teacher_id,
            classroom_id: b.owners.classroom_id,
            color: b.display.color,
            label: b.display.label,
            meta: b.display.meta,
        }
    }
}

/// Buckets blocks by day, keeping input order within each day.
pub fn group_by_day(blocks: impl IntoIterator<Item = TimeBlock>) -> BTreeMap<DayOfWeek, Vec<TimeBlock>> {
    let mut out: BTreeMap<DayOfWeek, Vec<TimeBlock>> = BTreeMap::new();
    for b in blocks {
        out.entry(b.day).or_default().push(b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntryRecord {
    #[serde(alias = "day")]
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

/// One day/time occurrence, e.g. a single weekly slot of a recurring class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ScheduleEntryRecord")]
pub struct ScheduleEntry {
    pub day: DayOfWeek,
    pub start: u32,
    pub end: u32,
}

impl ScheduleEntry {
    pub fn parse(day: &str, start_time: &str, end_time: &str) -> TimetableResult<Self> {
        let day: DayOfWeek = day.parse()?;
        let start = to_minutes(start_time)?;
        let length = duration(start_time, end_time)?;
        Ok(ScheduleEntry {
            day,
            start,
            end: start + length,
        })
    }
}

impl TryFrom<ScheduleEntryRecord> for ScheduleEntry {
    type Error = TimetableError;

    fn try_from(r: ScheduleEntryRecord) -> Result<Self, Self::Error> {
        ScheduleEntry::parse(&r.day_of_week, &r.start_time, &r.end_time)
    }
}
