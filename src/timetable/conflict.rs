use crate::timetable::block::{
    DayOfWeek, ResourceKeys, ScheduleEntry, ScheduleEntryRecord, TimeBlock,
};
use crate::timetable::error::TimetableError;
use crate::timetable::time::{overlaps, to_time_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictAxis {
    Student,
    Teacher,
    Classroom,
}

impl ConflictAxis {
    pub const ALL: [ConflictAxis; 3] = [
        ConflictAxis::Student,
        ConflictAxis::Teacher,
        ConflictAxis::Classroom,
    ];

    fn label(self) -> &'static str {
        match self {
            ConflictAxis::Student => "Student",
            ConflictAxis::Teacher => "Teacher",
            ConflictAxis::Classroom => "Classroom",
        }
    }
}

/// Which axes to evaluate. Absent flags default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConflictAxes {
    pub student: bool,
    pub teacher: bool,
    pub classroom: bool,
}

impl Default for ConflictAxes {
    fn default() -> Self {
        Self {
            student: true,
            teacher: true,
            classroom: true,
        }
    }
}

impl ConflictAxes {
    fn enabled(&self, axis: ConflictAxis) -> bool {
        match axis {
            ConflictAxis::Student => self.student,
            ConflictAxis::Teacher => self.teacher,
            ConflictAxis::Classroom => self.classroom,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCandidateRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub classroom_id: Option<String>,
    #[serde(default)]
    pub entries: Vec<ScheduleEntryRecord>,
    #[serde(default, alias = "day")]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// A proposed block, possibly spanning several weekly entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScheduleCandidateRecord")]
pub struct ScheduleCandidate {
    /// Set when editing an existing block; that block is excluded from the check.
    pub id: Option<String>,
    pub title: String,
    pub owners: ResourceKeys,
    pub entries: Vec<ScheduleEntry>,
}

impl ScheduleCandidate {
    pub fn from_block(block: &TimeBlock) -> Self {
        Self {
            id: Some(block.id.clone()).filter(|s| !s.is_empty()),
            title: block.title.clone(),
            owners: block.owners.clone(),
            entries: vec![block.entry()],
        }
    }
}

impl TryFrom<ScheduleCandidateRecord> for ScheduleCandidate {
    type Error = TimetableError;

    fn try_from(r: ScheduleCandidateRecord) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(r.entries.len() + 1);
        if let Some(day) = r.day_of_week.as_deref() {
            entries.push(ScheduleEntry::parse(
                day,
                r.start_time.as_deref().unwrap_or_default(),
                r.end_time.as_deref().unwrap_or_default(),
            )?);
        }
        for e in r.entries {
            entries.push(ScheduleEntry::try_from(e)?);
        }
        let students = r.student_id.into_iter().chain(r.student_ids);
        Ok(ScheduleCandidate {
            id: r.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            title: r.title,
            owners: ResourceKeys::new(students, r.teacher_id, r.classroom_id),
            entries,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub axis: ConflictAxis,
    pub block_id: String,
    pub title: String,
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub candidate_start_time: String,
    pub candidate_end_time: String,
    /// The shared teacher, classroom, or student ids.
    pub resource_ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingResourceKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAxis {
    pub axis: ConflictAxis,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerAxisConflicts {
    pub student: Vec<Conflict>,
    pub teacher: Vec<Conflict>,
    pub classroom: Vec<Conflict>,
}

impl PerAxisConflicts {
    fn slot(&mut self, axis: ConflictAxis) -> &mut Vec<Conflict> {
        match axis {
            ConflictAxis::Student => &mut self.student,
            ConflictAxis::Teacher => &mut self.teacher,
            ConflictAxis::Classroom => &mut self.classroom,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub per_axis_conflicts: PerAxisConflicts,
    pub all_conflicts: Vec<Conflict>,
    pub skipped_axes: Vec<SkippedAxis>,
}

/// Shared resource ids between candidate and block on `axis`, or `None` when the
/// candidate lacks the key for that axis.
fn shared_resources(
    axis: ConflictAxis,
    candidate: &ResourceKeys,
    existing: &ResourceKeys,
) -> Option<Vec<String>> {
    match axis {
        ConflictAxis::Teacher => {
            let t = candidate.teacher_id.as_ref()?;
            Some(match existing.teacher_id.as_ref() {
                Some(other) if other == t => vec![t.clone()],
                _ => Vec::new(),
            })
        }
        ConflictAxis::Classroom => {
            let r = candidate.classroom_id.as_ref()?;
            Some(match existing.classroom_id.as_ref() {
                Some(other) if other == r => vec![r.clone()],
                _ => Vec::new(),
            })
        }
        ConflictAxis::Student => {
            if candidate.student_ids.is_empty() {
                return None;
            }
            if !candidate.shares_student(existing) {
                return Some(Vec::new());
            }
            Some(
                candidate
                    .student_ids
                    .iter()
                    .filter(|s| existing.student_ids.binary_search(*s).is_ok())
                    .cloned()
                    .collect(),
            )
        }
    }
}

fn axis_key_missing(axis: ConflictAxis, keys: &ResourceKeys) -> bool {
    match axis {
        ConflictAxis::Student => keys.student_ids.is_empty(),
        ConflictAxis::Teacher => keys.teacher_id.is_none(),
        ConflictAxis::Classroom => keys.classroom_id.is_none(),
    }
}

/// Checks `candidate` against every existing block on every enabled axis.
///
/// Axes are independent and nothing short-circuits: every overlap on every axis and
/// every candidate entry is reported. An axis whose key the candidate lacks is
/// skipped rather than failing the check.
pub fn check_conflicts(
    candidate: &ScheduleCandidate,
    existing_by_day: &BTreeMap<DayOfWeek, Vec<TimeBlock>>,
    axes: ConflictAxes,
) -> ConflictReport {
    let mut report = ConflictReport::default();

    for axis in ConflictAxis::ALL {
        if !axes.enabled(axis) {
            continue;
        }
        if axis_key_missing(axis, &candidate.owners) {
            report.skipped_axes.push(SkippedAxis {
                axis,
                reason: SkipReason::MissingResourceKey,
            });
            continue;
        }

        for entry in &candidate.entries {
            let Some(day_blocks) = existing_by_day.get(&entry.day) else {
                continue;
            };
            for block in day_blocks {
                if block.day != entry.day {
                    continue;
                }
                if candidate.id.as_deref() == Some(block.id.as_str()) {
                    continue;
                }
                let Some(shared) = shared_resources(axis, &candidate.owners, &block.owners) else {
                    continue;
                };
                if shared.is_empty() || !overlaps(entry.start, entry.end, block.start, block.end) {
                    continue;
                }
                report
                    .per_axis_conflicts
                    .slot(axis)
                    .push(conflict_entry(axis, entry, block, shared));
            }
        }
    }

    let per_axis = &report.per_axis_conflicts;
    report.all_conflicts = per_axis
        .student
        .iter()
        .chain(&per_axis.teacher)
        .chain(&per_axis.classroom)
        .cloned()
        .collect();
    report.has_conflict = !report.all_conflicts.is_empty();
    report
}

fn conflict_entry(
    axis: ConflictAxis,
    entry: &ScheduleEntry,
    block: &TimeBlock,
    resource_ids: Vec<String>,
) -> Conflict {
    let start_time = to_time_string(block.start);
    let end_time = to_time_string(block.end);
    let name = if block.title.trim().is_empty() {
        block.id.as_str()
    } else {
        block.title.as_str()
    };
    let message = format!(
        "{} conflict: {} on {} {}-{}",
        axis.label(),
        name,
        block.day.label(),
        start_time,
        end_time
    );
    Conflict {
        axis,
        block_id: block.id.clone(),
        title: block.title.clone(),
        day: block.day,
        start_time,
        end_time,
        candidate_start_time: to_time_string(entry.start),
        candidate_end_time: to_time_string(entry.end),
        resource_ids,
        message,
    }
}
