use crate::timetable::block::{group_by_day, DayOfWeek, TimeBlock};
use crate::timetable::cluster::{cluster_day, Cluster};
use crate::timetable::error::{TimetableError, TimetableResult};
use crate::timetable::slots::{generate_slots_from_data, SlotGrid};
use crate::timetable::time::{to_minutes, to_time_string};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Rendering configuration for the timetable grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: u32,
    pub pixels_per_minute: f64,
    /// Pixels trimmed from the bottom of each block so back-to-back blocks stay apart.
    pub gutter: f64,
    pub min_block_height: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            start_time: "08:00".to_string(),
            end_time: "18:00".to_string(),
            slot_minutes: 30,
            pixels_per_minute: 1.0,
            gutter: 2.0,
            min_block_height: 20.0,
        }
    }
}

impl LayoutOptions {
    /// Checks every field and returns the grid bounds in minutes.
    pub fn validate(&self) -> TimetableResult<(u32, u32)> {
        let start = to_minutes(&self.start_time)?;
        let end = to_minutes(&self.end_time)?;
        if end <= start {
            return Err(TimetableError::InvalidBlockRange {
                start: self.start_time.clone(),
                end: self.end_time.clone(),
            });
        }
        if self.slot_minutes == 0 {
            return Err(TimetableError::InvalidSlotInterval { minutes: 0 });
        }
        if !(self.pixels_per_minute.is_finite() && self.pixels_per_minute > 0.0) {
            return Err(invalid_option("pixelsPerMinute must be positive"));
        }
        if !(self.gutter.is_finite() && self.gutter >= 0.0) {
            return Err(invalid_option("gutter must not be negative"));
        }
        if !(self.min_block_height.is_finite() && self.min_block_height >= 0.0) {
            return Err(invalid_option("minBlockHeight must not be negative"));
        }
        Ok((start, end))
    }

    /// Overrides fields present in `patch`. Unknown keys are ignored; a present key
    /// with the wrong type is an error.
    pub fn apply_patch(&mut self, patch: &Map<String, JsonValue>) -> TimetableResult<()> {
        for (key, value) in patch {
            match key.as_str() {
                "startTime" => self.start_time = patch_str(key, value)?,
                "endTime" => self.end_time = patch_str(key, value)?,
                "slotMinutes" => {
                    let v = value
                        .as_i64()
                        .ok_or_else(|| invalid_option(format!("{key} must be an integer")))?;
                    if v <= 0 || v > i64::from(u32::MAX) {
                        return Err(TimetableError::InvalidSlotInterval { minutes: v });
                    }
                    self.slot_minutes = v as u32;
                }
                "pixelsPerMinute" => self.pixels_per_minute = patch_f64(key, value)?,
                "gutter" => self.gutter = patch_f64(key, value)?,
                "minBlockHeight" => self.min_block_height = patch_f64(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn invalid_option(message: impl Into<String>) -> TimetableError {
    TimetableError::InvalidLayoutOptions {
        message: message.into(),
    }
}

fn patch_str(key: &str, value: &JsonValue) -> TimetableResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_option(format!("{key} must be a string")))
}

fn patch_f64(key: &str, value: &JsonValue) -> TimetableResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid_option(format!("{key} must be a number")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAssignment {
    /// Position of the block in the caller's input slice.
    pub index: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterColumns {
    /// In placement order: start asc, end asc, input index asc.
    pub assignments: Vec<ColumnAssignment>,
    pub column_count: usize,
}

/// Greedy first-fit track assignment for one cluster.
///
/// Blocks are visited by `(start, end, input index)`. Before placing a block every
/// track whose occupant has ended by the block's start is released, and the block
/// takes the lowest released track or opens a new one. `column_count` is the peak
/// number of simultaneously occupied tracks and is shared by the whole cluster.
pub fn assign_columns(cluster: &Cluster<'_>) -> ClusterColumns {
    let mut order: Vec<_> = cluster.members.iter().collect();
    order.sort_by_key(|m| (m.block.start, m.block.end, m.index));

    let mut active: Vec<(u32, usize)> = Vec::with_capacity(order.len());
    let mut free: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    let mut assignments = Vec::with_capacity(order.len());
    let mut column_count = 0;

    for m in order {
        let start = m.block.start;
        active.retain(|&(end, column)| {
            if end <= start {
                free.push(Reverse(column));
                false
            } else {
                true
            }
        });
        // Every opened track is either active or free, so with nothing free the
        // next unused track number equals the active count.
        let column = match free.pop() {
            Some(Reverse(c)) => c,
            None => active.len(),
        };
        active.push((m.block.end, column));
        column_count = column_count.max(active.len());
        assignments.push(ColumnAssignment {
            index: m.index,
            column,
        });
    }

    ClusterColumns {
        assignments,
        column_count,
    }
}

/// Vertical scale shared by every day of one layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub origin: u32,
    pub pixels_per_minute: f64,
    pub gutter: f64,
    pub min_block_height: f64,
}

impl Geometry {
    pub fn top(&self, start: u32) -> f64 {
        f64::from(start.saturating_sub(self.origin)) * self.pixels_per_minute
    }

    pub fn height(&self, duration: u32) -> f64 {
        let raw = f64::from(duration) * self.pixels_per_minute - self.gutter;
        raw.max(self.min_block_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaidOutBlock {
    #[serde(flatten)]
    pub block: TimeBlock,
    pub cluster_index: usize,
    pub column_index: usize,
    pub column_count: usize,
    pub left_percent: f64,
    pub width_percent: f64,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLayout {
    pub day: DayOfWeek,
    pub cluster_count: usize,
    /// Widest cluster of the day.
    pub max_column_count: usize,
    pub blocks: Vec<LaidOutBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekLayout {
    pub origin: String,
    pub end: String,
    pub total_height: f64,
    pub slots: Vec<String>,
    pub days: Vec<DayLayout>,
}

/// Lays out blocks that all fall on `day`.
pub fn layout_day(day: DayOfWeek, blocks: &[TimeBlock], geometry: &Geometry) -> DayLayout {
    debug_assert!(blocks.iter().all(|b| b.day == day));
    let clusters = cluster_day(blocks);
    let mut laid_out = Vec::with_capacity(blocks.len());
    let mut max_column_count = 0;
    for (cluster_index, cluster) in clusters.iter().enumerate() {
        let columns = assign_columns(cluster);
        let count = columns.column_count.max(1);
        max_column_count = max_column_count.max(count);
        let width = 100.0 / count as f64;
        for a in &columns.assignments {
            let b = &blocks[a.index];
            laid_out.push(LaidOutBlock {
                block: b.clone(),
                cluster_index,
                column_index: a.column,
                column_count: count,
                left_percent: a.column as f64 * width,
                width_percent: width,
                top: geometry.top(b.start),
                height: geometry.height(b.duration()),
            });
        }
    }
    DayLayout {
        day,
        cluster_count: clusters.len(),
        max_column_count,
        blocks: laid_out,
    }
}

/// Lays out a whole set of blocks. Days without blocks are omitted.
///
/// The grid grows past the configured bounds when a block starts earlier or ends
/// later, so every block gets a non-negative `top`.
pub fn layout_week(blocks: &[TimeBlock], options: &LayoutOptions) -> TimetableResult<WeekLayout> {
    let (grid_start, grid_end) = options.validate()?;
    let origin = blocks
        .iter()
        .map(|b| b.start)
        .min()
        .map_or(grid_start, |m| m.min(grid_start));
    let end = blocks
        .iter()
        .map(|b| b.end)
        .max()
        .map_or(grid_end, |m| m.max(grid_end));
    let geometry = Geometry {
        origin,
        pixels_per_minute: options.pixels_per_minute,
        gutter: options.gutter,
        min_block_height: options.min_block_height,
    };

    let grid = SlotGrid::new(grid_start, grid_end, i64::from(options.slot_minutes))?;
    let slots = generate_slots_from_data(&grid, blocks);
    let days = group_by_day(blocks.iter().cloned())
        .into_iter()
        .map(|(day, day_blocks)| layout_day(day, &day_blocks, &geometry))
        .collect();

    Ok(WeekLayout {
        origin: to_time_string(origin),
        end: to_time_string(end),
        total_height: f64::from(end - origin) * options.pixels_per_minute,
        slots,
        days,
    })
}
