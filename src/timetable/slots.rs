use crate::timetable::block::TimeBlock;
use crate::timetable::error::{TimetableError, TimetableResult};
use crate::timetable::time::{to_minutes, to_time_string};
use std::collections::BTreeSet;

/// Bounds and step of a uniform label grid, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    pub start: u32,
    pub end: u32,
    pub interval: u32,
}

impl SlotGrid {
    pub fn new(start: u32, end: u32, interval: i64) -> TimetableResult<Self> {
        if interval <= 0 || interval > i64::from(u32::MAX) {
            return Err(TimetableError::InvalidSlotInterval { minutes: interval });
        }
        if end <= start {
            return Err(TimetableError::InvalidBlockRange {
                start: to_time_string(start),
                end: to_time_string(end),
            });
        }
        Ok(Self {
            start,
            end,
            interval: interval as u32,
        })
    }

    pub fn parse(start_bound: &str, end_bound: &str, interval: i64) -> TimetableResult<Self> {
        Self::new(to_minutes(start_bound)?, to_minutes(end_bound)?, interval)
    }

    fn minutes(&self) -> impl Iterator<Item = u32> + '_ {
        (self.start..=self.end).step_by(self.interval as usize)
    }
}

/// Uniform labels from `start` to `end`; `end` is included only when it falls on a step.
pub fn generate_slots(grid: &SlotGrid) -> Vec<String> {
    grid.minutes().map(to_time_string).collect()
}

/// Uniform labels plus every block boundary, deduplicated and ascending by minute.
pub fn generate_slots_from_data(grid: &SlotGrid, blocks: &[TimeBlock]) -> Vec<String> {
    let mut all: BTreeSet<u32> = grid.minutes().collect();
    for b in blocks {
        all.insert(b.start);
        all.insert(b.end);
    }
    all.into_iter().map(to_time_string).collect()
}
