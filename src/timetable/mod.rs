//! Timetable layout and conflict detection.
//!
//! Everything here is pure: callers pass a snapshot of blocks and receive fresh
//! output. Persistence and rendering live outside this module.

pub mod block;
pub mod cache;
pub mod cluster;
pub mod conflict;
pub mod error;
pub mod layout;
pub mod slots;
pub mod time;

pub use block::{group_by_day, DayOfWeek, TimeBlock, TimeBlockRecord};
pub use cache::LayoutCache;
pub use conflict::{check_conflicts, ConflictAxes, ScheduleCandidate};
pub use error::TimetableError;
pub use layout::LayoutOptions;
