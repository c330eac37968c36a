pub mod blocks;
pub mod core;
pub mod setup;
pub mod timetable;
