use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimetableError {
    #[error("invalid time {value:?}: expected HH:MM with hour 0-23 and minute 00-59")]
    InvalidTimeFormat { value: String },

    #[error("invalid block range {start}-{end}: end must be after start")]
    InvalidBlockRange { start: String, end: String },

    #[error("invalid day of week {value:?}")]
    InvalidDay { value: String },

    #[error("slot interval must be a positive number of minutes, got {minutes}")]
    InvalidSlotInterval { minutes: i64 },

    #[error("invalid layout options: {message}")]
    InvalidLayoutOptions { message: String },
}

impl TimetableError {
    /// Stable machine code surfaced over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            TimetableError::InvalidTimeFormat { .. } => "invalid_time_format",
            TimetableError::InvalidBlockRange { .. } => "invalid_block_range",
            TimetableError::InvalidDay { .. } => "invalid_day",
            TimetableError::InvalidSlotInterval { .. } => "invalid_slot_interval",
            TimetableError::InvalidLayoutOptions { .. } => "invalid_layout_options",
        }
    }
}

pub type TimetableResult<T> = Result<T, TimetableError>;
