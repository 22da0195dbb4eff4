use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SleepError {
    #[error("Invalid time format: {0:?}. Use HH:MM (e.g., 07:15)")]
    InvalidTime(String),

    #[error("Invalid date format: {0:?}. Use YYYY-MM-DD (e.g., 2025-01-15)")]
    InvalidDate(String),

    #[error("Invalid target: {0:?}. Use a nap number (1, 2, 3) or 'night'")]
    InvalidTarget(String),

    #[error("No prediction for today. Run 'baby-sleep predict <wake_time>' first.")]
    NoWakeTimeToday,

    #[error("Invalid nap number {number}. Expected 1-{max}")]
    NapOutOfRange { number: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, SleepError>;
