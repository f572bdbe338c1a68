//! Cron expression parsing and evaluation.
//!
//! Six fields, seconds first:
//! ```text
//! ┌───────────── second (0-59)
//! │ ┌───────────── minute (0-59)
//! │ │ ┌───────────── hour (0-23)
//! │ │ │ ┌───────────── day of month (1-31, ?)
//! │ │ │ │ ┌───────────── month (1-12, JAN-DEC)
//! │ │ │ │ │ ┌───────────── day of week (0-7, SUN-SAT, ?; 0 and 7 are Sunday)
//! │ │ │ │ │ │
//! * * * * * *
//! ```
//! A classic five-field expression is read as if it had a leading `0` second.
//! Day of month and day of week must both match.

mod field;
mod schedule;

pub use self::field::{CronField, FieldKind};
pub use self::schedule::CronSchedule;

/// Errors that can occur when parsing cron expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronParseError {
    #[error("invalid cron expression: expected 5 or 6 fields, got {0}")]
    InvalidFieldCount(usize),
    #[error("invalid {field} '{token}': {reason}")]
    InvalidField {
        field: &'static str,
        token: String,
        reason: String,
    },
    #[error("value {value} is out of range [{min}, {max}] for {field}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("invalid range: {0}-{1}")]
    InvalidRange(u32, u32),
    #[error("invalid step value: {0}")]
    InvalidStep(String),
}
