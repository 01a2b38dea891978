//! Domain model for tasks, Pomodoro sessions and user profiles.
//!
//! # Responsibility
//! - Define the records mirrored from the per-user document store.
//! - Own field-level validation shared by repository write paths.
//!
//! # Invariants
//! - Every record is identified by an opaque, stable string id.
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod profile;
pub mod session;
pub mod task;

/// Validation failure raised before a record is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyId,
    EmptyTitle,
    NegativeCount { field: &'static str, value: i64 },
    NonPositiveDuration(i64),
    DurationTooLong { value: i64, max: i64 },
    EndBeforeStart { start_time: i64, end_time: i64 },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "id cannot be empty"),
            Self::EmptyTitle => write!(f, "title cannot be empty"),
            Self::NegativeCount { field, value } => {
                write!(f, "{field} cannot be negative, got {value}")
            }
            Self::NonPositiveDuration(value) => {
                write!(f, "duration must be positive, got {value} minutes")
            }
            Self::DurationTooLong { value, max } => {
                write!(f, "duration cannot exceed {max} minutes, got {value}")
            }
            Self::EndBeforeStart {
                start_time,
                end_time,
            } => write!(
                f,
                "session end {end_time} is earlier than start {start_time}"
            ),
        }
    }
}

impl Error for ModelValidationError {}

/// Generates a fresh opaque document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
