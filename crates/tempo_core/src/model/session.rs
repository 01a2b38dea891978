//! Pomodoro session model.
//!
//! # Responsibility
//! - Define one recorded focus or break interval.
//! - Keep the denormalized `date` string derivable from `start_time`.
//!
//! # Invariants
//! - `date` equals the local calendar date of `start_time`.
//! - Sessions are immutable once recorded, except for date backfills.

use crate::clock::{local_date_string, MINUTE_MS};
use crate::model::{new_id, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Longest interval a single session may record.
pub const MAX_SESSION_MINUTES: i64 = 24 * 60;

/// Kind of timed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::ShortBreak => "SHORT_BREAK",
            Self::LongBreak => "LONG_BREAK",
        }
    }

    /// Parses a stored kind name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WORK" => Some(Self::Work),
            "SHORT_BREAK" => Some(Self::ShortBreak),
            "LONG_BREAK" => Some(Self::LongBreak),
            _ => None,
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, Self::Work)
    }
}

/// One completed (or abandoned) Pomodoro interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(rename = "sessionType")]
    pub kind: SessionKind,
    pub duration_minutes: i64,
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    /// Local `YYYY-MM-DD` of `start_time`, kept for range queries.
    #[serde(default)]
    pub date: String,
}

impl PomodoroSession {
    /// Creates a completed session that ended `duration_minutes` after start.
    ///
    /// `end_time` is `None` when the end does not fit in an `i64`; such a
    /// duration is rejected by `validate`.
    pub fn completed(
        kind: SessionKind,
        duration_minutes: i64,
        start_time: i64,
        task_id: Option<String>,
    ) -> Self {
        Self {
            id: new_id(),
            task_id,
            kind,
            duration_minutes,
            start_time,
            end_time: duration_minutes
                .checked_mul(MINUTE_MS)
                .and_then(|span| start_time.checked_add(span)),
            is_completed: true,
            date: local_date_string(start_time),
        }
    }

    /// Date string implied by `start_time`.
    pub fn derived_date(&self) -> String {
        local_date_string(self.start_time)
    }

    pub fn has_consistent_date(&self) -> bool {
        self.date == self.derived_date()
    }

    /// Minutes this session contributes to focus totals.
    pub fn focus_minutes(&self) -> i64 {
        if self.kind == SessionKind::Work && self.is_completed {
            self.duration_minutes
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.trim().is_empty() {
            return Err(ModelValidationError::EmptyId);
        }
        if self.duration_minutes <= 0 {
            return Err(ModelValidationError::NonPositiveDuration(
                self.duration_minutes,
            ));
        }
        if self.duration_minutes > MAX_SESSION_MINUTES {
            return Err(ModelValidationError::DurationTooLong {
                value: self.duration_minutes,
                max: MAX_SESSION_MINUTES,
            });
        }
        if let Some(end_time) = self.end_time {
            if end_time < self.start_time {
                return Err(ModelValidationError::EndBeforeStart {
                    start_time: self.start_time,
                    end_time,
                });
            }
        }
        Ok(())
    }
}
