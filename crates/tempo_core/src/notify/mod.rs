//! Task reminder alarms and the notifications they produce.
//!
//! # Responsibility
//! - Compute reminder and overdue fire times from task due dates.
//! - Drive a platform alarm backend, preferring exact alarms.
//! - Render fired alarms into actionable notifications and route the actions
//!   back into the task repository.
//!
//! # Invariants
//! - No alarm is ever scheduled at or before the current instant.
//! - Every alarm has a persisted `(task_id, kind)` request code, so
//!   cancellation never depends on recomputing an identity.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod alarm_ids;
pub mod boot;
pub mod receiver;
pub mod scheduler;

pub use alarm_ids::AlarmIdRegistry;

/// Which of a task's one-shot alarms a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlarmKind {
    /// Fires `reminder_minutes` before the due date.
    Reminder,
    /// Fires at the due date.
    Overdue,
    /// Fires after the user chose "snooze" on a notification.
    Snooze,
}

impl AlarmKind {
    pub const ALL: [AlarmKind; 3] = [Self::Reminder, Self::Overdue, Self::Snooze];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Overdue => "overdue",
            Self::Snooze => "snooze",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// One alarm handed to the platform, echoed back when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRequest {
    pub request_code: i32,
    pub task_id: String,
    pub task_title: String,
    pub kind: AlarmKind,
    pub fire_at_ms: i64,
}

/// How the platform accepted an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Exact,
    /// Allowed to drift; used when exact alarms are not permitted.
    Inexact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// The platform refused the exact-alarm capability.
    ExactAlarmDenied,
    Backend(String),
}

impl Display for AlarmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactAlarmDenied => write!(f, "exact alarm permission denied"),
            Self::Backend(message) => write!(f, "alarm backend failure: {message}"),
        }
    }
}

impl Error for AlarmError {}

/// Platform one-shot alarm service.
pub trait AlarmBackend: Send + Sync {
    fn schedule_exact(&self, request: &AlarmRequest) -> Result<(), AlarmError>;
    fn schedule_inexact(&self, request: &AlarmRequest) -> Result<(), AlarmError>;
    fn cancel(&self, request_code: i32) -> Result<(), AlarmError>;
}

/// Button attached to a task notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    MarkComplete,
    Snooze,
}

impl NotificationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarkComplete => "mark_complete",
            Self::Snooze => "snooze",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::MarkComplete, Self::Snooze]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MarkComplete => "Mark complete",
            Self::Snooze => "Snooze 15 min",
        }
    }
}

/// Visible notification rendered from a fired alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_id: i32,
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// Platform notification surface.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: &Notification);
}

#[derive(Debug)]
pub enum SchedulerError {
    Alarm(AlarmError),
    Ids(DbError),
    RequestCodeExhausted(i64),
    LockPoisoned,
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alarm(err) => write!(f, "{err}"),
            Self::Ids(err) => write!(f, "alarm id registry failure: {err}"),
            Self::RequestCodeExhausted(value) => {
                write!(f, "request code {value} does not fit in i32")
            }
            Self::LockPoisoned => write!(f, "scheduler lock poisoned"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Alarm(err) => Some(err),
            Self::Ids(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AlarmError> for SchedulerError {
    fn from(value: AlarmError) -> Self {
        Self::Alarm(value)
    }
}

impl From<DbError> for SchedulerError {
    fn from(value: DbError) -> Self {
        Self::Ids(value)
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Ids(DbError::Sqlite(value))
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::{AlarmKind, NotificationAction};

    #[test]
    fn host_names_parse_case_insensitively() {
        assert_eq!(AlarmKind::parse(" Overdue "), Some(AlarmKind::Overdue));
        assert_eq!(AlarmKind::parse("nap"), None);
        assert_eq!(
            NotificationAction::parse("MARK_COMPLETE"),
            Some(NotificationAction::MarkComplete)
        );
        assert_eq!(NotificationAction::parse("dismiss"), None);
    }
}
