//! Handling of delivered alarms and notification actions.
//!
//! # Responsibility
//! - Turn a fired alarm into a visible notification.
//! - Route notification buttons back into the same completion use-case the
//!   timer screen runs.
//!
//! # Invariants
//! - Alarms for missing or already completed tasks are dropped silently.
//! - `MarkComplete` leaves the task with no pending alarms, counts it in the
//!   profile and spawns the next occurrence of a recurring task.

use super::scheduler::NotificationScheduler;
use super::{
    AlarmKind, AlarmRequest, Notification, NotificationAction, NotificationSink, SchedulerError,
};
use crate::repo::RepoError;
use crate::service::completion::TaskCompletion;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum ActionError {
    TaskNotFound(String),
    Repo(RepoError),
    Scheduler(SchedulerError),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(task_id) => write!(f, "task not found: {task_id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Scheduler(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TaskNotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Scheduler(err) => Some(err),
        }
    }
}

impl From<RepoError> for ActionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SchedulerError> for ActionError {
    fn from(value: SchedulerError) -> Self {
        Self::Scheduler(value)
    }
}

pub struct AlarmReceiver {
    completion: TaskCompletion,
    scheduler: Arc<NotificationScheduler>,
    sink: Arc<dyn NotificationSink>,
}

impl AlarmReceiver {
    /// `completion` is bound to `scheduler` so both paths share one set of
    /// alarms.
    pub fn new(
        completion: TaskCompletion,
        scheduler: Arc<NotificationScheduler>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            completion: completion.with_scheduler(Arc::clone(&scheduler)),
            scheduler,
            sink,
        }
    }

    /// Shows the notification for a delivered alarm.
    ///
    /// Returns the rendered notification, or `None` when the task is gone or
    /// already done.
    pub fn on_alarm(&self, request: &AlarmRequest) -> Option<Notification> {
        if let Err(err) = self.scheduler.mark_fired(request) {
            warn!("event=alarm_fired module=notify status=degraded error={err}");
        }
        let task = match self.completion.tasks().get_task(&request.task_id) {
            Some(task) if !task.is_completed => task,
            _ => {
                info!(
                    "event=alarm_fired module=notify status=skipped kind={}",
                    request.kind.as_str()
                );
                return None;
            }
        };

        let notification = self.render(request, &task.title);
        self.sink.show(&notification);
        info!(
            "event=alarm_fired module=notify status=ok kind={}",
            request.kind.as_str()
        );
        Some(notification)
    }

    /// Applies a notification button press.
    pub fn on_action(&self, task_id: &str, action: NotificationAction) -> Result<(), ActionError> {
        let task = self
            .completion
            .tasks()
            .get_task(task_id)
            .ok_or_else(|| ActionError::TaskNotFound(task_id.to_string()))?;
        match action {
            NotificationAction::MarkComplete => {
                self.completion.complete(&task)?;
                self.scheduler.cancel_task(task_id)?;
            }
            NotificationAction::Snooze => {
                self.scheduler.snooze(task_id, &task.title)?;
            }
        }
        info!("event=notification_action module=notify status=ok action={action:?}");
        Ok(())
    }

    fn render(&self, request: &AlarmRequest, title: &str) -> Notification {
        let (heading, body) = match request.kind {
            AlarmKind::Reminder => (
                "Task due soon".to_string(),
                format!(
                    "\"{title}\" is due in {} minutes",
                    self.scheduler.reminder_minutes()
                ),
            ),
            AlarmKind::Overdue => (
                "Task overdue".to_string(),
                format!("\"{title}\" has passed its due date"),
            ),
            AlarmKind::Snooze => ("Reminder".to_string(), format!("\"{title}\" is still open")),
        };
        Notification {
            notification_id: request.request_code,
            task_id: request.task_id.clone(),
            title: heading,
            body,
            actions: vec![NotificationAction::MarkComplete, NotificationAction::Snooze],
        }
    }
}
