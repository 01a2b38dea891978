//! Task completion shared by the timer screen and notification actions.
//!
//! # Responsibility
//! - Move a task into or out of completed state together with its side
//!   effects: profile count, alarms and the next recurring occurrence.
//!
//! # Invariants
//! - Each open to completed transition adds one to the profile count and
//!   each reopen takes one back, so the count never drifts with toggling.
//! - A completed task has no pending reminder or overdue alarms.
//! - Completing a recurring task with a due date creates its next occurrence.

use crate::clock::Clock;
use crate::model::task::Task;
use crate::notify::scheduler::NotificationScheduler;
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoResult;
use log::{info, warn};
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskCompletion {
    tasks: TaskRepository,
    profiles: ProfileRepository,
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<NotificationScheduler>>,
}

impl TaskCompletion {
    pub fn new(tasks: TaskRepository, profiles: ProfileRepository, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks,
            profiles,
            clock,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<NotificationScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn tasks(&self) -> &TaskRepository {
        &self.tasks
    }

    pub fn scheduler(&self) -> Option<&Arc<NotificationScheduler>> {
        self.scheduler.as_ref()
    }

    /// Completes `task` when it is still open and returns the spawned next
    /// occurrence, if any. An already completed task only loses its alarms.
    pub fn complete(&self, task: &Task) -> RepoResult<Option<Task>> {
        if task.is_completed {
            self.cancel_alarms(&task.id);
            return Ok(None);
        }
        self.tasks.complete_task(&task.id)?;
        self.after_completed(task)
    }

    /// Side effects of a task that has just entered completed state, whether
    /// by `complete` or by reaching its Pomodoro estimate.
    pub fn after_completed(&self, task: &Task) -> RepoResult<Option<Task>> {
        self.profiles.record_task_completed()?;
        self.cancel_alarms(&task.id);

        let Some(next) = task.next_occurrence(self.clock.now_ms()) else {
            return Ok(None);
        };
        self.tasks.add_task(&next)?;
        self.sync_alarms(&next);
        info!(
            "event=task_recur module=service status=ok recurrence={}",
            next.recurrence.as_str()
        );
        Ok(Some(next))
    }

    /// Reopens a completed task and re-arms its alarms. Open tasks are left
    /// untouched.
    pub fn reopen(&self, task: &Task) -> RepoResult<()> {
        if !task.is_completed {
            return Ok(());
        }
        self.tasks.uncomplete_task(&task.id)?;
        self.profiles.record_task_reopened()?;

        let mut reopened = task.clone();
        reopened.is_completed = false;
        reopened.completed_at = None;
        self.sync_alarms(&reopened);
        Ok(())
    }

    /// Re-arms alarms after a task write. Failures are logged only.
    pub fn sync_alarms(&self, task: &Task) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        if let Err(err) = scheduler.schedule_task(task) {
            warn!("event=alarm_sync module=service status=error error={err}");
        }
    }

    pub fn cancel_alarms(&self, task_id: &str) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        if let Err(err) = scheduler.cancel_task(task_id) {
            warn!("event=alarm_sync module=service status=error error={err}");
        }
    }

    /// Drops alarms and their persisted ids for a deleted task.
    pub fn forget_alarms(&self, task_id: &str) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        if let Err(err) = scheduler.forget_task(task_id) {
            warn!("event=alarm_sync module=service status=error error={err}");
        }
    }
}
