//! Observable timer-screen state over the task, session and profile stores.
//!
//! # Responsibility
//! - Mirror the live task list, today's sessions and the profile.
//! - Run the focus use-cases: select a task, finish a session, toggle and
//!   edit tasks, keeping reminder alarms in sync.
//! - Surface failures as one free-text error message.
//!
//! # Invariants
//! - `ViewState::aggregates` is recomputed inside every state mutation.
//! - The state lock is never held across a repository call; store listeners
//!   run synchronously and take the same lock.
//! - A task auto-completed by its estimate is counted once in the profile.
//! - A selection never outlives the user it was made for; `start` drops it
//!   when the signed-in user changed.
//! - Finishing a session writes the session, then the profile focus totals,
//!   then the task credit. These are separate documents: a failure part way
//!   leaves the earlier writes in place and is reported as the error message.
//!   A stale selection is dropped before the first write.

use crate::clock::{format_date, local_date, Clock};
use crate::model::profile::UserProfile;
use crate::model::session::{PomodoroSession, SessionKind};
use crate::model::task::{Task, TaskId};
use crate::notify::scheduler::NotificationScheduler;
use crate::service::completion::TaskCompletion;
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::session_repo::SessionRepository;
use crate::repo::task_repo::{PomodoroProgress, TaskRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::session_plan::{plan_next, SessionPlan};
use crate::store::Subscription;
use chrono::NaiveDate;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Values derived from the mirrored lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    /// Tasks whose completion timestamp falls on today.
    pub completed_today: usize,
    pub today_focus_minutes: i64,
    pub today_work_sessions: usize,
    /// Open tasks, highest priority first, then oldest first.
    pub active_tasks: Vec<Task>,
    pub overdue_tasks: usize,
}

impl Aggregates {
    pub fn derive(
        tasks: &[Task],
        today_sessions: &[PomodoroSession],
        today: NaiveDate,
        now_ms: i64,
    ) -> Self {
        let completed_today = tasks
            .iter()
            .filter(|task| task.is_completed)
            .filter(|task| task.completed_at.and_then(local_date) == Some(today))
            .count();

        let today_string = format_date(today);
        let todays_work = today_sessions
            .iter()
            .filter(|session| session.date == today_string)
            .filter(|session| session.kind == SessionKind::Work && session.is_completed);
        let today_focus_minutes = todays_work.clone().map(PomodoroSession::focus_minutes).sum();
        let today_work_sessions = todays_work.count();

        let mut active_tasks: Vec<Task> = tasks
            .iter()
            .filter(|task| !task.is_completed)
            .cloned()
            .collect();
        active_tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        let overdue_tasks = active_tasks
            .iter()
            .filter(|task| task.is_overdue(now_ms))
            .count();

        Self {
            completed_today,
            today_focus_minutes,
            today_work_sessions,
            active_tasks,
            overdue_tasks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub tasks: Vec<Task>,
    pub today_sessions: Vec<PomodoroSession>,
    pub profile: Option<UserProfile>,
    pub selected_task_id: Option<TaskId>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub aggregates: Aggregates,
}

impl ViewState {
    pub fn selected_task(&self) -> Option<&Task> {
        let selected = self.selected_task_id.as_deref()?;
        self.tasks.iter().find(|task| task.id == selected)
    }
}

/// Result of finishing one timer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    /// Present when a work session was credited to the selected task.
    pub progress: Option<PomodoroProgress>,
    pub next: SessionPlan,
}

pub struct FocusController {
    tasks: TaskRepository,
    sessions: SessionRepository,
    profiles: ProfileRepository,
    clock: Arc<dyn Clock>,
    completion: TaskCompletion,
    state: Arc<Mutex<ViewState>>,
    subscription: Mutex<Option<Subscription>>,
    observed_user: Mutex<Option<String>>,
}

impl FocusController {
    pub fn new(
        tasks: TaskRepository,
        sessions: SessionRepository,
        profiles: ProfileRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let completion = TaskCompletion::new(tasks.clone(), profiles.clone(), Arc::clone(&clock));
        Self {
            tasks,
            sessions,
            profiles,
            clock,
            completion,
            state: Arc::new(Mutex::new(ViewState::default())),
            subscription: Mutex::new(None),
            observed_user: Mutex::new(None),
        }
    }

    /// Keeps reminder alarms in sync with task writes.
    pub fn with_scheduler(mut self, scheduler: Arc<NotificationScheduler>) -> Self {
        self.completion = self.completion.clone().with_scheduler(scheduler);
        self
    }

    /// Subscribes to the task list and loads sessions and profile.
    ///
    /// Calling `start` again replaces the previous subscription. When the
    /// signed-in user changed since the last start, the selection is dropped.
    pub fn start(&self) {
        let user = self.tasks.current_user();
        let user_changed = {
            let mut observed = lock(&self.observed_user);
            let changed = *observed != user;
            *observed = user;
            changed
        };
        apply(&self.state, self.clock.as_ref(), |state| {
            state.is_loading = true;
            state.error_message = None;
            if user_changed {
                state.selected_task_id = None;
            }
        });

        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let subscription = self.tasks.observe_tasks(move |tasks| {
            apply(&state, clock.as_ref(), |state| {
                state.tasks = tasks;
                state.is_loading = false;
            });
        });
        *lock(&self.subscription) = Some(subscription);

        self.reload_sessions_and_profile();
        info!("event=controller_start module=service status=ok");
    }

    /// Drops the live task subscription. State is kept as last seen.
    pub fn stop(&self) {
        let previous = lock(&self.subscription).take();
        drop(previous);
        info!("event=controller_stop module=service status=ok");
    }

    pub fn is_observing(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn snapshot(&self) -> ViewState {
        lock(&self.state).clone()
    }

    /// One-shot reload of every mirrored value.
    pub fn refresh(&self) {
        let tasks = self.tasks.get_tasks();
        apply(&self.state, self.clock.as_ref(), |state| {
            state.tasks = tasks;
            state.is_loading = false;
        });
        self.reload_sessions_and_profile();
    }

    pub fn clear_error(&self) {
        apply(&self.state, self.clock.as_ref(), |state| {
            state.error_message = None;
        });
    }

    pub fn add_task(&self, task: &Task) -> RepoResult<TaskId> {
        let result = self.tasks.add_task(task);
        if result.is_ok() {
            self.completion.sync_alarms(task);
        }
        self.record("add task", result)
    }

    pub fn update_task(&self, task: &Task) -> RepoResult<()> {
        let result = self.tasks.update_task(task);
        if result.is_ok() {
            self.completion.sync_alarms(task);
        }
        self.record("update task", result)
    }

    pub fn delete_task(&self, task_id: &str) -> RepoResult<()> {
        let result = self.tasks.delete_task(task_id);
        if result.is_ok() {
            self.completion.forget_alarms(task_id);
            self.clear_selection_if(task_id);
        }
        self.record("delete task", result)
    }

    /// Flips completion of a task and returns the new completion state.
    ///
    /// Completing a recurring task with a due date also creates its next
    /// occurrence.
    pub fn toggle_task_completion(&self, task_id: &str) -> RepoResult<bool> {
        let result = self.toggle_inner(task_id);
        self.record("toggle task", result)
    }

    /// Marks `task_id` as the focus target, clearing the previous one.
    ///
    /// `None` clears the current focus.
    pub fn select_task(&self, task_id: Option<&str>) -> RepoResult<()> {
        let result = self.select_inner(task_id);
        self.record("select task", result)
    }

    /// Records a finished timer session at `started_at`.
    ///
    /// A work session updates the profile and is credited to the selected
    /// task; when that reaches the task's estimate the task completes and
    /// focus is cleared.
    pub fn complete_session(
        &self,
        kind: SessionKind,
        duration_minutes: i64,
        started_at: i64,
    ) -> RepoResult<SessionOutcome> {
        let result = self.complete_session_inner(kind, duration_minutes, started_at);
        self.record("complete session", result)
    }

    fn toggle_inner(&self, task_id: &str) -> RepoResult<bool> {
        let task = self
            .tasks
            .get_task(task_id)
            .ok_or_else(|| RepoError::NotFound(task_id.to_string()))?;

        if task.is_completed {
            self.completion.reopen(&task)?;
            return Ok(false);
        }

        self.completion.complete(&task)?;
        self.clear_selection_if(task_id);
        Ok(true)
    }

    fn select_inner(&self, task_id: Option<&str>) -> RepoResult<()> {
        let previous = lock(&self.state).selected_task_id.clone();
        if previous.as_deref() == task_id {
            return Ok(());
        }

        if let Some(previous) = previous.as_deref() {
            match self.tasks.set_in_progress(previous, false) {
                Ok(()) | Err(RepoError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if let Some(task_id) = task_id {
            self.tasks.set_in_progress(task_id, true)?;
        }

        let selected = task_id.map(str::to_string);
        apply(&self.state, self.clock.as_ref(), |state| {
            state.selected_task_id = selected;
        });
        Ok(())
    }

    fn complete_session_inner(
        &self,
        kind: SessionKind,
        duration_minutes: i64,
        started_at: i64,
    ) -> RepoResult<SessionOutcome> {
        let selected = lock(&self.state).selected_task_id.clone();
        let focused = match selected {
            Some(task_id) if kind == SessionKind::Work => {
                let task = self.tasks.get_task(&task_id);
                if task.is_none() {
                    warn!(
                        "event=session_credit module=service status=skipped reason=stale_selection"
                    );
                    self.clear_selection_if(&task_id);
                }
                task
            }
            _ => None,
        };
        let task_id = focused.as_ref().map(|task| task.id.clone());

        let session =
            PomodoroSession::completed(kind, duration_minutes, started_at, task_id);
        let session_id = self.sessions.record_session(&session)?;

        let mut progress = None;
        if kind == SessionKind::Work {
            let day = local_date(started_at).unwrap_or_else(|| self.clock.today());
            self.profiles.record_focus_session(duration_minutes, day)?;

            if let Some(task) = focused.as_ref() {
                let credited = self.tasks.record_pomodoro(&task.id)?;
                if credited.auto_completed {
                    self.completion.after_completed(task)?;
                    self.clear_selection_if(&task.id);
                    info!("event=task_auto_complete module=service status=ok");
                }
                progress = Some(credited);
            }
        }

        self.reload_sessions_and_profile();
        let (work_done, preferences) = {
            let state = lock(&self.state);
            (
                state.aggregates.today_work_sessions,
                state
                    .profile
                    .as_ref()
                    .map(|profile| profile.preferences.clone())
                    .unwrap_or_default(),
            )
        };
        let next = plan_next(
            Some(kind),
            u32::try_from(work_done).unwrap_or(u32::MAX),
            &preferences,
        );

        Ok(SessionOutcome {
            session_id,
            progress,
            next,
        })
    }

    fn reload_sessions_and_profile(&self) {
        let today = self.clock.today();
        let sessions = self.sessions.get_sessions_for_date(today);
        let profile = self.profiles.get_or_create_profile();
        apply(&self.state, self.clock.as_ref(), |state| {
            state.today_sessions = sessions;
            state.profile = profile;
        });
    }

    fn clear_selection_if(&self, task_id: &str) {
        apply(&self.state, self.clock.as_ref(), |state| {
            if state.selected_task_id.as_deref() == Some(task_id) {
                state.selected_task_id = None;
            }
        });
    }

    fn record<T>(&self, operation: &str, result: RepoResult<T>) -> RepoResult<T> {
        if let Err(err) = &result {
            let message = format!("Failed to {operation}: {err}");
            apply(&self.state, self.clock.as_ref(), |state| {
                state.error_message = Some(message);
            });
        }
        result
    }
}

impl Drop for FocusController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Applies `change` and re-derives aggregates under one lock.
fn apply(state: &Mutex<ViewState>, clock: &dyn Clock, change: impl FnOnce(&mut ViewState)) {
    let mut guard = lock(state);
    change(&mut guard);
    let today = clock.today();
    let state = &mut *guard;
    state.aggregates = Aggregates::derive(
        &state.tasks,
        &state.today_sessions,
        today,
        clock.now_ms(),
    );
}

#[cfg(test)]
mod tests {
    use super::Aggregates;
    use crate::clock::{local_day_start_ms, HOUR_MS};
    use crate::model::session::{PomodoroSession, SessionKind};
    use crate::model::task::{Priority, Task};
    use chrono::NaiveDate;

    #[test]
    fn aggregates_count_today_only_and_order_active_tasks() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let now = local_day_start_ms(today).unwrap() + 12 * HOUR_MS;

        let mut done_today = Task::new("done today", 1);
        done_today.is_completed = true;
        done_today.completed_at = Some(now - HOUR_MS);
        let mut done_yesterday = Task::new("done yesterday", 2);
        done_yesterday.is_completed = true;
        done_yesterday.completed_at = Some(local_day_start_ms(yesterday).unwrap());
        let mut urgent = Task::new("urgent", 30);
        urgent.priority = Priority::High;
        urgent.due_date = Some(now - 1);
        let low_old = Task::new("old", 10);
        let tasks = vec![done_today, done_yesterday, low_old, urgent];

        let sessions = vec![
            PomodoroSession::completed(SessionKind::Work, 25, now - 2 * HOUR_MS, None),
            PomodoroSession::completed(SessionKind::ShortBreak, 5, now - HOUR_MS, None),
        ];

        let aggregates = Aggregates::derive(&tasks, &sessions, today, now);
        assert_eq!(aggregates.completed_today, 1);
        assert_eq!(aggregates.today_focus_minutes, 25);
        assert_eq!(aggregates.today_work_sessions, 1);
        let titles: Vec<&str> = aggregates
            .active_tasks
            .iter()
            .map(|task| task.title.as_str())
            .collect();
        assert_eq!(titles, vec!["urgent", "old"]);
        assert_eq!(aggregates.overdue_tasks, 1);
    }
}
