//! Demo history generator and data repair passes.
//!
//! # Responsibility
//! - Synthesize past tasks and Pomodoro sessions through the repositories so
//!   the analytics screens have something to show.
//! - Run the remediation backfills over existing data.
//!
//! # Invariants
//! - Generated data only covers days strictly before today.
//! - The same `rng_seed` on the same start day yields the same history.

use crate::clock::{local_day_start_ms, Clock, HOUR_MS, MINUTE_MS};
use crate::config::CoreConfig;
use crate::model::session::{PomodoroSession, SessionKind};
use crate::model::task::{Priority, Task};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::session_repo::SessionRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoResult;
use chrono::Days;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const TITLES: &[&str] = &[
    "Review pull requests",
    "Write weekly report",
    "Read chapter notes",
    "Plan sprint backlog",
    "Prepare slides",
    "Inbox zero",
    "Refactor parser",
    "Gym session",
    "Study flashcards",
    "Update budget sheet",
];
const PRIORITIES: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
const FIRST_SESSION_HOUR: i64 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct SeedOptions {
    /// Number of past days to fill, ending yesterday.
    pub days: u32,
    pub max_tasks_per_day: u32,
    pub max_work_sessions_per_day: u32,
    /// Chance that a generated task ends up completed.
    pub completion_probability: f64,
    /// Fixed seed for reproducible output; entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            days: 14,
            max_tasks_per_day: 3,
            max_work_sessions_per_day: 6,
            completion_probability: 0.7,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub days: u32,
    pub tasks_created: usize,
    pub tasks_completed: usize,
    pub sessions_created: usize,
    pub focus_minutes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub completion_timestamps_fixed: usize,
    pub session_dates_fixed: usize,
}

pub struct DataSeeder {
    tasks: TaskRepository,
    sessions: SessionRepository,
    profiles: ProfileRepository,
    clock: Arc<dyn Clock>,
    categories: Vec<String>,
}

impl DataSeeder {
    pub fn new(
        tasks: TaskRepository,
        sessions: SessionRepository,
        profiles: ProfileRepository,
        clock: Arc<dyn Clock>,
        config: &CoreConfig,
    ) -> Self {
        let categories = config
            .seed_categories
            .iter()
            .map(|category| category.trim().to_string())
            .filter(|category| !category.is_empty())
            .collect();
        Self {
            tasks,
            sessions,
            profiles,
            clock,
            categories,
        }
    }

    /// Writes randomized tasks and sessions for the last `options.days` days.
    pub fn seed_history(&self, options: &SeedOptions) -> RepoResult<SeedReport> {
        let mut rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let completion_probability = options.completion_probability.clamp(0.0, 1.0);
        let today = self.clock.today();
        let mut report = SeedReport {
            days: options.days,
            ..SeedReport::default()
        };

        for offset in (1..=u64::from(options.days)).rev() {
            let Some(day) = today.checked_sub_days(Days::new(offset)) else {
                continue;
            };
            let Some(day_start) = local_day_start_ms(day) else {
                continue;
            };

            let mut day_tasks = Vec::new();
            for _ in 0..rng.gen_range(0..=options.max_tasks_per_day) {
                let mut task = self.random_task(&mut rng, day_start);
                if rng.gen_bool(completion_probability) {
                    task.is_completed = true;
                    task.completed_pomodoros = task.estimated_pomodoros;
                    task.completed_at = Some(task.created_at + rng.gen_range(1..=8) * HOUR_MS);
                    task.last_worked_at = task.completed_at;
                }
                self.tasks.add_task(&task)?;
                if task.is_completed {
                    self.profiles.record_task_completed()?;
                    report.tasks_completed += 1;
                }
                report.tasks_created += 1;
                day_tasks.push(task);
            }

            let mut cursor = day_start + FIRST_SESSION_HOUR * HOUR_MS;
            for _ in 0..rng.gen_range(0..=options.max_work_sessions_per_day) {
                let work_minutes = *[25_i64, 25, 30, 50].choose(&mut rng).unwrap_or(&25);
                let task_id = day_tasks.choose(&mut rng).map(|task| task.id.clone());
                let work =
                    PomodoroSession::completed(SessionKind::Work, work_minutes, cursor, task_id);
                self.sessions.record_session(&work)?;
                self.profiles.record_focus_session(work_minutes, day)?;
                cursor += work_minutes * MINUTE_MS;

                let rest = PomodoroSession::completed(SessionKind::ShortBreak, 5, cursor, None);
                self.sessions.record_session(&rest)?;
                cursor += 5 * MINUTE_MS + rng.gen_range(0..=60) * MINUTE_MS;

                report.sessions_created += 2;
                report.focus_minutes += work_minutes;
            }
        }

        info!(
            "event=seed_history module=seed status=ok days={} tasks={} sessions={}",
            report.days, report.tasks_created, report.sessions_created
        );
        Ok(report)
    }

    /// Backfills missing completion timestamps and drifted session dates.
    pub fn repair(&self) -> RepoResult<RepairReport> {
        let report = RepairReport {
            completion_timestamps_fixed: self.tasks.backfill_completion_timestamps()?,
            session_dates_fixed: self.sessions.backfill_session_dates()?,
        };
        info!(
            "event=seed_repair module=seed status=ok completed_at={} dates={}",
            report.completion_timestamps_fixed, report.session_dates_fixed
        );
        Ok(report)
    }

    fn random_task(&self, rng: &mut StdRng, day_start: i64) -> Task {
        let title = TITLES.choose(&mut *rng).copied().unwrap_or("Untitled");
        let created_at = day_start + rng.gen_range(7..=11) * HOUR_MS;
        let mut task = Task::new(title, created_at);
        task.priority = PRIORITIES.choose(&mut *rng).copied().unwrap_or_default();
        task.category = self.categories.choose(&mut *rng).cloned().unwrap_or_default();
        task.estimated_pomodoros = rng.gen_range(1..=4);
        task
    }
}
