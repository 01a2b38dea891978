//! Aggregations for the analytics screen.
//!
//! # Responsibility
//! - Fold sessions into per-day focus totals over a date range.
//! - Break tasks down by category and priority.
//!
//! # Invariants
//! - Daily series contain every date of the range, zero-filled, oldest first.
//! - Only completed work sessions contribute focus minutes.

use crate::clock::{local_date, parse_date};
use crate::model::session::{PomodoroSession, SessionKind};
use crate::model::task::{Priority, Task};
use crate::repo::session_repo::SessionRepository;
use crate::repo::task_repo::TaskRepository;
use chrono::NaiveDate;
use std::collections::BTreeMap;

const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyFocus {
    pub date: NaiveDate,
    pub focus_minutes: i64,
    pub work_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityCount {
    pub priority: Priority,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily: Vec<DailyFocus>,
    pub total_focus_minutes: i64,
    pub total_work_sessions: usize,
    pub tasks_completed_in_range: usize,
    pub categories: Vec<CategoryCount>,
    pub priorities: Vec<PriorityCount>,
    /// Completed share of all tasks, in `0.0..=1.0`.
    pub completion_rate: f64,
}

/// Focus minutes per day for `start..=end`. Empty when `start > end`.
pub fn daily_focus_minutes(
    sessions: &[PomodoroSession],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyFocus> {
    if start > end {
        return Vec::new();
    }
    let mut days: BTreeMap<NaiveDate, DailyFocus> = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| {
            (
                date,
                DailyFocus {
                    date,
                    focus_minutes: 0,
                    work_sessions: 0,
                },
            )
        })
        .collect();

    for session in sessions {
        if session.kind != SessionKind::Work || !session.is_completed {
            continue;
        }
        let date = parse_date(&session.date).or_else(|| local_date(session.start_time));
        if let Some(entry) = date.and_then(|date| days.get_mut(&date)) {
            entry.focus_minutes += session.focus_minutes();
            entry.work_sessions += 1;
        }
    }
    days.into_values().collect()
}

/// Task counts per category, largest first. Blank categories are grouped.
pub fn category_breakdown(tasks: &[Task]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<String, CategoryCount> = BTreeMap::new();
    for task in tasks {
        let category = match task.category.trim() {
            "" => UNCATEGORIZED.to_string(),
            name => name.to_string(),
        };
        let entry = counts
            .entry(category.clone())
            .or_insert_with(|| CategoryCount {
                category,
                total: 0,
                completed: 0,
            });
        entry.total += 1;
        if task.is_completed {
            entry.completed += 1;
        }
    }
    let mut result: Vec<CategoryCount> = counts.into_values().collect();
    result.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    result
}

/// Task counts for every priority, highest priority first.
pub fn priority_breakdown(tasks: &[Task]) -> Vec<PriorityCount> {
    [Priority::High, Priority::Medium, Priority::Low]
        .into_iter()
        .map(|priority| {
            let matching = tasks.iter().filter(|task| task.priority == priority);
            PriorityCount {
                priority,
                total: matching.clone().count(),
                completed: matching.filter(|task| task.is_completed).count(),
            }
        })
        .collect()
}

pub fn completion_rate(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let completed = tasks.iter().filter(|task| task.is_completed).count();
    completed as f64 / tasks.len() as f64
}

pub fn build_report(
    tasks: &[Task],
    sessions: &[PomodoroSession],
    start: NaiveDate,
    end: NaiveDate,
) -> AnalyticsReport {
    let daily = daily_focus_minutes(sessions, start, end);
    let tasks_completed_in_range = tasks
        .iter()
        .filter(|task| task.is_completed)
        .filter_map(|task| task.completed_at.and_then(local_date))
        .filter(|date| *date >= start && *date <= end)
        .count();

    AnalyticsReport {
        start,
        end,
        total_focus_minutes: daily.iter().map(|day| day.focus_minutes).sum(),
        total_work_sessions: daily.iter().map(|day| day.work_sessions).sum(),
        daily,
        tasks_completed_in_range,
        categories: category_breakdown(tasks),
        priorities: priority_breakdown(tasks),
        completion_rate: completion_rate(tasks),
    }
}

/// Loads tasks and range sessions through the repositories and folds them.
pub fn load_report(
    tasks: &TaskRepository,
    sessions: &SessionRepository,
    start: NaiveDate,
    end: NaiveDate,
) -> AnalyticsReport {
    build_report(
        &tasks.get_tasks(),
        &sessions.get_sessions_between(start, end),
        start,
        end,
    )
}

#[cfg(test)]
mod tests {
    use super::{category_breakdown, completion_rate, daily_focus_minutes, priority_breakdown};
    use crate::clock::{local_day_start_ms, HOUR_MS};
    use crate::model::session::{PomodoroSession, SessionKind};
    use crate::model::task::{Priority, Task};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn session_on(date: NaiveDate, kind: SessionKind, minutes: i64) -> PomodoroSession {
        let start = local_day_start_ms(date).unwrap() + 9 * HOUR_MS;
        PomodoroSession::completed(kind, minutes, start, None)
    }

    #[test]
    fn daily_series_is_zero_filled_and_ignores_breaks() {
        let sessions = vec![
            session_on(day(2), SessionKind::Work, 25),
            session_on(day(2), SessionKind::Work, 25),
            session_on(day(2), SessionKind::ShortBreak, 5),
            session_on(day(4), SessionKind::Work, 50),
            session_on(day(9), SessionKind::Work, 25),
        ];
        let series = daily_focus_minutes(&sessions, day(1), day(4));
        let minutes: Vec<i64> = series.iter().map(|entry| entry.focus_minutes).collect();
        assert_eq!(minutes, vec![0, 50, 0, 50]);
        assert_eq!(series[1].work_sessions, 2);
        assert!(daily_focus_minutes(&sessions, day(4), day(1)).is_empty());
    }

    #[test]
    fn breakdowns_group_blank_categories_and_cover_all_priorities() {
        let mut tasks = vec![Task::new("a", 1), Task::new("b", 2), Task::new("c", 3)];
        tasks[0].category = "Work".to_string();
        tasks[0].priority = Priority::High;
        tasks[0].is_completed = true;
        tasks[1].category = "Work".to_string();

        let categories = category_breakdown(&tasks);
        assert_eq!(categories[0].category, "Work");
        assert_eq!(categories[0].total, 2);
        assert_eq!(categories[0].completed, 1);
        assert_eq!(categories[1].category, "Uncategorized");

        let priorities = priority_breakdown(&tasks);
        assert_eq!(priorities.len(), 3);
        assert_eq!(priorities[0].priority, Priority::High);
        assert_eq!(priorities[0].completed, 1);
        assert_eq!(priorities[1].total, 2);
        assert_eq!(priorities[2].total, 0);

        assert!((completion_rate(&tasks) - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(completion_rate(&[]), 0.0);
    }
}
