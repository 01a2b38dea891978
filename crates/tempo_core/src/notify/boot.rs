//! Alarm re-arming after a device restart.

use super::scheduler::NotificationScheduler;
use crate::clock::Clock;
use crate::repo::task_repo::TaskRepository;
use log::{info, warn};

/// Outcome of one boot reschedule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescheduleReport {
    pub tasks_seen: usize,
    pub tasks_rearmed: usize,
    pub alarms_armed: usize,
    pub failures: usize,
}

/// Re-arms alarms for every open task whose due date is still ahead.
///
/// Completed tasks, undated tasks and past due dates are left alone. A
/// failure on one task is logged and does not stop the pass.
pub fn reschedule_after_boot(
    tasks: &TaskRepository,
    scheduler: &NotificationScheduler,
    clock: &dyn Clock,
) -> RescheduleReport {
    let now = clock.now_ms();
    let all = tasks.get_tasks();
    let mut report = RescheduleReport {
        tasks_seen: all.len(),
        ..RescheduleReport::default()
    };

    for task in all
        .iter()
        .filter(|task| !task.is_completed && task.due_date.is_some_and(|due| due > now))
    {
        match scheduler.schedule_task(task) {
            Ok(armed) => {
                report.tasks_rearmed += 1;
                report.alarms_armed += armed.len();
            }
            Err(err) => {
                report.failures += 1;
                warn!("event=boot_reschedule module=notify status=error error={err}");
            }
        }
    }

    info!(
        "event=boot_reschedule module=notify status=ok seen={} rearmed={} alarms={} failures={}",
        report.tasks_seen, report.tasks_rearmed, report.alarms_armed, report.failures
    );
    report
}
