mod common;

use common::{fixed_now, Harness, RecordingBackend};
use std::sync::Arc;
use tempo_core::clock::{DAY_MS, HOUR_MS};
use tempo_core::notify::scheduler::NotificationScheduler;
use tempo_core::notify::AlarmIdRegistry;
use tempo_core::{CoreConfig, FocusController, Priority, RecurrenceType, SessionKind, Task};

fn controller(h: &Harness) -> FocusController {
    FocusController::new(
        h.tasks.clone(),
        h.sessions.clone(),
        h.profiles.clone(),
        h.dyn_clock(),
    )
}

fn task(title: &str, estimate: i64) -> Task {
    let mut task = Task::new(title, fixed_now());
    task.estimated_pomodoros = estimate;
    task
}

#[test]
fn start_mirrors_live_tasks_and_derives_aggregates() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    assert!(controller.is_observing());

    let mut urgent = task("urgent", 1);
    urgent.priority = Priority::High;
    controller.add_task(&task("later", 1)).unwrap();
    controller.add_task(&urgent).unwrap();

    let state = controller.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.aggregates.active_tasks[0].title, "urgent");
    assert!(state.profile.is_some());

    controller.toggle_task_completion(&urgent.id).unwrap();
    let state = controller.snapshot();
    assert_eq!(state.aggregates.completed_today, 1);
    assert_eq!(state.aggregates.active_tasks.len(), 1);

    controller.stop();
    assert!(!controller.is_observing());
    h.tasks.add_task(&task("unseen", 1)).unwrap();
    assert_eq!(controller.snapshot().tasks.len(), 2);
}

#[test]
fn selecting_a_task_moves_the_in_progress_flag() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let first = task("first", 2);
    let second = task("second", 2);
    controller.add_task(&first).unwrap();
    controller.add_task(&second).unwrap();

    controller.select_task(Some(&first.id)).unwrap();
    controller.select_task(Some(&second.id)).unwrap();
    assert!(!h.tasks.get_task(&first.id).unwrap().is_in_progress);
    assert!(h.tasks.get_task(&second.id).unwrap().is_in_progress);

    let state = controller.snapshot();
    assert_eq!(state.selected_task().map(|task| task.title.as_str()), Some("second"));

    controller.select_task(None).unwrap();
    assert!(!h.tasks.get_task(&second.id).unwrap().is_in_progress);
    assert_eq!(controller.snapshot().selected_task_id, None);
}

#[test]
fn finishing_work_sessions_completes_the_focused_task_once() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let focused = task("focus", 2);
    controller.add_task(&focused).unwrap();
    controller.select_task(Some(&focused.id)).unwrap();

    let first = controller
        .complete_session(SessionKind::Work, 25, fixed_now() - HOUR_MS)
        .unwrap();
    assert!(!first.progress.unwrap().auto_completed);
    assert_eq!(first.next.kind, SessionKind::ShortBreak);

    let second = controller
        .complete_session(SessionKind::Work, 25, fixed_now() - HOUR_MS / 2)
        .unwrap();
    assert!(second.progress.unwrap().auto_completed);

    let state = controller.snapshot();
    assert_eq!(state.selected_task_id, None);
    assert_eq!(state.aggregates.today_focus_minutes, 50);
    assert_eq!(state.aggregates.today_work_sessions, 2);
    assert_eq!(state.aggregates.completed_today, 1);
    let profile = state.profile.unwrap();
    assert_eq!(profile.total_tasks_completed, 1);
    assert_eq!(profile.total_sessions, 2);
    assert_eq!(profile.total_focus_minutes, 50);

    let stored = h.tasks.get_task(&focused.id).unwrap();
    assert!(stored.is_completed);
    assert!(!stored.is_in_progress);

    let unlinked = controller
        .complete_session(SessionKind::Work, 25, fixed_now())
        .unwrap();
    assert!(unlinked.progress.is_none());
    assert_eq!(h.profiles.get_or_create_profile().unwrap().total_tasks_completed, 1);
}

#[test]
fn break_sessions_do_not_touch_focus_totals() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let outcome = controller
        .complete_session(SessionKind::ShortBreak, 5, fixed_now() - HOUR_MS)
        .unwrap();
    assert!(outcome.progress.is_none());
    assert_eq!(outcome.next.kind, SessionKind::Work);

    let state = controller.snapshot();
    assert_eq!(state.today_sessions.len(), 1);
    assert_eq!(state.aggregates.today_focus_minutes, 0);
    assert_eq!(state.profile.unwrap().total_sessions, 0);
}

#[test]
fn completing_a_recurring_task_spawns_the_next_occurrence_with_alarms() {
    let h = Harness::signed_in();
    let backend = Arc::new(RecordingBackend::default());
    let scheduler = Arc::new(NotificationScheduler::new(
        backend.clone(),
        AlarmIdRegistry::new(tempo_core::db::open_db_in_memory().unwrap()),
        h.dyn_clock(),
        &CoreConfig::default(),
    ));
    let controller = controller(&h).with_scheduler(Arc::clone(&scheduler));
    controller.start();

    let mut daily = task("water plants", 1);
    daily.recurrence = RecurrenceType::Daily;
    daily.due_date = Some(fixed_now() + 2 * HOUR_MS);
    controller.add_task(&daily).unwrap();
    assert_eq!(scheduler.pending_count(), 2);

    assert!(controller.toggle_task_completion(&daily.id).unwrap());
    let tasks = h.tasks.get_tasks();
    assert_eq!(tasks.len(), 2);
    let next = tasks.iter().find(|task| task.id != daily.id).unwrap();
    assert!(!next.is_completed);
    assert_eq!(next.recurrence, RecurrenceType::Daily);
    assert_eq!(next.due_date, Some(fixed_now() + 2 * HOUR_MS + DAY_MS));
    // The finished task's two alarms were cancelled, the new one has two.
    assert_eq!(scheduler.pending_count(), 2);
    assert_eq!(backend.cancelled.lock().unwrap().len(), 2);

    assert!(!controller.toggle_task_completion(&daily.id).unwrap());
    assert!(h.tasks.get_task(&daily.id).unwrap().completed_at.is_none());
}

#[test]
fn failures_surface_as_a_single_error_message() {
    let h = Harness::signed_out();
    let controller = controller(&h);
    controller.start();
    assert!(controller.snapshot().tasks.is_empty());

    assert!(controller.add_task(&task("nope", 1)).is_err());
    let message = controller.snapshot().error_message.unwrap();
    assert!(message.contains("add task"));

    controller.clear_error();
    assert_eq!(controller.snapshot().error_message, None);

    h.auth.sign_in("user-1").unwrap();
    assert!(controller.toggle_task_completion("ghost").is_err());
    assert!(controller.snapshot().error_message.is_some());
}

#[test]
fn reopening_a_task_takes_back_its_completion_count() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let chore = task("chore", 1);
    controller.add_task(&chore).unwrap();

    assert!(controller.toggle_task_completion(&chore.id).unwrap());
    assert!(!controller.toggle_task_completion(&chore.id).unwrap());
    assert_eq!(
        h.profiles.get_or_create_profile().unwrap().total_tasks_completed,
        0
    );
    assert!(controller.toggle_task_completion(&chore.id).unwrap());

    let profile = controller.snapshot().profile.unwrap();
    assert_eq!(profile.total_tasks_completed, 1);
}

#[test]
fn switching_users_drops_the_previous_selection() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let mine = task("mine", 2);
    controller.add_task(&mine).unwrap();
    controller.select_task(Some(&mine.id)).unwrap();

    h.auth.sign_in("user-2").unwrap();
    controller.start();
    assert_eq!(controller.snapshot().selected_task_id, None);

    let outcome = controller
        .complete_session(SessionKind::Work, 25, fixed_now() - HOUR_MS)
        .unwrap();
    assert!(outcome.progress.is_none());
    let state = controller.snapshot();
    assert_eq!(state.error_message, None);
    assert!(state.today_sessions[0].task_id.is_none());

    // Restarting for the same user keeps a fresh selection.
    let theirs = task("theirs", 2);
    controller.add_task(&theirs).unwrap();
    controller.select_task(Some(&theirs.id)).unwrap();
    controller.start();
    assert_eq!(controller.snapshot().selected_task_id, Some(theirs.id));
}

#[test]
fn a_deleted_selection_is_not_credited() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();
    let gone = task("gone", 2);
    controller.add_task(&gone).unwrap();
    controller.select_task(Some(&gone.id)).unwrap();
    h.tasks.delete_task(&gone.id).unwrap();

    let outcome = controller
        .complete_session(SessionKind::Work, 25, fixed_now() - HOUR_MS)
        .unwrap();
    assert!(outcome.progress.is_none());
    let state = controller.snapshot();
    assert_eq!(state.selected_task_id, None);
    assert_eq!(state.error_message, None);
    assert_eq!(state.profile.unwrap().total_sessions, 1);
}

#[test]
fn oversized_sessions_are_rejected_before_any_write() {
    let h = Harness::signed_in();
    let controller = controller(&h);
    controller.start();

    let result = controller.complete_session(SessionKind::Work, i64::MAX / 1000, fixed_now());
    assert!(result.is_err());
    let state = controller.snapshot();
    assert!(state.error_message.unwrap().contains("complete session"));
    assert!(state.today_sessions.is_empty());
    assert_eq!(state.profile.unwrap().total_focus_minutes, 0);
}
