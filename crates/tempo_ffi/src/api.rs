//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the task list, timer and summary use-cases to Dart via FRB.
//! - Own the single process-wide workspace and its focus controller.
//! - Relay reminder alarms to the host as queued commands and accept fired
//!   alarms, notification buttons and the boot event back.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Calls made before `open_workspace` fail with a message, never a panic.
//! - Failures come back as envelopes with `ok=false` and a UTF-8 message.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tempo_core::notify::{
    AlarmBackend, AlarmError, AlarmKind, AlarmRequest, Notification, NotificationAction,
    NotificationSink,
};
use tempo_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CoreConfig, FocusController, Priority, SessionKind, Task, TempoWorkspace,
};

static RUNTIME: OnceLock<Mutex<Option<Runtime>>> = OnceLock::new();

struct Runtime {
    workspace: TempoWorkspace,
    controller: FocusController,
    alarms: Arc<HostAlarmQueue>,
}

/// Alarm backend that queues platform work for the host to drain.
struct HostAlarmQueue {
    exact_allowed: AtomicBool,
    pending: Mutex<Vec<AlarmCommand>>,
}

impl HostAlarmQueue {
    fn new() -> Self {
        Self {
            exact_allowed: AtomicBool::new(true),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, command: AlarmCommand) {
        lock(&self.pending).push(command);
    }

    fn drain(&self) -> Vec<AlarmCommand> {
        std::mem::take(&mut *lock(&self.pending))
    }
}

impl AlarmBackend for HostAlarmQueue {
    fn schedule_exact(&self, request: &AlarmRequest) -> Result<(), AlarmError> {
        if !self.exact_allowed.load(Ordering::SeqCst) {
            return Err(AlarmError::ExactAlarmDenied);
        }
        self.push(AlarmCommand::schedule(ALARM_OP_SCHEDULE_EXACT, request));
        Ok(())
    }

    fn schedule_inexact(&self, request: &AlarmRequest) -> Result<(), AlarmError> {
        self.push(AlarmCommand::schedule(ALARM_OP_SCHEDULE_INEXACT, request));
        Ok(())
    }

    fn cancel(&self, request_code: i32) -> Result<(), AlarmError> {
        self.push(AlarmCommand {
            op: ALARM_OP_CANCEL.to_string(),
            request_code,
            task_id: String::new(),
            kind: String::new(),
            fire_at_ms: 0,
        });
        Ok(())
    }
}

/// Notifications are handed back in `NotificationResponse`; the host shows
/// them.
struct ReturnedNotifications;

impl NotificationSink for ReturnedNotifications {
    fn show(&self, notification: &Notification) {
        debug!(
            "event=ffi_notification module=ffi status=ok id={}",
            notification.notification_id
        );
    }
}

const ALARM_OP_SCHEDULE_EXACT: &str = "schedule_exact";
const ALARM_OP_SCHEDULE_INEXACT: &str = "schedule_inexact";
const ALARM_OP_CANCEL: &str = "cancel";

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Id of the created or affected task, when there is one.
    pub task_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            ok: true,
            task_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            message: message.into(),
        }
    }
}

/// Task projection for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub task_id: String,
    pub title: String,
    /// `LOW|MEDIUM|HIGH`.
    pub priority: String,
    pub category: String,
    pub due_epoch_ms: Option<i64>,
    pub completed_pomodoros: i64,
    pub estimated_pomodoros: i64,
    pub is_in_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    /// Open tasks, highest priority first.
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Today's dashboard numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodaySummary {
    pub ok: bool,
    pub completed_today: u32,
    pub focus_minutes: i64,
    pub work_sessions: u32,
    pub active_tasks: u32,
    pub overdue_tasks: u32,
    pub message: String,
}

/// Result of finishing a timer interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub ok: bool,
    pub session_id: Option<String>,
    /// True when this session completed the selected task.
    pub task_completed: bool,
    /// Kind the timer should run next (`WORK|SHORT_BREAK|LONG_BREAK`).
    pub next_kind: String,
    pub next_duration_minutes: i64,
    pub next_auto_start: bool,
    pub message: String,
}

impl SessionResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            session_id: None,
            task_completed: false,
            next_kind: String::new(),
            next_duration_minutes: 0,
            next_auto_start: false,
            message: message.into(),
        }
    }
}

/// Platform alarm work queued for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmCommand {
    /// `schedule_exact|schedule_inexact|cancel`.
    pub op: String,
    pub request_code: i32,
    /// Empty for `cancel`.
    pub task_id: String,
    /// `reminder|overdue|snooze`; empty for `cancel`.
    pub kind: String,
    /// Epoch millis; 0 for `cancel`.
    pub fire_at_ms: i64,
}

impl AlarmCommand {
    fn schedule(op: &str, request: &AlarmRequest) -> Self {
        Self {
            op: op.to_string(),
            request_code: request.request_code,
            task_id: request.task_id.clone(),
            kind: request.kind.as_str().to_string(),
            fire_at_ms: request.fire_at_ms,
        }
    }
}

/// Notification to show for a fired alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResponse {
    pub ok: bool,
    /// False when the task is gone or already done; nothing to show.
    pub show: bool,
    pub notification_id: i32,
    pub task_id: String,
    pub title: String,
    pub body: String,
    /// Action ids (`mark_complete|snooze`) in display order.
    pub actions: Vec<String>,
    pub message: String,
}

impl NotificationResponse {
    fn hidden(ok: bool, message: impl Into<String>) -> Self {
        Self {
            ok,
            show: false,
            notification_id: 0,
            task_id: String::new(),
            title: String::new(),
            body: String::new(),
            actions: Vec::new(),
            message: message.into(),
        }
    }
}

/// Outcome of the boot-time alarm pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleResponse {
    pub ok: bool,
    pub tasks_seen: u32,
    pub tasks_rearmed: u32,
    pub alarms_armed: u32,
    pub failures: u32,
    pub message: String,
}

/// Opens (or creates) the workspace database at `db_path`.
///
/// # FFI contract
/// - Sync call; runs migrations on first open.
/// - Replaces any previously opened workspace.
/// - `config_json` may be empty for defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn open_workspace(db_path: String, config_json: String) -> ActionResponse {
    let db_path = db_path.trim();
    if db_path.is_empty() {
        return ActionResponse::failure("open_workspace failed: db_path cannot be empty");
    }
    let config = if config_json.trim().is_empty() {
        CoreConfig::default()
    } else {
        match CoreConfig::from_json_str(&config_json) {
            Ok(config) => config,
            Err(err) => return ActionResponse::failure(format!("open_workspace failed: {err}")),
        }
    };

    let mut workspace = match TempoWorkspace::open(db_path, config) {
        Ok(workspace) => workspace,
        Err(err) => return ActionResponse::failure(format!("open_workspace failed: {err}")),
    };
    let alarms = Arc::new(HostAlarmQueue::new());
    let backend: Arc<dyn AlarmBackend> = alarms.clone();
    if let Err(err) = workspace.attach_alarms(backend) {
        return ActionResponse::failure(format!("open_workspace failed: {err}"));
    }
    let controller = workspace.controller();
    controller.start();
    *runtime_slot() = Some(Runtime {
        workspace,
        controller,
        alarms,
    });
    info!("event=ffi_workspace_open module=ffi status=ok");
    ActionResponse::success("Workspace opened.", None)
}

/// Signs `user_id` in and reloads the controller for that user.
#[flutter_rust_bridge::frb(sync)]
pub fn sign_in(user_id: String) -> ActionResponse {
    with_runtime("sign_in", |runtime| {
        runtime
            .workspace
            .auth()
            .sign_in(&user_id)
            .map_err(|err| err.to_string())?;
        runtime.controller.start();
        Ok(ActionResponse::success("Signed in.", None))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn sign_out() -> ActionResponse {
    with_runtime("sign_out", |runtime| {
        runtime.workspace.auth().sign_out();
        runtime.controller.start();
        Ok(ActionResponse::success("Signed out.", None))
    })
}

/// Creates an open task.
///
/// Input semantics:
/// - `priority`: `low|medium|high`, case-insensitive; empty means medium.
/// - `estimated_pomodoros`: values below 1 are stored as 1.
#[flutter_rust_bridge::frb(sync)]
pub fn add_task(
    title: String,
    priority: String,
    category: String,
    due_epoch_ms: Option<i64>,
    estimated_pomodoros: i64,
) -> ActionResponse {
    let priority = if priority.trim().is_empty() {
        Priority::default()
    } else {
        match Priority::parse(&priority) {
            Some(priority) => priority,
            None => {
                return ActionResponse::failure(format!(
                    "add_task failed: unsupported priority `{}`",
                    priority.trim()
                ))
            }
        }
    };
    with_runtime("add_task", |runtime| {
        let mut task = Task::new(title.trim(), runtime.workspace.clock().now_ms());
        task.priority = priority;
        task.category = category.trim().to_string();
        task.due_date = due_epoch_ms;
        task.estimated_pomodoros = estimated_pomodoros.max(1);
        let task_id = runtime
            .controller
            .add_task(&task)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Task created.", Some(task_id)))
    })
}

/// Completes an open task; an already completed task is left as is.
///
/// # FFI contract
/// - Unknown ids fail with `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn complete_task(task_id: String) -> ActionResponse {
    with_runtime("complete_task", |runtime| {
        let task = runtime
            .workspace
            .tasks()
            .get_task(&task_id)
            .ok_or_else(|| format!("task `{task_id}` not found"))?;
        if task.is_completed {
            return Ok(ActionResponse::success(
                "Task already completed.",
                Some(task_id),
            ));
        }
        runtime
            .controller
            .toggle_task_completion(&task_id)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Task completed.", Some(task_id)))
    })
}

/// Flips a task between open and completed.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_task(task_id: String) -> ActionResponse {
    with_runtime("toggle_task", |runtime| {
        let completed = runtime
            .controller
            .toggle_task_completion(&task_id)
            .map_err(|err| err.to_string())?;
        let message = if completed {
            "Task completed."
        } else {
            "Task reopened."
        };
        Ok(ActionResponse::success(message, Some(task_id)))
    })
}

/// Focuses a task for the timer; `None` clears the selection.
#[flutter_rust_bridge::frb(sync)]
pub fn select_task(task_id: Option<String>) -> ActionResponse {
    with_runtime("select_task", |runtime| {
        runtime
            .controller
            .select_task(task_id.as_deref())
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Selection updated.", task_id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn delete_task(task_id: String) -> ActionResponse {
    with_runtime("delete_task", |runtime| {
        runtime
            .controller
            .delete_task(&task_id)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Task deleted.", Some(task_id)))
    })
}

/// Lists open tasks for the signed-in user.
///
/// # FFI contract
/// - Empty list when signed out.
#[flutter_rust_bridge::frb(sync)]
pub fn list_active_tasks() -> TaskListResponse {
    let result = with_runtime_raw(|runtime| {
        runtime
            .controller
            .snapshot()
            .aggregates
            .active_tasks
            .iter()
            .map(to_task_item)
            .collect::<Vec<_>>()
    });
    match result {
        Ok(items) => TaskListResponse {
            ok: true,
            message: format!("{} active task(s).", items.len()),
            items,
        },
        Err(message) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("list_active_tasks failed: {message}"),
        },
    }
}

/// Records a finished timer interval and returns the next plan.
///
/// Input semantics:
/// - `kind`: `WORK|SHORT_BREAK|LONG_BREAK`, case-insensitive.
/// - `started_epoch_ms`: when the interval started.
#[flutter_rust_bridge::frb(sync)]
pub fn complete_session(
    kind: String,
    duration_minutes: i64,
    started_epoch_ms: i64,
) -> SessionResponse {
    let Some(kind) = SessionKind::parse(&kind) else {
        return SessionResponse::failure(format!(
            "complete_session failed: unsupported kind `{}`",
            kind.trim()
        ));
    };
    let result = with_runtime_raw(|runtime| {
        runtime
            .controller
            .complete_session(kind, duration_minutes, started_epoch_ms)
    });
    match result {
        Ok(Ok(outcome)) => SessionResponse {
            ok: true,
            session_id: Some(outcome.session_id),
            task_completed: outcome
                .progress
                .map(|progress| progress.auto_completed)
                .unwrap_or(false),
            next_kind: outcome.next.kind.as_str().to_string(),
            next_duration_minutes: outcome.next.duration_minutes,
            next_auto_start: outcome.next.auto_start,
            message: "Session recorded.".to_string(),
        },
        Ok(Err(err)) => SessionResponse::failure(format!("complete_session failed: {err}")),
        Err(message) => SessionResponse::failure(format!("complete_session failed: {message}")),
    }
}

/// Drains alarm commands queued since the last call.
///
/// # FFI contract
/// - The host applies them in order to its platform alarm manager.
/// - Empty when no workspace is open.
#[flutter_rust_bridge::frb(sync)]
pub fn take_alarm_commands() -> Vec<AlarmCommand> {
    with_runtime_raw(|runtime| runtime.alarms.drain()).unwrap_or_default()
}

/// Tells the core whether the platform grants exact alarms.
///
/// When denied, later alarms are queued as `schedule_inexact`.
#[flutter_rust_bridge::frb(sync)]
pub fn set_exact_alarms_allowed(allowed: bool) -> ActionResponse {
    with_runtime("set_exact_alarms_allowed", |runtime| {
        runtime.alarms.exact_allowed.store(allowed, Ordering::SeqCst);
        Ok(ActionResponse::success("Alarm mode updated.", None))
    })
}

/// Handles a platform alarm that fired.
///
/// Input semantics:
/// - `request_code`, `task_id`, `kind` and `fire_at_ms` echo the
///   `AlarmCommand` that armed it.
#[flutter_rust_bridge::frb(sync)]
pub fn handle_alarm(
    request_code: i32,
    task_id: String,
    kind: String,
    fire_at_ms: i64,
) -> NotificationResponse {
    let Some(kind) = AlarmKind::parse(&kind) else {
        return NotificationResponse::hidden(
            false,
            format!("handle_alarm failed: unsupported kind `{}`", kind.trim()),
        );
    };
    let request = AlarmRequest {
        request_code,
        task_id,
        task_title: String::new(),
        kind,
        fire_at_ms,
    };
    let result = with_runtime_raw(|runtime| {
        runtime
            .workspace
            .receiver(Arc::new(ReturnedNotifications))
            .map(|receiver| receiver.on_alarm(&request))
    });
    match result {
        Ok(Some(Some(notification))) => NotificationResponse {
            ok: true,
            show: true,
            notification_id: notification.notification_id,
            task_id: notification.task_id,
            title: notification.title,
            body: notification.body,
            actions: notification
                .actions
                .iter()
                .map(|action| action.as_str().to_string())
                .collect(),
            message: String::new(),
        },
        Ok(Some(None)) => NotificationResponse::hidden(true, "Nothing to show."),
        Ok(None) => NotificationResponse::hidden(false, "handle_alarm failed: alarms not attached"),
        Err(message) => NotificationResponse::hidden(false, format!("handle_alarm failed: {message}")),
    }
}

/// Applies a notification button press.
///
/// Input semantics:
/// - `action`: `mark_complete|snooze`, case-insensitive.
#[flutter_rust_bridge::frb(sync)]
pub fn handle_notification_action(task_id: String, action: String) -> ActionResponse {
    let Some(action) = NotificationAction::parse(&action) else {
        return ActionResponse::failure(format!(
            "handle_notification_action failed: unsupported action `{}`",
            action.trim()
        ));
    };
    with_runtime("handle_notification_action", |runtime| {
        let receiver = runtime
            .workspace
            .receiver(Arc::new(ReturnedNotifications))
            .ok_or_else(|| "alarms not attached".to_string())?;
        receiver
            .on_action(&task_id, action)
            .map_err(|err| err.to_string())?;
        runtime.controller.refresh();
        Ok(ActionResponse::success("Action applied.", Some(task_id)))
    })
}

/// Re-arms alarms after a device restart.
///
/// # FFI contract
/// - Call once the user is signed in; the resulting commands are queued.
#[flutter_rust_bridge::frb(sync)]
pub fn reschedule_after_boot() -> RescheduleResponse {
    let result = with_runtime_raw(|runtime| runtime.workspace.reschedule_after_boot());
    match result {
        Ok(Some(report)) => RescheduleResponse {
            ok: true,
            tasks_seen: to_u32(report.tasks_seen),
            tasks_rearmed: to_u32(report.tasks_rearmed),
            alarms_armed: to_u32(report.alarms_armed),
            failures: to_u32(report.failures),
            message: format!("{} task(s) re-armed.", report.tasks_rearmed),
        },
        Ok(None) => RescheduleResponse {
            ok: false,
            tasks_seen: 0,
            tasks_rearmed: 0,
            alarms_armed: 0,
            failures: 0,
            message: "reschedule_after_boot failed: alarms not attached".to_string(),
        },
        Err(message) => RescheduleResponse {
            ok: false,
            tasks_seen: 0,
            tasks_rearmed: 0,
            alarms_armed: 0,
            failures: 0,
            message: format!("reschedule_after_boot failed: {message}"),
        },
    }
}

/// Today's counts from the controller's current view.
#[flutter_rust_bridge::frb(sync)]
pub fn today_summary() -> TodaySummary {
    let result = with_runtime_raw(|runtime| runtime.controller.snapshot());
    match result {
        Ok(state) => {
            let aggregates = state.aggregates;
            TodaySummary {
                ok: true,
                completed_today: to_u32(aggregates.completed_today),
                focus_minutes: aggregates.today_focus_minutes,
                work_sessions: to_u32(aggregates.today_work_sessions),
                active_tasks: to_u32(aggregates.active_tasks.len()),
                overdue_tasks: to_u32(aggregates.overdue_tasks),
                message: state.error_message.unwrap_or_default(),
            }
        }
        Err(message) => TodaySummary {
            ok: false,
            completed_today: 0,
            focus_minutes: 0,
            work_sessions: 0,
            active_tasks: 0,
            overdue_tasks: 0,
            message: format!("today_summary failed: {message}"),
        },
    }
}

fn runtime_slot() -> MutexGuard<'static, Option<Runtime>> {
    lock(RUNTIME.get_or_init(|| Mutex::new(None)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_runtime_raw<T>(f: impl FnOnce(&Runtime) -> T) -> Result<T, String> {
    let slot = runtime_slot();
    let runtime = slot
        .as_ref()
        .ok_or_else(|| "workspace is not open".to_string())?;
    Ok(f(runtime))
}

fn with_runtime(
    operation: &str,
    f: impl FnOnce(&Runtime) -> Result<ActionResponse, String>,
) -> ActionResponse {
    match with_runtime_raw(f) {
        Ok(Ok(response)) => response,
        Ok(Err(message)) | Err(message) => {
            ActionResponse::failure(format!("{operation} failed: {message}"))
        }
    }
}

fn to_task_item(task: &Task) -> TaskItem {
    TaskItem {
        task_id: task.id.clone(),
        title: task.title.clone(),
        priority: task.priority.as_str().to_string(),
        category: task.category.clone(),
        due_epoch_ms: task.due_date,
        completed_pomodoros: task.completed_pomodoros,
        estimated_pomodoros: task.estimated_pomodoros,
        is_in_progress: task.is_in_progress,
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        add_task, complete_session, complete_task, core_version, handle_alarm,
        handle_notification_action, init_logging, list_active_tasks, open_workspace, ping,
        reschedule_after_boot, select_task, set_exact_alarms_allowed, sign_in, sign_out,
        take_alarm_commands, today_summary, toggle_task,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now_ms() -> i64 {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        i64::try_from(elapsed.as_millis()).unwrap()
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn bad_inputs_fail_before_touching_the_workspace() {
        assert!(!open_workspace("  ".to_string(), String::new()).ok);
        assert!(!add_task(
            "x".to_string(),
            "urgent".to_string(),
            String::new(),
            None,
            1
        )
        .ok);
        assert!(!complete_session("nap".to_string(), 25, 0).ok);
    }

    // The workspace is process-wide, so the whole flow lives in one test.
    #[test]
    fn task_and_timer_flow_through_the_open_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tempo.db");
        let opened = open_workspace(db_path.to_str().unwrap().to_string(), String::new());
        assert!(opened.ok, "{}", opened.message);

        let anonymous = add_task("x".to_string(), String::new(), String::new(), None, 1);
        assert!(!anonymous.ok);

        assert!(sign_in("user-ffi".to_string()).ok);
        let created = add_task(
            "write report".to_string(),
            "high".to_string(),
            "Work".to_string(),
            None,
            1,
        );
        assert!(created.ok, "{}", created.message);
        let task_id = created.task_id.unwrap();

        let listed = list_active_tasks();
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].priority, "HIGH");

        assert!(select_task(Some(task_id.clone())).ok);
        let session = complete_session("work".to_string(), 25, 1_700_000_000_000);
        assert!(session.ok, "{}", session.message);
        assert!(session.task_completed);
        assert_eq!(session.next_kind, "SHORT_BREAK");

        assert!(list_active_tasks().items.is_empty());
        let reopened = toggle_task(task_id.clone());
        assert!(reopened.ok);
        assert_eq!(reopened.message, "Task reopened.");

        let summary = today_summary();
        assert!(summary.ok);
        assert_eq!(summary.active_tasks, 1);

        assert_eq!(complete_task(task_id.clone()).message, "Task completed.");
        assert_eq!(complete_task(task_id).message, "Task already completed.");
        assert!(!complete_task("missing".to_string()).ok);
        assert!(list_active_tasks().items.is_empty());

        take_alarm_commands();
        let due = now_ms() + 2 * 60 * 60_000;
        let dated = add_task(
            "call dentist".to_string(),
            String::new(),
            String::new(),
            Some(due),
            1,
        );
        assert!(dated.ok, "{}", dated.message);
        let dated_id = dated.task_id.unwrap();
        let armed = take_alarm_commands();
        assert_eq!(armed.len(), 2);
        assert!(armed.iter().all(|command| command.op == "schedule_exact"));
        assert!(take_alarm_commands().is_empty());

        let reminder = armed
            .iter()
            .find(|command| command.kind == "reminder")
            .unwrap();
        let shown = handle_alarm(
            reminder.request_code,
            reminder.task_id.clone(),
            reminder.kind.clone(),
            reminder.fire_at_ms,
        );
        assert!(shown.ok && shown.show, "{}", shown.message);
        assert_eq!(shown.task_id, dated_id);
        assert!(shown.actions.contains(&"mark_complete".to_string()));
        assert!(!handle_alarm(1, dated_id.clone(), "nudge".to_string(), due).ok);
        assert!(!handle_notification_action(dated_id.clone(), "dismiss".to_string()).ok);

        let pressed = handle_notification_action(dated_id.clone(), "MARK_COMPLETE".to_string());
        assert!(pressed.ok, "{}", pressed.message);
        assert!(take_alarm_commands()
            .iter()
            .any(|command| command.op == "cancel"));
        let stale = handle_alarm(
            reminder.request_code,
            dated_id,
            "reminder".to_string(),
            reminder.fire_at_ms,
        );
        assert!(stale.ok && !stale.show);

        assert!(set_exact_alarms_allowed(false).ok);
        let relaxed = add_task("pay rent".to_string(), String::new(), String::new(), Some(due), 1);
        assert!(relaxed.ok, "{}", relaxed.message);
        let queued = take_alarm_commands();
        assert!(!queued.is_empty());
        assert!(queued.iter().all(|command| command.op == "schedule_inexact"));

        let boot = reschedule_after_boot();
        assert!(boot.ok, "{}", boot.message);
        assert_eq!(boot.tasks_rearmed, 1);
        let rearmed = take_alarm_commands();
        assert_eq!(
            rearmed
                .iter()
                .filter(|command| command.op == "schedule_inexact")
                .count(),
            2
        );

        assert!(sign_out().ok);
        assert!(list_active_tasks().items.is_empty());
    }
}
