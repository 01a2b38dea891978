//! Reminder and overdue alarm scheduling for tasks.
//!
//! # Responsibility
//! - Derive per-task fire times and hand them to the alarm backend.
//! - Track each alarm slot through pending, fired and cancelled states.
//!
//! # Invariants
//! - A fire time at or before `now` is skipped, never scheduled.
//! - Exact scheduling is tried first; only `ExactAlarmDenied` falls back to
//!   inexact scheduling, other backend failures propagate.

use super::{
    AlarmBackend, AlarmError, AlarmIdRegistry, AlarmKind, AlarmRequest, ScheduleMode,
    SchedulerError, SchedulerResult,
};
use crate::clock::{Clock, MINUTE_MS};
use crate::config::CoreConfig;
use crate::model::task::Task;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle of one `(task, kind)` alarm slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending {
        request_code: i32,
        fire_at_ms: i64,
        mode: ScheduleMode,
    },
    Fired,
    Cancelled,
}

/// One alarm accepted by the backend during a scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAlarm {
    pub request: AlarmRequest,
    pub mode: ScheduleMode,
}

type SlotKey = (String, AlarmKind);

pub struct NotificationScheduler {
    backend: Arc<dyn AlarmBackend>,
    ids: AlarmIdRegistry,
    clock: Arc<dyn Clock>,
    reminder_minutes: i64,
    snooze_minutes: i64,
    slots: Mutex<HashMap<SlotKey, SlotState>>,
}

impl NotificationScheduler {
    pub fn new(
        backend: Arc<dyn AlarmBackend>,
        ids: AlarmIdRegistry,
        clock: Arc<dyn Clock>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            backend,
            ids,
            clock,
            reminder_minutes: config.reminder_minutes,
            snooze_minutes: config.snooze_minutes,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn reminder_minutes(&self) -> i64 {
        self.reminder_minutes
    }

    /// Fire times for a task's reminder and overdue alarms, not yet filtered
    /// against now. The reminder is left out when its time underflows.
    pub fn fire_times(&self, due_ms: i64) -> Vec<(AlarmKind, i64)> {
        let reminder = self
            .reminder_minutes
            .checked_mul(MINUTE_MS)
            .and_then(|lead| due_ms.checked_sub(lead));
        let mut times = Vec::with_capacity(2);
        if let Some(fire_at_ms) = reminder {
            times.push((AlarmKind::Reminder, fire_at_ms));
        }
        times.push((AlarmKind::Overdue, due_ms));
        times
    }

    /// Replaces the task's reminder and overdue alarms.
    ///
    /// Completed tasks and tasks without a due date end with no pending
    /// alarms. Returns the alarms that were actually armed.
    pub fn schedule_task(&self, task: &Task) -> SchedulerResult<Vec<ScheduledAlarm>> {
        self.cancel_kinds(&task.id, &[AlarmKind::Reminder, AlarmKind::Overdue])?;

        let Some(due_ms) = task.due_date else {
            return Ok(Vec::new());
        };
        if task.is_completed {
            return Ok(Vec::new());
        }

        let now = self.clock.now_ms();
        let mut armed = Vec::new();
        for (kind, fire_at_ms) in self.fire_times(due_ms) {
            if fire_at_ms <= now {
                info!(
                    "event=alarm_schedule module=notify status=skipped kind={} reason=past",
                    kind.as_str()
                );
                continue;
            }
            armed.push(self.arm(&task.id, &task.title, kind, fire_at_ms)?);
        }
        Ok(armed)
    }

    /// Arms a one-shot snooze alarm `snooze_minutes` from now.
    pub fn snooze(&self, task_id: &str, task_title: &str) -> SchedulerResult<ScheduledAlarm> {
        self.cancel_kinds(task_id, &[AlarmKind::Snooze])?;
        let fire_at_ms = self
            .clock
            .now_ms()
            .saturating_add(self.snooze_minutes.saturating_mul(MINUTE_MS));
        self.arm(task_id, task_title, AlarmKind::Snooze, fire_at_ms)
    }

    /// Cancels every alarm slot of a task.
    pub fn cancel_task(&self, task_id: &str) -> SchedulerResult<()> {
        self.cancel_kinds(task_id, &AlarmKind::ALL)
    }

    /// Cancels all alarms and drops the task's request codes.
    pub fn forget_task(&self, task_id: &str) -> SchedulerResult<()> {
        self.cancel_task(task_id)?;
        for kind in AlarmKind::ALL {
            self.ids.release(task_id, kind)?;
        }
        let mut slots = self.lock_slots()?;
        slots.retain(|(slot_task, _), _| slot_task != task_id);
        Ok(())
    }

    /// Records that the platform delivered an alarm.
    pub fn mark_fired(&self, request: &AlarmRequest) -> SchedulerResult<()> {
        let mut slots = self.lock_slots()?;
        slots.insert((request.task_id.clone(), request.kind), SlotState::Fired);
        Ok(())
    }

    pub fn slot_state(&self, task_id: &str, kind: AlarmKind) -> Option<SlotState> {
        let slots = self.slots.lock().ok()?;
        slots.get(&(task_id.to_string(), kind)).copied()
    }

    /// Number of slots currently waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.slots.lock().map_or(0, |slots| {
            slots
                .values()
                .filter(|state| matches!(state, SlotState::Pending { .. }))
                .count()
        })
    }

    fn arm(
        &self,
        task_id: &str,
        task_title: &str,
        kind: AlarmKind,
        fire_at_ms: i64,
    ) -> SchedulerResult<ScheduledAlarm> {
        let request = AlarmRequest {
            request_code: self.ids.request_code(task_id, kind)?,
            task_id: task_id.to_string(),
            task_title: task_title.to_string(),
            kind,
            fire_at_ms,
        };

        let mode = match self.backend.schedule_exact(&request) {
            Ok(()) => ScheduleMode::Exact,
            Err(AlarmError::ExactAlarmDenied) => {
                warn!(
                    "event=alarm_schedule module=notify status=degraded kind={} mode=inexact",
                    kind.as_str()
                );
                self.backend.schedule_inexact(&request)?;
                ScheduleMode::Inexact
            }
            Err(err) => {
                warn!(
                    "event=alarm_schedule module=notify status=error kind={} error={err}",
                    kind.as_str()
                );
                return Err(SchedulerError::Alarm(err));
            }
        };

        self.lock_slots()?.insert(
            (task_id.to_string(), kind),
            SlotState::Pending {
                request_code: request.request_code,
                fire_at_ms,
                mode,
            },
        );
        info!(
            "event=alarm_schedule module=notify status=ok kind={} request_code={}",
            kind.as_str(),
            request.request_code
        );
        Ok(ScheduledAlarm { request, mode })
    }

    fn cancel_kinds(&self, task_id: &str, kinds: &[AlarmKind]) -> SchedulerResult<()> {
        for &kind in kinds {
            let Some(request_code) = self.ids.lookup(task_id, kind)? else {
                continue;
            };
            self.backend.cancel(request_code)?;
            let mut slots = self.lock_slots()?;
            if let Some(state) = slots.get_mut(&(task_id.to_string(), kind)) {
                if matches!(state, SlotState::Pending { .. }) {
                    *state = SlotState::Cancelled;
                }
            }
        }
        Ok(())
    }

    fn lock_slots(&self) -> SchedulerResult<MutexGuard<'_, HashMap<SlotKey, SlotState>>> {
        self.slots.lock().map_err(|_| SchedulerError::LockPoisoned)
    }
}
