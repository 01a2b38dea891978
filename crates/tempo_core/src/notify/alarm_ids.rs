//! Persisted alarm identity registry.
//!
//! # Responsibility
//! - Allocate one integer request code per `(task_id, kind)` pair.
//! - Let cancellation find the code that scheduling used.
//!
//! # Invariants
//! - Codes come from an AUTOINCREMENT column and are never reused, so two
//!   live alarms can never share a code.

use super::{AlarmKind, SchedulerError, SchedulerResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub struct AlarmIdRegistry {
    conn: Mutex<Connection>,
}

impl AlarmIdRegistry {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Returns the code for `(task_id, kind)`, allocating one if needed.
    pub fn request_code(&self, task_id: &str, kind: AlarmKind) -> SchedulerResult<i32> {
        let conn = self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        conn.execute(
            "INSERT OR IGNORE INTO alarm_ids (task_id, kind) VALUES (?1, ?2);",
            params![task_id, kind.as_str()],
        )?;
        let code: i64 = conn.query_row(
            "SELECT request_code FROM alarm_ids WHERE task_id = ?1 AND kind = ?2;",
            params![task_id, kind.as_str()],
            |row| row.get(0),
        )?;
        i32::try_from(code).map_err(|_| SchedulerError::RequestCodeExhausted(code))
    }

    /// Looks up an existing code without allocating.
    pub fn lookup(&self, task_id: &str, kind: AlarmKind) -> SchedulerResult<Option<i32>> {
        let conn = self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        let code: Option<i64> = conn
            .query_row(
                "SELECT request_code FROM alarm_ids WHERE task_id = ?1 AND kind = ?2;",
                params![task_id, kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        code.map(|value| i32::try_from(value).map_err(|_| SchedulerError::RequestCodeExhausted(value)))
            .transpose()
    }

    /// Drops one mapping after its alarm is cancelled.
    pub fn release(&self, task_id: &str, kind: AlarmKind) -> SchedulerResult<()> {
        let conn = self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        conn.execute(
            "DELETE FROM alarm_ids WHERE task_id = ?1 AND kind = ?2;",
            params![task_id, kind.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AlarmIdRegistry;
    use crate::db::open_db_in_memory;
    use crate::notify::AlarmKind;

    #[test]
    fn codes_are_stable_per_pair_and_distinct_across_pairs() {
        let registry = AlarmIdRegistry::new(open_db_in_memory().unwrap());
        let reminder = registry.request_code("task-a", AlarmKind::Reminder).unwrap();
        let again = registry.request_code("task-a", AlarmKind::Reminder).unwrap();
        let overdue = registry.request_code("task-a", AlarmKind::Overdue).unwrap();
        let other = registry.request_code("task-b", AlarmKind::Reminder).unwrap();

        assert_eq!(reminder, again);
        assert_ne!(reminder, overdue);
        assert_ne!(reminder, other);
        assert_eq!(
            registry.lookup("task-a", AlarmKind::Overdue).unwrap(),
            Some(overdue)
        );
    }

    #[test]
    fn released_codes_are_not_reused() {
        let registry = AlarmIdRegistry::new(open_db_in_memory().unwrap());
        let first = registry.request_code("task-a", AlarmKind::Reminder).unwrap();
        registry.release("task-a", AlarmKind::Reminder).unwrap();
        assert_eq!(registry.lookup("task-a", AlarmKind::Reminder).unwrap(), None);

        let second = registry.request_code("task-a", AlarmKind::Reminder).unwrap();
        assert_ne!(first, second);
    }
}
