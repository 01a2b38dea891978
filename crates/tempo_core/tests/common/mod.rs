//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use tempo_core::clock::{local_day_start_ms, HOUR_MS};
use tempo_core::notify::{
    AlarmBackend, AlarmError, AlarmRequest, Notification, NotificationSink,
};
use tempo_core::repo::profile_repo::ProfileRepository;
use tempo_core::repo::session_repo::SessionRepository;
use tempo_core::repo::task_repo::TaskRepository;
use tempo_core::{AuthContext, Clock, DocumentStore, ManualClock, SqliteDocumentStore};

pub const USER: &str = "user-1";

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

/// Local 10:00 on 2024-06-10.
pub fn fixed_now() -> i64 {
    local_day_start_ms(day(10)).unwrap() + 10 * HOUR_MS
}

pub struct Harness {
    pub store: Arc<SqliteDocumentStore>,
    pub auth: AuthContext,
    pub clock: Arc<ManualClock>,
    pub tasks: TaskRepository,
    pub sessions: SessionRepository,
    pub profiles: ProfileRepository,
}

impl Harness {
    pub fn signed_in() -> Self {
        let harness = Self::signed_out();
        harness.auth.sign_in(USER).unwrap();
        harness
    }

    pub fn signed_out() -> Self {
        let conn = tempo_core::db::open_db_in_memory().unwrap();
        let store = Arc::new(SqliteDocumentStore::new(conn));
        let auth = AuthContext::new();
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let shared: Arc<dyn DocumentStore> = store.clone();
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        Self {
            tasks: TaskRepository::new(Arc::clone(&shared), auth.clone(), Arc::clone(&dyn_clock)),
            sessions: SessionRepository::new(Arc::clone(&shared), auth.clone()),
            profiles: ProfileRepository::new(shared, auth.clone(), dyn_clock),
            store,
            auth,
            clock,
        }
    }

    pub fn dyn_clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    pub deny_exact: bool,
    pub exact: Mutex<Vec<AlarmRequest>>,
    pub inexact: Mutex<Vec<AlarmRequest>>,
    pub cancelled: Mutex<Vec<i32>>,
}

impl RecordingBackend {
    pub fn armed(&self) -> Vec<AlarmRequest> {
        let mut all = self.exact.lock().unwrap().clone();
        all.extend(self.inexact.lock().unwrap().iter().cloned());
        all
    }
}

impl AlarmBackend for RecordingBackend {
    fn schedule_exact(&self, request: &AlarmRequest) -> Result<(), AlarmError> {
        if self.deny_exact {
            return Err(AlarmError::ExactAlarmDenied);
        }
        self.exact.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn schedule_inexact(&self, request: &AlarmRequest) -> Result<(), AlarmError> {
        self.inexact.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn cancel(&self, request_code: i32) -> Result<(), AlarmError> {
        self.cancelled.lock().unwrap().push(request_code);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub shown: Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn show(&self, notification: &Notification) {
        self.shown.lock().unwrap().push(notification.clone());
    }
}
