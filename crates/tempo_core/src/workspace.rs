//! Wiring of store, repositories and services for one database.
//!
//! # Responsibility
//! - Open the document store and share it across repositories.
//! - Hand out controllers, the seeder and alarm components bound to the
//!   same auth context and clock.

use crate::auth::AuthContext;
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::notify::boot::{reschedule_after_boot, RescheduleReport};
use crate::notify::receiver::AlarmReceiver;
use crate::notify::scheduler::NotificationScheduler;
use crate::notify::{AlarmBackend, AlarmIdRegistry, NotificationSink};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::session_repo::SessionRepository;
use crate::repo::task_repo::TaskRepository;
use crate::seed::DataSeeder;
use crate::service::analytics::{load_report, AnalyticsReport};
use crate::service::completion::TaskCompletion;
use crate::service::focus_controller::FocusController;
use crate::store::{DocumentStore, SqliteDocumentStore};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct TempoWorkspace {
    db_path: Option<PathBuf>,
    config: CoreConfig,
    auth: AuthContext,
    clock: Arc<dyn Clock>,
    tasks: TaskRepository,
    sessions: SessionRepository,
    profiles: ProfileRepository,
    scheduler: Option<Arc<NotificationScheduler>>,
}

impl TempoWorkspace {
    /// Opens (or creates) a file-backed workspace using the system clock.
    pub fn open(path: impl AsRef<Path>, config: CoreConfig) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path)?;
        info!("event=workspace_open module=workspace status=ok mode=file");
        Ok(Self::build(conn, Some(path), config, Arc::new(SystemClock)))
    }

    /// Opens a throwaway in-memory workspace with an injected clock.
    pub fn open_in_memory(config: CoreConfig, clock: Arc<dyn Clock>) -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        info!("event=workspace_open module=workspace status=ok mode=memory");
        Ok(Self::build(conn, None, config, clock))
    }

    fn build(
        conn: Connection,
        db_path: Option<PathBuf>,
        config: CoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(conn));
        let auth = AuthContext::new();
        Self {
            db_path,
            tasks: TaskRepository::new(Arc::clone(&store), auth.clone(), Arc::clone(&clock)),
            sessions: SessionRepository::new(Arc::clone(&store), auth.clone()),
            profiles: ProfileRepository::new(store, auth.clone(), Arc::clone(&clock)),
            config,
            auth,
            clock,
            scheduler: None,
        }
    }

    /// Connects a platform alarm backend; later controllers keep alarms in
    /// sync with task writes.
    pub fn attach_alarms(
        &mut self,
        backend: Arc<dyn AlarmBackend>,
    ) -> DbResult<Arc<NotificationScheduler>> {
        let conn = match &self.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        let scheduler = Arc::new(NotificationScheduler::new(
            backend,
            AlarmIdRegistry::new(conn),
            Arc::clone(&self.clock),
            &self.config,
        ));
        self.scheduler = Some(Arc::clone(&scheduler));
        Ok(scheduler)
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn tasks(&self) -> &TaskRepository {
        &self.tasks
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn profiles(&self) -> &ProfileRepository {
        &self.profiles
    }

    pub fn scheduler(&self) -> Option<Arc<NotificationScheduler>> {
        self.scheduler.clone()
    }

    pub fn controller(&self) -> FocusController {
        let controller = FocusController::new(
            self.tasks.clone(),
            self.sessions.clone(),
            self.profiles.clone(),
            Arc::clone(&self.clock),
        );
        match &self.scheduler {
            Some(scheduler) => controller.with_scheduler(Arc::clone(scheduler)),
            None => controller,
        }
    }

    /// Completion use-case bound to the attached scheduler, if any.
    pub fn completion(&self) -> TaskCompletion {
        let completion = TaskCompletion::new(
            self.tasks.clone(),
            self.profiles.clone(),
            Arc::clone(&self.clock),
        );
        match &self.scheduler {
            Some(scheduler) => completion.with_scheduler(Arc::clone(scheduler)),
            None => completion,
        }
    }

    /// Receiver for delivered alarms. `None` until alarms are attached.
    pub fn receiver(&self, sink: Arc<dyn NotificationSink>) -> Option<AlarmReceiver> {
        let scheduler = self.scheduler.clone()?;
        Some(AlarmReceiver::new(self.completion(), scheduler, sink))
    }

    /// Boot-time alarm pass. `None` until alarms are attached.
    pub fn reschedule_after_boot(&self) -> Option<RescheduleReport> {
        let scheduler = self.scheduler.as_ref()?;
        Some(reschedule_after_boot(
            &self.tasks,
            scheduler,
            self.clock.as_ref(),
        ))
    }

    pub fn seeder(&self) -> DataSeeder {
        DataSeeder::new(
            self.tasks.clone(),
            self.sessions.clone(),
            self.profiles.clone(),
            Arc::clone(&self.clock),
            &self.config,
        )
    }

    pub fn analytics(&self, start: NaiveDate, end: NaiveDate) -> AnalyticsReport {
        load_report(&self.tasks, &self.sessions, start, end)
    }
}
