//! Core domain logic for Tempo: tasks, Pomodoro sessions and reminders.
//! This crate is the single source of truth for business invariants.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod seed;
pub mod service;
pub mod store;
pub mod workspace;

pub use auth::{AuthContext, AuthError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_with_config, logging_status, LoggingError,
};
pub use model::profile::{ProfileUpdate, UserPreferences, UserProfile};
pub use model::session::{PomodoroSession, SessionKind};
pub use model::task::{Priority, RecurrenceType, Subtask, Task, TaskId};
pub use model::ModelValidationError;
pub use repo::{RepoError, RepoResult};
pub use service::focus_controller::{Aggregates, FocusController, SessionOutcome, ViewState};
pub use store::{DocumentStore, SqliteDocumentStore, StoreError, Subscription};
pub use workspace::TempoWorkspace;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
