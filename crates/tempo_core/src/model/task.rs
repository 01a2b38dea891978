//! Task domain model.
//!
//! # Responsibility
//! - Define the task record shown in the task list and focused by the timer.
//! - Provide completion/focus helpers and recurrence arithmetic.
//!
//! # Invariants
//! - `is_completed == true` implies `completed_at` should be set.
//! - At most one task per user is expected to carry `is_in_progress`.
//! - Subtasks have no lifecycle of their own; the list is replaced whole.

use crate::clock::local_datetime;
use crate::model::{new_id, ModelValidationError};
use chrono::{Days, Months};
use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Task urgency. Ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parses a stored priority name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

/// How a task repeats once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => Some(Self::None),
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// Next due instant after `due_ms`, keeping the local wall-clock time.
    ///
    /// Returns `None` for non-recurring tasks or unrepresentable dates.
    pub fn next_due(self, due_ms: i64) -> Option<i64> {
        let due = local_datetime(due_ms)?;
        let next = match self {
            Self::None => return None,
            Self::Daily => due.checked_add_days(Days::new(1))?,
            Self::Weekly => due.checked_add_days(Days::new(7))?,
            Self::Monthly => due.checked_add_months(Months::new(1))?,
        };
        Some(next.timestamp_millis())
    }
}

/// Checklist item embedded in a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl Subtask {
    pub fn new(title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            is_completed: false,
            created_at,
        }
    }
}

/// One task owned by the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    /// Set while the task is focused in the timer screen.
    pub is_in_progress: bool,
    pub priority: Priority,
    pub category: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub due_date: Option<i64>,
    pub last_worked_at: Option<i64>,
    pub estimated_pomodoros: i64,
    pub completed_pomodoros: i64,
    pub subtasks: Vec<Subtask>,
    pub tags: Vec<String>,
    pub recurrence: RecurrenceType,
}

impl Task {
    /// Creates a new, open task with a generated id.
    pub fn new(title: impl Into<String>, created_at: i64) -> Self {
        Self::with_id(new_id(), title, created_at)
    }

    /// Creates a task with a caller-provided id (import and seeding paths).
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            is_completed: false,
            is_in_progress: false,
            priority: Priority::default(),
            category: String::new(),
            created_at,
            completed_at: None,
            due_date: None,
            last_worked_at: None,
            estimated_pomodoros: 1,
            completed_pomodoros: 0,
            subtasks: Vec::new(),
            tags: Vec::new(),
            recurrence: RecurrenceType::None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.trim().is_empty() {
            return Err(ModelValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::EmptyTitle);
        }
        if self.estimated_pomodoros < 0 {
            return Err(ModelValidationError::NegativeCount {
                field: "estimated_pomodoros",
                value: self.estimated_pomodoros,
            });
        }
        if self.completed_pomodoros < 0 {
            return Err(ModelValidationError::NegativeCount {
                field: "completed_pomodoros",
                value: self.completed_pomodoros,
            });
        }
        Ok(())
    }

    /// Whether recorded sessions have reached the estimate.
    pub fn estimate_reached(&self) -> bool {
        self.estimated_pomodoros > 0 && self.completed_pomodoros >= self.estimated_pomodoros
    }

    pub fn is_overdue(&self, now_ms: i64) -> bool {
        !self.is_completed && self.due_date.is_some_and(|due| due < now_ms)
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|item| item.is_completed).count()
    }

    /// Builds the next occurrence of a recurring task, if any.
    ///
    /// The copy gets a fresh id, open state and zeroed progress.
    pub fn next_occurrence(&self, created_at: i64) -> Option<Task> {
        let next_due = self.recurrence.next_due(self.due_date?)?;
        let mut next = Task::new(self.title.clone(), created_at);
        next.description = self.description.clone();
        next.priority = self.priority;
        next.category = self.category.clone();
        next.due_date = Some(next_due);
        next.estimated_pomodoros = self.estimated_pomodoros;
        next.tags = self.tags.clone();
        next.recurrence = self.recurrence;
        next.subtasks = self
            .subtasks
            .iter()
            .map(|item| Subtask::new(item.title.clone(), created_at))
            .collect();
        Some(next)
    }
}
