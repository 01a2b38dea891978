//! Task repository over the `tasks` collection.
//!
//! # Responsibility
//! - Map `Task` to and from task documents, including the legacy
//!   `completed` flag written by older clients.
//! - Provide one-shot reads, the live task subscription, and single-update
//!   completion and focus transitions.
//!
//! # Invariants
//! - Completion writes set both completion flags, `completedAt` and clear
//!   `isInProgress` in one update.
//! - `record_pomodoro` increments and auto-completes inside one atomic
//!   document update, so the estimate can trigger completion only once.

use crate::auth::AuthContext;
use crate::clock::Clock;
use crate::model::task::{Priority, RecurrenceType, Subtask, Task, TaskId};
use crate::repo::fields::{bool_field, i64_field, optional_i64, str_field, string_list_field};
use crate::repo::{log_write, read_or_empty, RepoError, RepoResult};
use crate::store::{
    Collection, DocPath, Document, DocumentStore, Listener, Query, SetMode, StoredDocument,
    Subscription,
};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

const FIELD_ID: &str = "id";
const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_IS_COMPLETED: &str = "isCompleted";
const FIELD_LEGACY_COMPLETED: &str = "completed";
const FIELD_IS_IN_PROGRESS: &str = "isInProgress";
const FIELD_PRIORITY: &str = "priority";
const FIELD_CATEGORY: &str = "category";
const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_COMPLETED_AT: &str = "completedAt";
const FIELD_DUE_DATE: &str = "dueDate";
const FIELD_LAST_WORKED_AT: &str = "lastWorkedAt";
const FIELD_ESTIMATED: &str = "estimatedPomodoros";
const FIELD_COMPLETED_POMODOROS: &str = "completedPomodoros";
const FIELD_SUBTASKS: &str = "subtasks";
const FIELD_TAGS: &str = "tags";
const FIELD_RECURRENCE: &str = "recurrenceType";

const COMPLETED_KEYS: &[&str] = &[FIELD_IS_COMPLETED, FIELD_LEGACY_COMPLETED];
const IN_PROGRESS_KEYS: &[&str] = &[FIELD_IS_IN_PROGRESS, "inProgress"];
const COMPLETED_POMODORO_KEYS: &[&str] = &[FIELD_COMPLETED_POMODOROS, "actualPomodoros"];

/// Counter state after one work session was credited to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroProgress {
    pub completed_pomodoros: i64,
    pub estimated_pomodoros: i64,
    /// True only for the update that moved the task into completed state.
    pub auto_completed: bool,
}

/// Repository for the signed-in user's tasks.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
    auth: AuthContext,
    clock: Arc<dyn Clock>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthContext, clock: Arc<dyn Clock>) -> Self {
        Self { store, auth, clock }
    }

    /// User whose tasks this repository currently reads and writes.
    pub fn current_user(&self) -> Option<String> {
        self.auth.current_user()
    }

    pub fn add_task(&self, task: &Task) -> RepoResult<TaskId> {
        log_write("task_add", || {
            task.validate()?;
            let path = self.path(&task.id)?;
            self.store
                .set(&path, task_to_document(task)?, SetMode::Replace)?;
            Ok(task.id.clone())
        })
    }

    /// Replaces all task fields. The task must already exist.
    pub fn update_task(&self, task: &Task) -> RepoResult<()> {
        log_write("task_update", || {
            task.validate()?;
            let path = self.path(&task.id)?;
            self.store.update(&path, task_to_document(task)?)?;
            Ok(())
        })
    }

    pub fn delete_task(&self, task_id: &str) -> RepoResult<()> {
        log_write("task_delete", || {
            let path = self.path(task_id)?;
            self.store.delete(&path)?;
            Ok(())
        })
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        read_or_empty("task_get", || {
            let path = self.path(task_id)?;
            match self.store.get(&path)? {
                Some(document) => task_from_document(task_id, &document).map(Some),
                None => Ok(None),
            }
        })
    }

    /// All tasks, newest first.
    pub fn get_tasks(&self) -> Vec<Task> {
        read_or_empty("task_list", || {
            let user = self.user()?;
            let documents = self.store.query(&user, Collection::Tasks, &Query::new())?;
            Ok(parse_tasks(&documents))
        })
    }

    /// Subscribes to the full task list.
    ///
    /// `on_change` receives the current list right away and again after each
    /// change. Without a signed-in user, or when the store refuses the
    /// subscription, it receives one empty list and the returned handle is
    /// inert.
    pub fn observe_tasks(
        &self,
        on_change: impl Fn(Vec<Task>) + Send + Sync + 'static,
    ) -> Subscription {
        let on_change = Arc::new(on_change);
        let Some(user) = self.auth.current_user() else {
            on_change(Vec::new());
            return Subscription::detached();
        };

        let forward = Arc::clone(&on_change);
        let listener: Listener =
            Arc::new(move |documents: &[StoredDocument]| forward(parse_tasks(documents)));
        match self.store.subscribe(&user, Collection::Tasks, listener) {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!("event=task_observe module=repo status=degraded error={err}");
                on_change(Vec::new());
                Subscription::detached()
            }
        }
    }

    pub fn complete_task(&self, task_id: &str) -> RepoResult<()> {
        log_write("task_complete", || {
            let path = self.path(task_id)?;
            let fields = completion_fields(true, Some(self.clock.now_ms()));
            self.store.update(&path, fields)?;
            Ok(())
        })
    }

    /// Reopens a task and clears its completion timestamp.
    pub fn uncomplete_task(&self, task_id: &str) -> RepoResult<()> {
        log_write("task_uncomplete", || {
            let path = self.path(task_id)?;
            self.store.update(&path, completion_fields(false, None))?;
            Ok(())
        })
    }

    pub fn set_in_progress(&self, task_id: &str, in_progress: bool) -> RepoResult<()> {
        log_write("task_set_in_progress", || {
            let path = self.path(task_id)?;
            let mut fields = Document::new();
            fields.insert(FIELD_IS_IN_PROGRESS.to_string(), Value::Bool(in_progress));
            self.store.update(&path, fields)?;
            Ok(())
        })
    }

    pub fn update_subtasks(&self, task_id: &str, subtasks: &[Subtask]) -> RepoResult<()> {
        log_write("task_update_subtasks", || {
            let path = self.path(task_id)?;
            let mut fields = Document::new();
            fields.insert(FIELD_SUBTASKS.to_string(), subtasks_value(subtasks)?);
            self.store.update(&path, fields)?;
            Ok(())
        })
    }

    /// Credits one finished work session to a task.
    ///
    /// When the new count reaches a positive estimate on an open task, the
    /// same update marks it completed and clears its in-progress flag.
    pub fn record_pomodoro(&self, task_id: &str) -> RepoResult<PomodoroProgress> {
        log_write("task_record_pomodoro", || {
            let path = self.path(task_id)?;
            let now = self.clock.now_ms();
            let mut progress = None;
            self.store.update_with(&path, &mut |document: &mut Document| {
                let completed_pomodoros =
                    i64_field(document, COMPLETED_POMODORO_KEYS).unwrap_or(0) + 1;
                let estimated_pomodoros = i64_field(document, &[FIELD_ESTIMATED]).unwrap_or(0);
                let already_completed = bool_field(document, COMPLETED_KEYS).unwrap_or(false);
                let auto_completed = !already_completed
                    && estimated_pomodoros > 0
                    && completed_pomodoros >= estimated_pomodoros;

                document.insert(
                    FIELD_COMPLETED_POMODOROS.to_string(),
                    Value::from(completed_pomodoros),
                );
                document.insert(FIELD_LAST_WORKED_AT.to_string(), Value::from(now));
                if auto_completed {
                    for (key, value) in completion_fields(true, Some(now)) {
                        document.insert(key, value);
                    }
                }
                progress = Some(PomodoroProgress {
                    completed_pomodoros,
                    estimated_pomodoros,
                    auto_completed,
                });
            })?;
            progress.ok_or_else(|| RepoError::InvalidData(format!("task {task_id} not updated")))
        })
    }

    /// Sets `completedAt` on completed tasks that lack it.
    ///
    /// Uses `lastWorkedAt`, then `createdAt`, then the current time.
    pub fn backfill_completion_timestamps(&self) -> RepoResult<usize> {
        log_write("task_backfill_completed_at", || {
            let user = self.user()?;
            let documents = self.store.query(&user, Collection::Tasks, &Query::new())?;
            let mut fixed = 0;
            for document in documents {
                let completed = bool_field(&document.data, COMPLETED_KEYS).unwrap_or(false);
                let has_timestamp = i64_field(&document.data, &[FIELD_COMPLETED_AT]).is_some();
                if !completed || has_timestamp {
                    continue;
                }
                let completed_at =
                    i64_field(&document.data, &[FIELD_LAST_WORKED_AT, FIELD_CREATED_AT])
                        .unwrap_or_else(|| self.clock.now_ms());
                let path = DocPath::new(&user, Collection::Tasks, &document.id);
                self.store
                    .update(&path, completion_fields(true, Some(completed_at)))?;
                fixed += 1;
            }
            info!("event=task_backfill_completed_at module=repo status=ok fixed={fixed}");
            Ok(fixed)
        })
    }

    fn user(&self) -> RepoResult<String> {
        self.auth.current_user().ok_or(RepoError::Unauthenticated)
    }

    fn path(&self, task_id: &str) -> RepoResult<DocPath> {
        Ok(DocPath::new(&self.user()?, Collection::Tasks, task_id))
    }
}

/// Fields written together by complete/uncomplete.
fn completion_fields(completed: bool, completed_at: Option<i64>) -> Document {
    let mut fields = Document::new();
    fields.insert(FIELD_IS_COMPLETED.to_string(), Value::Bool(completed));
    fields.insert(FIELD_LEGACY_COMPLETED.to_string(), Value::Bool(completed));
    fields.insert(FIELD_COMPLETED_AT.to_string(), optional_i64(completed_at));
    fields.insert(FIELD_IS_IN_PROGRESS.to_string(), Value::Bool(false));
    fields
}

fn parse_tasks(documents: &[StoredDocument]) -> Vec<Task> {
    let mut tasks: Vec<Task> = documents
        .iter()
        .filter_map(|document| match task_from_document(&document.id, &document.data) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(
                    "event=task_parse module=repo status=skipped doc_id={} error={err}",
                    document.id
                );
                None
            }
        })
        .collect();
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    tasks
}

fn subtasks_value(subtasks: &[Subtask]) -> RepoResult<Value> {
    serde_json::to_value(subtasks)
        .map_err(|err| RepoError::InvalidData(format!("subtasks not serializable: {err}")))
}

pub(crate) fn task_to_document(task: &Task) -> RepoResult<Document> {
    let mut doc = Document::new();
    doc.insert(FIELD_ID.to_string(), Value::from(task.id.clone()));
    doc.insert(FIELD_TITLE.to_string(), Value::from(task.title.clone()));
    doc.insert(
        FIELD_DESCRIPTION.to_string(),
        Value::from(task.description.clone()),
    );
    doc.insert(FIELD_IS_COMPLETED.to_string(), Value::Bool(task.is_completed));
    doc.insert(
        FIELD_LEGACY_COMPLETED.to_string(),
        Value::Bool(task.is_completed),
    );
    doc.insert(
        FIELD_IS_IN_PROGRESS.to_string(),
        Value::Bool(task.is_in_progress),
    );
    doc.insert(
        FIELD_PRIORITY.to_string(),
        Value::from(task.priority.as_str()),
    );
    doc.insert(FIELD_CATEGORY.to_string(), Value::from(task.category.clone()));
    doc.insert(FIELD_CREATED_AT.to_string(), Value::from(task.created_at));
    doc.insert(
        FIELD_COMPLETED_AT.to_string(),
        optional_i64(task.completed_at),
    );
    doc.insert(FIELD_DUE_DATE.to_string(), optional_i64(task.due_date));
    doc.insert(
        FIELD_LAST_WORKED_AT.to_string(),
        optional_i64(task.last_worked_at),
    );
    doc.insert(
        FIELD_ESTIMATED.to_string(),
        Value::from(task.estimated_pomodoros),
    );
    doc.insert(
        FIELD_COMPLETED_POMODOROS.to_string(),
        Value::from(task.completed_pomodoros),
    );
    doc.insert(FIELD_SUBTASKS.to_string(), subtasks_value(&task.subtasks)?);
    doc.insert(FIELD_TAGS.to_string(), Value::from(task.tags.clone()));
    doc.insert(
        FIELD_RECURRENCE.to_string(),
        Value::from(task.recurrence.as_str()),
    );
    Ok(doc)
}

pub(crate) fn task_from_document(id: &str, doc: &Document) -> RepoResult<Task> {
    let title = str_field(doc, &[FIELD_TITLE])
        .ok_or_else(|| RepoError::InvalidData(format!("task {id} has no title")))?;

    let subtasks = match doc.get(FIELD_SUBTASKS) {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<Subtask>>(value.clone())
            .map_err(|err| RepoError::InvalidData(format!("task {id} subtasks: {err}")))?,
    };

    let priority = str_field(doc, &[FIELD_PRIORITY])
        .and_then(|value| Priority::parse(&value))
        .unwrap_or_default();
    let recurrence = str_field(doc, &[FIELD_RECURRENCE])
        .and_then(|value| RecurrenceType::parse(&value))
        .unwrap_or_default();

    Ok(Task {
        id: id.to_string(),
        title,
        description: str_field(doc, &[FIELD_DESCRIPTION]).unwrap_or_default(),
        is_completed: bool_field(doc, COMPLETED_KEYS).unwrap_or(false),
        is_in_progress: bool_field(doc, IN_PROGRESS_KEYS).unwrap_or(false),
        priority,
        category: str_field(doc, &[FIELD_CATEGORY]).unwrap_or_default(),
        created_at: i64_field(doc, &[FIELD_CREATED_AT]).unwrap_or(0),
        completed_at: i64_field(doc, &[FIELD_COMPLETED_AT]),
        due_date: i64_field(doc, &[FIELD_DUE_DATE]),
        last_worked_at: i64_field(doc, &[FIELD_LAST_WORKED_AT]),
        estimated_pomodoros: i64_field(doc, &[FIELD_ESTIMATED]).unwrap_or(0),
        completed_pomodoros: i64_field(doc, COMPLETED_POMODORO_KEYS).unwrap_or(0),
        subtasks,
        tags: string_list_field(doc, FIELD_TAGS),
        recurrence,
    })
}

#[cfg(test)]
mod tests {
    use super::{task_from_document, task_to_document};
    use crate::model::task::{Priority, Subtask, Task};
    use serde_json::json;

    #[test]
    fn legacy_completed_flag_is_honoured() {
        let doc = json!({"title": "old", "completed": true, "priority": "high"});
        let task = task_from_document("t1", doc.as_object().unwrap()).unwrap();
        assert!(task.is_completed);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn is_completed_takes_precedence_over_legacy_flag() {
        let doc = json!({"title": "x", "isCompleted": false, "completed": true});
        let task = task_from_document("t1", doc.as_object().unwrap()).unwrap();
        assert!(!task.is_completed);
    }

    #[test]
    fn written_documents_carry_both_completion_keys() {
        let mut task = Task::new("ship release", 10);
        task.is_completed = true;
        task.subtasks.push(Subtask::new("tag build", 10));
        let doc = task_to_document(&task).unwrap();
        assert_eq!(doc["isCompleted"], json!(true));
        assert_eq!(doc["completed"], json!(true));

        let parsed = task_from_document(&task.id, &doc).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn missing_title_or_bad_subtasks_are_rejected() {
        let untitled = json!({"description": "no title"});
        assert!(task_from_document("t1", untitled.as_object().unwrap()).is_err());

        let bad_subtasks = json!({"title": "x", "subtasks": "nope"});
        assert!(task_from_document("t2", bad_subtasks.as_object().unwrap()).is_err());
    }
}
