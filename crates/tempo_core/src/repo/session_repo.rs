//! Pomodoro session repository over the `sessions` collection.
//!
//! # Responsibility
//! - Record completed sessions and answer date-range queries.
//! - Repair `date` strings that drifted from `startTime`.
//!
//! # Invariants
//! - `record_session` always stores the date derived from `start_time`.
//! - Range queries compare `date` strings inclusively on both bounds.

use crate::auth::AuthContext;
use crate::clock::{format_date, local_date_string};
use crate::model::session::PomodoroSession;
use crate::repo::fields::{i64_field, str_field};
use crate::repo::{log_write, read_or_empty, RepoError, RepoResult};
use crate::store::{
    Collection, DocPath, Document, DocumentStore, Query, SetMode, StoredDocument,
};
use chrono::NaiveDate;
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

const FIELD_DATE: &str = "date";
const FIELD_START_TIME: &str = "startTime";
const FIELD_TASK_ID: &str = "taskId";

/// Repository for the signed-in user's Pomodoro sessions.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn DocumentStore>,
    auth: AuthContext,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthContext) -> Self {
        Self { store, auth }
    }

    /// Stores a session, normalizing its `date` to the start instant.
    pub fn record_session(&self, session: &PomodoroSession) -> RepoResult<String> {
        log_write("session_record", || {
            session.validate()?;
            let user = self.user()?;
            let mut normalized = session.clone();
            normalized.date = session.derived_date();
            let path = DocPath::new(&user, Collection::Sessions, &normalized.id);
            self.store
                .set(&path, session_to_document(&normalized)?, SetMode::Replace)?;
            Ok(normalized.id)
        })
    }

    /// Sessions whose date lies in `start..=end`, oldest first.
    pub fn get_sessions_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<PomodoroSession> {
        if start > end {
            return Vec::new();
        }
        read_or_empty("session_range", || {
            let query = Query::new()
                .where_between(FIELD_DATE, format_date(start), format_date(end))
                .order_by(FIELD_START_TIME, false);
            self.run_query(&query)
        })
    }

    pub fn get_sessions_for_date(&self, date: NaiveDate) -> Vec<PomodoroSession> {
        self.get_sessions_between(date, date)
    }

    pub fn get_sessions_for_task(&self, task_id: &str) -> Vec<PomodoroSession> {
        read_or_empty("session_for_task", || {
            let query = Query::new()
                .where_eq(FIELD_TASK_ID, task_id)
                .order_by(FIELD_START_TIME, false);
            self.run_query(&query)
        })
    }

    pub fn get_all_sessions(&self) -> Vec<PomodoroSession> {
        read_or_empty("session_list", || {
            self.run_query(&Query::new().order_by(FIELD_START_TIME, false))
        })
    }

    /// Rewrites `date` on every session where it disagrees with `startTime`.
    pub fn backfill_session_dates(&self) -> RepoResult<usize> {
        log_write("session_backfill_dates", || {
            let user = self.user()?;
            let documents = self
                .store
                .query(&user, Collection::Sessions, &Query::new())?;
            let mut fixed = 0;
            for document in documents {
                let Some(start_time) = i64_field(&document.data, &[FIELD_START_TIME]) else {
                    continue;
                };
                let derived = local_date_string(start_time);
                if derived.is_empty()
                    || str_field(&document.data, &[FIELD_DATE]).as_deref() == Some(derived.as_str())
                {
                    continue;
                }
                let mut fields = Document::new();
                fields.insert(FIELD_DATE.to_string(), Value::from(derived));
                let path = DocPath::new(&user, Collection::Sessions, &document.id);
                self.store.update(&path, fields)?;
                fixed += 1;
            }
            info!("event=session_backfill_dates module=repo status=ok fixed={fixed}");
            Ok(fixed)
        })
    }

    fn run_query(&self, query: &Query) -> RepoResult<Vec<PomodoroSession>> {
        let user = self.user()?;
        let documents = self.store.query(&user, Collection::Sessions, query)?;
        Ok(parse_sessions(&documents))
    }

    fn user(&self) -> RepoResult<String> {
        self.auth.current_user().ok_or(RepoError::Unauthenticated)
    }
}

fn parse_sessions(documents: &[StoredDocument]) -> Vec<PomodoroSession> {
    documents
        .iter()
        .filter_map(|document| match session_from_document(document) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(
                    "event=session_parse module=repo status=skipped doc_id={} error={err}",
                    document.id
                );
                None
            }
        })
        .collect()
}

fn session_to_document(session: &PomodoroSession) -> RepoResult<Document> {
    match serde_json::to_value(session) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(RepoError::InvalidData(format!(
            "session serialized to non-object: {other}"
        ))),
        Err(err) => Err(RepoError::InvalidData(format!(
            "session not serializable: {err}"
        ))),
    }
}

fn session_from_document(document: &StoredDocument) -> RepoResult<PomodoroSession> {
    let mut session: PomodoroSession =
        serde_json::from_value(Value::Object(document.data.clone())).map_err(|err| {
            RepoError::InvalidData(format!("session {}: {err}", document.id))
        })?;
    session.id = document.id.clone();
    if session.date.is_empty() {
        session.date = session.derived_date();
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::session_from_document;
    use crate::store::StoredDocument;
    use serde_json::json;

    #[test]
    fn missing_date_is_derived_from_start() {
        let document = StoredDocument {
            id: "s1".to_string(),
            data: json!({
                "sessionType": "WORK",
                "durationMinutes": 25,
                "startTime": 1_700_000_000_000_i64,
                "isCompleted": true
            })
            .as_object()
            .cloned()
            .unwrap(),
        };
        let session = session_from_document(&document).unwrap();
        assert_eq!(session.id, "s1");
        assert!(session.has_consistent_date());
    }

    #[test]
    fn unknown_session_type_is_malformed() {
        let document = StoredDocument {
            id: "s2".to_string(),
            data: json!({"sessionType": "NAP", "durationMinutes": 5, "startTime": 0})
                .as_object()
                .cloned()
                .unwrap(),
        };
        assert!(session_from_document(&document).is_err());
    }
}
