//! Profile repository over the single per-user profile document.
//!
//! # Responsibility
//! - Create the profile lazily on first read.
//! - Merge partial updates and apply counter increments atomically.

use crate::auth::AuthContext;
use crate::clock::Clock;
use crate::model::profile::{ProfileUpdate, UserPreferences, UserProfile};
use crate::repo::{log_write, read_or_empty, RepoError, RepoResult};
use crate::store::{Collection, DocPath, Document, DocumentStore, SetMode};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const PROFILE_DOC_ID: &str = "profile";

/// Repository for the signed-in user's profile.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
    auth: AuthContext,
    clock: Arc<dyn Clock>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthContext, clock: Arc<dyn Clock>) -> Self {
        Self { store, auth, clock }
    }

    /// Returns the stored profile, creating a default one when absent.
    ///
    /// Returns `None` without a signed-in user or when the store fails.
    pub fn get_or_create_profile(&self) -> Option<UserProfile> {
        read_or_empty("profile_get", || {
            let path = self.path()?;
            self.ensure_profile(&path).map(Some)
        })
    }

    /// Merges the provided fields into the profile document.
    pub fn update_profile(&self, update: &ProfileUpdate) -> RepoResult<()> {
        log_write("profile_update", || {
            let path = self.path()?;
            if update.is_empty() {
                return Ok(());
            }
            self.ensure_profile(&path)?;
            self.store
                .set(&path, update_to_document(update)?, SetMode::Merge)?;
            Ok(())
        })
    }

    pub fn update_preferences(&self, preferences: &UserPreferences) -> RepoResult<()> {
        self.update_profile(&ProfileUpdate {
            preferences: Some(preferences.clone()),
            ..ProfileUpdate::default()
        })
    }

    /// Adds one finished work session on `day` to the totals and streak.
    pub fn record_focus_session(&self, minutes: i64, day: NaiveDate) -> RepoResult<UserProfile> {
        log_write("profile_record_focus", || {
            self.mutate(|profile| profile.record_focus(minutes, day))
        })
    }

    pub fn record_task_completed(&self) -> RepoResult<UserProfile> {
        log_write("profile_record_task_completed", || {
            self.mutate(|profile| profile.total_tasks_completed += 1)
        })
    }

    /// Takes back one completion when a task is reopened. Never goes below 0.
    pub fn record_task_reopened(&self) -> RepoResult<UserProfile> {
        log_write("profile_record_task_reopened", || {
            self.mutate(|profile| {
                profile.total_tasks_completed = (profile.total_tasks_completed - 1).max(0);
            })
        })
    }

    fn mutate(&self, mut change: impl FnMut(&mut UserProfile)) -> RepoResult<UserProfile> {
        let path = self.path()?;
        self.ensure_profile(&path)?;

        let mut outcome: Option<RepoResult<UserProfile>> = None;
        self.store.update_with(&path, &mut |document: &mut Document| {
            let result = profile_from_document(document).and_then(|mut profile| {
                change(&mut profile);
                let written = to_document(&profile)?;
                *document = written;
                Ok(profile)
            });
            outcome = Some(result);
        })?;
        outcome.unwrap_or_else(|| Err(RepoError::InvalidData("profile not updated".to_string())))
    }

    fn ensure_profile(&self, path: &DocPath) -> RepoResult<UserProfile> {
        if let Some(document) = self.store.get(path)? {
            return profile_from_document(&document);
        }
        let profile = UserProfile::new(self.clock.now_ms());
        self.store
            .set(path, to_document(&profile)?, SetMode::Replace)?;
        info!("event=profile_create module=repo status=ok");
        Ok(profile)
    }

    fn path(&self) -> RepoResult<DocPath> {
        let user = self.auth.current_user().ok_or(RepoError::Unauthenticated)?;
        Ok(DocPath::new(&user, Collection::Profile, PROFILE_DOC_ID))
    }
}

fn profile_from_document(document: &Document) -> RepoResult<UserProfile> {
    serde_json::from_value(Value::Object(document.clone()))
        .map_err(|err| RepoError::InvalidData(format!("profile: {err}")))
}

fn to_document(value: &impl Serialize) -> RepoResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(RepoError::InvalidData(format!(
            "expected object, serialized to {other}"
        ))),
        Err(err) => Err(RepoError::InvalidData(format!("not serializable: {err}"))),
    }
}

fn update_to_document(update: &ProfileUpdate) -> RepoResult<Document> {
    let mut fields = Document::new();
    let counters = [
        ("totalFocusMinutes", update.total_focus_minutes),
        ("totalTasksCompleted", update.total_tasks_completed),
        ("totalSessions", update.total_sessions),
        ("currentStreak", update.current_streak),
        ("longestStreak", update.longest_streak),
    ];
    for (key, value) in counters {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::from(value));
        }
    }
    if let Some(preferences) = &update.preferences {
        fields.insert(
            "preferences".to_string(),
            Value::Object(to_document(preferences)?),
        );
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::update_to_document;
    use crate::model::profile::{ProfileUpdate, UserPreferences};

    #[test]
    fn update_document_only_contains_provided_fields() {
        let update = ProfileUpdate {
            current_streak: Some(3),
            preferences: Some(UserPreferences {
                dark_mode: true,
                ..UserPreferences::default()
            }),
            ..ProfileUpdate::default()
        };
        let document = update_to_document(&update).unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document["currentStreak"], 3);
        assert_eq!(document["preferences"]["darkMode"], true);
    }
}
