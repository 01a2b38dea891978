//! Pomodoro cycle planning from user preferences.
//!
//! # Invariants
//! - A work session is always followed by a break; a break by work.
//! - Every `sessions_until_long_break`-th work session earns a long break.

use crate::model::profile::UserPreferences;
use crate::model::session::SessionKind;

/// What the timer should run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    pub kind: SessionKind,
    pub duration_minutes: i64,
    pub auto_start: bool,
}

/// Chooses the session kind after `last`.
///
/// `work_sessions_done` counts finished work sessions in the current cycle,
/// including `last` when it was a work session.
pub fn next_session_kind(
    last: Option<SessionKind>,
    work_sessions_done: u32,
    preferences: &UserPreferences,
) -> SessionKind {
    match last {
        Some(SessionKind::Work) => {
            let interval = preferences.sessions_until_long_break.max(1);
            if work_sessions_done > 0 && work_sessions_done % interval == 0 {
                SessionKind::LongBreak
            } else {
                SessionKind::ShortBreak
            }
        }
        _ => SessionKind::Work,
    }
}

pub fn duration_for(kind: SessionKind, preferences: &UserPreferences) -> i64 {
    match kind {
        SessionKind::Work => preferences.work_duration,
        SessionKind::ShortBreak => preferences.short_break_duration,
        SessionKind::LongBreak => preferences.long_break_duration,
    }
}

pub fn should_auto_start(kind: SessionKind, preferences: &UserPreferences) -> bool {
    if kind.is_break() {
        preferences.auto_start_breaks
    } else {
        preferences.auto_start_pomodoros
    }
}

pub fn plan_next(
    last: Option<SessionKind>,
    work_sessions_done: u32,
    preferences: &UserPreferences,
) -> SessionPlan {
    let kind = next_session_kind(last, work_sessions_done, preferences);
    SessionPlan {
        kind,
        duration_minutes: duration_for(kind, preferences),
        auto_start: should_auto_start(kind, preferences),
    }
}

#[cfg(test)]
mod tests {
    use super::{next_session_kind, plan_next};
    use crate::model::profile::UserPreferences;
    use crate::model::session::SessionKind;

    #[test]
    fn fourth_work_session_earns_long_break() {
        let prefs = UserPreferences::default();
        let kinds: Vec<SessionKind> = (1..=4)
            .map(|done| next_session_kind(Some(SessionKind::Work), done, &prefs))
            .collect();
        assert_eq!(
            kinds,
            vec![
                SessionKind::ShortBreak,
                SessionKind::ShortBreak,
                SessionKind::ShortBreak,
                SessionKind::LongBreak
            ]
        );
    }

    #[test]
    fn breaks_lead_back_to_work_with_preference_durations() {
        let prefs = UserPreferences {
            work_duration: 50,
            auto_start_pomodoros: true,
            ..UserPreferences::default()
        };
        let plan = plan_next(Some(SessionKind::LongBreak), 4, &prefs);
        assert_eq!(plan.kind, SessionKind::Work);
        assert_eq!(plan.duration_minutes, 50);
        assert!(plan.auto_start);

        let first = plan_next(None, 0, &prefs);
        assert_eq!(first.kind, SessionKind::Work);
    }

    #[test]
    fn zero_interval_is_treated_as_every_session() {
        let prefs = UserPreferences {
            sessions_until_long_break: 0,
            ..UserPreferences::default()
        };
        assert_eq!(
            next_session_kind(Some(SessionKind::Work), 1, &prefs),
            SessionKind::LongBreak
        );
        assert!(!plan_next(Some(SessionKind::Work), 1, &prefs).auto_start);
    }
}
