//! Per-user profile aggregate and preferences.
//!
//! # Responsibility
//! - Hold cumulative focus statistics and streak counters.
//! - Hold timer preferences consumed by the session planner.
//!
//! # Invariants
//! - `longest_streak >= current_streak`.
//! - Missing document fields fall back to defaults on read.

use crate::clock::{format_date, parse_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Timer and UI preferences embedded in the profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
    pub work_duration: i64,
    pub short_break_duration: i64,
    pub long_break_duration: i64,
    pub sessions_until_long_break: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    pub sound_enabled: bool,
    pub dark_mode: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_until_long_break: 4,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            sound_enabled: true,
            dark_mode: false,
        }
    }
}

/// Cumulative per-user statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub total_focus_minutes: i64,
    pub total_tasks_completed: i64,
    pub total_sessions: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    /// Local `YYYY-MM-DD` of the last day with a completed work session.
    pub last_active_date: Option<String>,
    pub created_at: i64,
    pub preferences: UserPreferences,
}

impl UserProfile {
    pub fn new(created_at: i64) -> Self {
        Self {
            created_at,
            ..Self::default()
        }
    }

    /// Accounts one completed work session on `day`.
    ///
    /// Consecutive active days extend the streak; a gap resets it to one.
    pub fn record_focus(&mut self, minutes: i64, day: NaiveDate) {
        self.total_focus_minutes += minutes.max(0);
        self.total_sessions += 1;

        let last_active = self.last_active_date.as_deref().and_then(parse_date);
        match last_active {
            Some(last) if last == day => {}
            Some(last) if last.succ_opt() == Some(day) => self.current_streak += 1,
            Some(last) if last > day => {}
            _ => self.current_streak = 1,
        }
        if last_active.map_or(true, |last| day > last) {
            self.last_active_date = Some(format_date(day));
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}

/// Partial profile change merged into the stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub total_focus_minutes: Option<i64>,
    pub total_tasks_completed: Option<i64>,
    pub total_sessions: Option<i64>,
    pub current_streak: Option<i64>,
    pub longest_streak: Option<i64>,
    pub preferences: Option<UserPreferences>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::UserProfile;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let mut profile = UserProfile::new(0);
        profile.record_focus(25, day(1));
        profile.record_focus(25, day(1));
        profile.record_focus(25, day(2));
        profile.record_focus(25, day(3));

        assert_eq!(profile.current_streak, 3);
        assert_eq!(profile.longest_streak, 3);
        assert_eq!(profile.total_sessions, 4);
        assert_eq!(profile.total_focus_minutes, 100);
        assert_eq!(profile.last_active_date.as_deref(), Some("2024-05-03"));
    }

    #[test]
    fn gap_resets_current_but_keeps_longest() {
        let mut profile = UserProfile::new(0);
        profile.record_focus(25, day(1));
        profile.record_focus(25, day(2));
        profile.record_focus(25, day(5));

        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 2);
    }

    #[test]
    fn backdated_session_does_not_move_last_active_day() {
        let mut profile = UserProfile::new(0);
        profile.record_focus(25, day(4));
        profile.record_focus(25, day(2));

        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.last_active_date.as_deref(), Some("2024-05-04"));
    }
}
