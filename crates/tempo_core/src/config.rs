//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold tunables for notifications and seeding.
//! - Parse host-provided JSON, falling back to defaults per missing key.
//!
//! # Invariants
//! - A validated config has positive reminder and snooze lead times.
//! - `seed_categories` is never empty after validation.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_REMINDER_MINUTES: i64 = 30;
pub const DEFAULT_SNOOZE_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Lead time of the reminder alarm before a task's due date.
    pub reminder_minutes: i64,
    /// Delay applied by the notification snooze action.
    pub snooze_minutes: i64,
    /// Log level used when the host does not pass one explicitly.
    pub log_level: Option<String>,
    pub seed_categories: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reminder_minutes: DEFAULT_REMINDER_MINUTES,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            log_level: None,
            seed_categories: ["Work", "Study", "Personal", "Health"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config is not valid JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config. Empty input yields defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reminder_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "reminder_minutes must be positive, got {}",
                self.reminder_minutes
            )));
        }
        if self.snooze_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "snooze_minutes must be positive, got {}",
                self.snooze_minutes
            )));
        }
        if self
            .seed_categories
            .iter()
            .all(|category| category.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "seed_categories needs at least one non-blank entry".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_SNOOZE_MINUTES};

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CoreConfig::from_json_str(r#"{"reminder_minutes": 10}"#).unwrap();
        assert_eq!(config.reminder_minutes, 10);
        assert_eq!(config.snooze_minutes, DEFAULT_SNOOZE_MINUTES);
        assert!(!config.seed_categories.is_empty());
    }

    #[test]
    fn blank_input_is_default() {
        assert_eq!(CoreConfig::from_json_str("  ").unwrap(), CoreConfig::default());
    }

    #[test]
    fn rejects_non_positive_lead_time_and_bad_json() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"snooze_minutes": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
