//! Runtime configuration.
//!
//! # Responsibility
//! - Provide defaults for timer periods, dedupe policy, logging and storage
//!   locations.
//! - Layer optional JSON and `INKNOTE_*` environment overrides on top.
//!
//! # Invariants
//! - A validated config never has a zero quiet period.

use crate::sync::debounce::DedupePolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_QUIET_PERIOD_MS: u64 = 1_000;
const DEFAULT_INK_IDLE_SAVE_MS: u64 = 2_000;
const DEFAULT_NOTES_DIR_NAME: &str = "inknote";

pub const ENV_QUIET_PERIOD_MS: &str = "INKNOTE_QUIET_PERIOD_MS";
pub const ENV_INK_IDLE_SAVE_MS: &str = "INKNOTE_INK_IDLE_SAVE_MS";
pub const ENV_DEDUPE_POLICY: &str = "INKNOTE_DEDUPE_POLICY";
pub const ENV_LOG_LEVEL: &str = "INKNOTE_LOG_LEVEL";
pub const ENV_NOTES_DIR: &str = "INKNOTE_NOTES_DIR";
pub const ENV_DB_PATH: &str = "INKNOTE_DB_PATH";

#[derive(Debug)]
pub enum ConfigError {
    InvalidJson(serde_json::Error),
    InvalidValue { key: &'static str, value: String },
    ZeroQuietPeriod,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
            Self::ZeroQuietPeriod => write!(f, "quiet_period_ms must be greater than zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value)
    }
}

/// Engine and host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InkNoteConfig {
    /// Keyboard debounce quiet period.
    pub quiet_period_ms: u64,
    /// Delay after the last ink stroke before an idle save is attempted.
    pub ink_idle_save_ms: u64,
    pub dedupe_policy: DedupePolicy,
    pub log_level: String,
    /// Directory where note packages are created.
    pub notes_dir: PathBuf,
    /// Note store database; `None` keeps notes in memory only.
    pub db_path: Option<PathBuf>,
}

impl Default for InkNoteConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            ink_idle_save_ms: DEFAULT_INK_IDLE_SAVE_MS,
            dedupe_policy: DedupePolicy::default(),
            log_level: crate::logging::default_log_level().to_string(),
            notes_dir: std::env::temp_dir().join(DEFAULT_NOTES_DIR_NAME),
            db_path: None,
        }
    }
}

impl InkNoteConfig {
    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `INKNOTE_*` overrides resolved through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(raw) = value(ENV_QUIET_PERIOD_MS) {
            self.quiet_period_ms = parse_millis(ENV_QUIET_PERIOD_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_INK_IDLE_SAVE_MS) {
            self.ink_idle_save_ms = parse_millis(ENV_INK_IDLE_SAVE_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_DEDUPE_POLICY) {
            self.dedupe_policy = match raw.to_ascii_lowercase().as_str() {
                "always" => DedupePolicy::Always,
                "within_window" => DedupePolicy::WithinWindow,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_DEDUPE_POLICY,
                        value: raw,
                    })
                }
            };
        }
        if let Some(raw) = value(ENV_LOG_LEVEL) {
            self.log_level = raw;
        }
        if let Some(raw) = value(ENV_NOTES_DIR) {
            self.notes_dir = PathBuf::from(raw);
        }
        if let Some(raw) = value(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(raw));
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_period_ms == 0 {
            return Err(ConfigError::ZeroQuietPeriod);
        }
        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn ink_idle_save_period(&self) -> Duration {
        Duration::from_millis(self.ink_idle_save_ms)
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, InkNoteConfig, ENV_DEDUPE_POLICY, ENV_QUIET_PERIOD_MS};
    use crate::sync::debounce::DedupePolicy;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_periods() {
        let config = InkNoteConfig::default();
        assert_eq!(config.quiet_period(), Duration::from_secs(1));
        assert_eq!(config.ink_idle_save_period(), Duration::from_secs(2));
        assert_eq!(config.dedupe_policy, DedupePolicy::Always);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = InkNoteConfig::default()
            .with_overrides(lookup(&[
                (ENV_QUIET_PERIOD_MS, "250"),
                (ENV_DEDUPE_POLICY, "Within_Window"),
            ]))
            .unwrap();
        assert_eq!(config.quiet_period_ms, 250);
        assert_eq!(config.dedupe_policy, DedupePolicy::WithinWindow);
    }

    #[test]
    fn overrides_reject_bad_values() {
        let err = InkNoteConfig::default()
            .with_overrides(lookup(&[(ENV_QUIET_PERIOD_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = InkNoteConfig::default()
            .with_overrides(lookup(&[(ENV_QUIET_PERIOD_MS, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroQuietPeriod));
    }

    #[test]
    fn json_keeps_defaults_for_missing_fields() {
        let config =
            InkNoteConfig::from_json_str(r#"{"ink_idle_save_ms": 500, "dedupe_policy": "within_window"}"#)
                .unwrap();
        assert_eq!(config.ink_idle_save_ms, 500);
        assert_eq!(config.quiet_period_ms, 1_000);
        assert_eq!(config.dedupe_policy, DedupePolicy::WithinWindow);
    }
}
