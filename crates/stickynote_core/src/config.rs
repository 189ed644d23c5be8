//! Timing and preference configuration for the synchronization layer.
//!
//! # Responsibility
//! - Hold debounce/poll intervals shared by every note window.
//! - Parse optional overrides from JSON.
//!
//! # Invariants
//! - Every interval is strictly positive after `validate()`.
//! - Missing JSON fields fall back to the production defaults.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_CONTENT_SAVE_DELAY_MS: u64 = 300;
const DEFAULT_GEOMETRY_SAVE_DELAY_MS: u64 = 500;
const DEFAULT_LIST_REFRESH_DELAY_MS: u64 = 200;
const DEFAULT_LIST_POLL_INTERVAL_MS: u64 = 30_000;

/// Preferred theme applied to untouched new notes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Theme {
    pub bg: String,
    pub fg: String,
}

/// Synchronization timing and preferences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Idle interval before a content/color edit is written.
    pub content_save_delay_ms: u64,
    /// Idle interval before a window move/resize is written.
    pub geometry_save_delay_ms: u64,
    /// Coalescing window for notification-driven list refreshes.
    pub list_refresh_delay_ms: u64,
    pub list_poll_interval_ms: u64,
    pub default_theme: Option<Theme>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            content_save_delay_ms: DEFAULT_CONTENT_SAVE_DELAY_MS,
            geometry_save_delay_ms: DEFAULT_GEOMETRY_SAVE_DELAY_MS,
            list_refresh_delay_ms: DEFAULT_LIST_REFRESH_DELAY_MS,
            list_poll_interval_ms: DEFAULT_LIST_POLL_INTERVAL_MS,
            default_theme: None,
        }
    }
}

/// Configuration parse/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    ZeroInterval(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid sync config: {err}"),
            Self::ZeroInterval(field) => write!(f, "`{field}` must be greater than zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::ZeroInterval(_) => None,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("content_save_delay_ms", self.content_save_delay_ms),
            ("geometry_save_delay_ms", self.geometry_save_delay_ms),
            ("list_refresh_delay_ms", self.list_refresh_delay_ms),
            ("list_poll_interval_ms", self.list_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(field));
            }
        }
        Ok(())
    }

    pub fn content_save_delay(&self) -> Duration {
        Duration::from_millis(self.content_save_delay_ms)
    }

    pub fn geometry_save_delay(&self) -> Duration {
        Duration::from_millis(self.geometry_save_delay_ms)
    }

    pub fn list_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.list_refresh_delay_ms)
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.list_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig};
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SyncConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.content_save_delay(), Duration::from_millis(300));
        assert_eq!(config.geometry_save_delay(), Duration::from_millis(500));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = SyncConfig::from_json_str(
            r##"{"list_refresh_delay_ms": 50, "default_theme": {"bg": "#fff3a0", "fg": "#5a4520"}}"##,
        )
        .unwrap();
        assert_eq!(config.list_refresh_delay_ms, 50);
        assert_eq!(config.list_poll_interval_ms, 30_000);
        assert_eq!(config.default_theme.unwrap().bg, "#fff3a0");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = SyncConfig::from_json_str(r#"{"content_save_delay_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval("content_save_delay_ms")));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = SyncConfig::from_json_str(r#"{"save_delay": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
