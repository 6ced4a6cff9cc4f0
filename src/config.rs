//! Application-level configuration loading: roster rules, match calendar and checkpoints.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::{Time, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{info, warn};

use crate::state::{
    calendar::{EventCalendar, parse_weekday},
    player::UserId,
    roster::DEFAULT_CAPACITY,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FC_ROSTER_CONFIG_PATH";
const CLOCK_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Number of playing slots.
    pub capacity: usize,
    /// Players per team when shuffling.
    pub team_size: usize,
    /// How long an invited user has to accept.
    pub invitation_window: time::Duration,
    /// Match days and the times that shape them.
    pub calendar: EventCalendar,
    /// Local time of the first reminder on match days.
    pub reminder: Time,
    /// Local time of the last reminder on match days.
    pub final_reminder: Time,
    /// Local times at which unconfirmed players are dropped.
    pub prune_checks: Vec<Time>,
    /// Period of the persistence checkpoint.
    pub snapshot_interval: Duration,
    /// Users allowed to run admin commands.
    pub admins: HashSet<UserId>,
    /// Allow-list of group members; empty means everyone is a member.
    pub members: HashSet<UserId>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        capacity = config.capacity,
                        event_days = config.calendar.event_days().len(),
                        "loaded roster configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their default value.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents).map_err(ConfigError::Json)?;
        raw.try_into()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // The raw defaults are valid by construction.
        RawConfig::default()
            .try_into()
            .unwrap_or_else(|_| Self::fallback())
    }
}

impl AppConfig {
    fn fallback() -> Self {
        let calendar = EventCalendar::default();
        Self {
            capacity: DEFAULT_CAPACITY,
            team_size: 5,
            invitation_window: time::Duration::hours(24),
            reminder: calendar.approval_deadline(),
            final_reminder: calendar.approval_deadline(),
            prune_checks: vec![calendar.approval_deadline()],
            calendar,
            snapshot_interval: Duration::from_secs(600),
            admins: HashSet::new(),
            members: HashSet::new(),
        }
    }
}

/// Reasons a configuration document is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Not valid JSON or wrong shape.
    #[error("malformed config: {0}")]
    Json(#[source] serde_json::Error),
    /// A field holds an unusable value.
    #[error("invalid `{field}`: {message}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    capacity: usize,
    team_size: usize,
    invitation_window_hours: i64,
    utc_offset_hours: i8,
    event_days: Vec<String>,
    reminder: String,
    final_reminder: String,
    approval_deadline: String,
    prune_checks: Vec<String>,
    cleanup: String,
    snapshot_interval_minutes: u64,
    admins: Vec<i64>,
    members: Vec<i64>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            team_size: 5,
            invitation_window_hours: 24,
            utc_offset_hours: 2,
            event_days: vec!["sunday".into(), "wednesday".into()],
            reminder: "12:00".into(),
            final_reminder: "15:00".into(),
            approval_deadline: "16:00".into(),
            prune_checks: vec!["16:00".into(), "17:00".into(), "18:00".into()],
            cleanup: "23:00".into(),
            snapshot_interval_minutes: 10,
            admins: Vec::new(),
            members: Vec::new(),
        }
    }
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.capacity == 0 {
            return Err(invalid("capacity", "must be at least 1"));
        }
        if raw.team_size == 0 {
            return Err(invalid("team_size", "must be at least 1"));
        }
        if raw.invitation_window_hours <= 0 {
            return Err(invalid("invitation_window_hours", "must be positive"));
        }
        if raw.snapshot_interval_minutes == 0 {
            return Err(invalid("snapshot_interval_minutes", "must be positive"));
        }

        let offset = UtcOffset::from_hms(raw.utc_offset_hours, 0, 0)
            .map_err(|err| invalid("utc_offset_hours", err))?;

        let event_days = raw
            .event_days
            .iter()
            .map(|name| {
                parse_weekday(name).ok_or_else(|| invalid("event_days", format!("`{name}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let approval_deadline = parse_clock("approval_deadline", &raw.approval_deadline)?;
        let cleanup = parse_clock("cleanup", &raw.cleanup)?;
        if cleanup <= approval_deadline {
            return Err(invalid("cleanup", "must come after the approval deadline"));
        }

        let prune_checks = raw
            .prune_checks
            .iter()
            .map(|value| parse_clock("prune_checks", value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            capacity: raw.capacity,
            team_size: raw.team_size,
            invitation_window: time::Duration::hours(raw.invitation_window_hours),
            calendar: EventCalendar::new(event_days, offset, approval_deadline, cleanup),
            reminder: parse_clock("reminder", &raw.reminder)?,
            final_reminder: parse_clock("final_reminder", &raw.final_reminder)?,
            prune_checks,
            snapshot_interval: Duration::from_secs(raw.snapshot_interval_minutes * 60),
            admins: raw.admins.into_iter().map(UserId).collect(),
            members: raw.members.into_iter().map(UserId).collect(),
        })
    }
}

fn invalid(field: &'static str, message: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}

fn parse_clock(field: &'static str, value: &str) -> Result<Time, ConfigError> {
    Time::parse(value.trim(), CLOCK_FORMAT).map_err(|err| invalid(field, err))
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use time::{Weekday, macros::time};

    use super::*;

    #[test]
    fn defaults_describe_two_match_days() {
        let config = AppConfig::default();
        assert_eq!(config.capacity, 15);
        assert_eq!(
            config.calendar.event_days(),
            &[Weekday::Sunday, Weekday::Wednesday]
        );
        assert_eq!(config.prune_checks.len(), 3);
        assert_eq!(config.snapshot_interval, Duration::from_secs(600));
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config =
            AppConfig::from_json(r#"{"capacity": 10, "event_days": ["Tue"], "admins": [42]}"#)
                .unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.calendar.event_days(), &[Weekday::Tuesday]);
        assert!(config.admins.contains(&UserId(42)));
        assert_eq!(config.reminder, time!(12:00));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_json(r#"{"reminder": "25:99"}"#),
            Err(ConfigError::Invalid {
                field: "reminder",
                ..
            })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"event_days": ["funday"]}"#),
            Err(ConfigError::Invalid {
                field: "event_days",
                ..
            })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"cleanup": "10:00"}"#),
            Err(ConfigError::Invalid { field: "cleanup", .. })
        ));
        assert!(matches!(
            AppConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
