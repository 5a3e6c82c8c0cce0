//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use panchakarma_core::{CompletionPolicy, ConflictWindow, TherapyPolicy, MAX_WINDOW_MINUTES};
use chrono::Duration as ChronoDuration;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub store_timeout: Duration,
    pub progress_poll_interval: Duration,
    pub conflict_window_minutes: i64,
    /// `None` disables the premature-completion check.
    pub completion_grace_minutes: Option<i64>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Store Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let store_timeout = Duration::from_millis(parse_number(&lookup, "STORE_TIMEOUT_MS", 5000)?);
        if store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "STORE_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let progress_poll_interval = Duration::from_secs(parse_number(&lookup, "PROGRESS_POLL_SECS", 30)?);
        if progress_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "PROGRESS_POLL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Load Scheduling Policy ---
        let conflict_window_minutes = parse_number(&lookup, "CONFLICT_WINDOW_MINUTES", 0)?;
        if conflict_window_minutes > MAX_WINDOW_MINUTES as u64 {
            return Err(ConfigError::InvalidValue(
                "CONFLICT_WINDOW_MINUTES".to_string(),
                format!("must be at most {} minutes", MAX_WINDOW_MINUTES),
            ));
        }
        let conflict_window_minutes = conflict_window_minutes as i64;
        let completion_grace_minutes = match lookup("COMPLETION_GRACE_MINUTES") {
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(v.parse::<u32>().map_err(|_| {
                ConfigError::InvalidValue(
                    "COMPLETION_GRACE_MINUTES".to_string(),
                    format!("'{}' is neither a number of minutes nor 'off'", v),
                )
            })? as i64),
            None => Some(30),
        };

        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            store_timeout,
            progress_poll_interval,
            conflict_window_minutes,
            completion_grace_minutes,
            cors_origin,
        })
    }

    /// The scheduling rules the workflow enforces.
    pub fn therapy_policy(&self) -> TherapyPolicy {
        TherapyPolicy {
            window: ConflictWindow::from_minutes(self.conflict_window_minutes),
            completion: CompletionPolicy {
                grace: self.completion_grace_minutes.map(ChronoDuration::minutes),
            },
        }
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a whole number", v))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.store_timeout, Duration::from_millis(5000));
        assert_eq!(config.progress_poll_interval, Duration::from_secs(30));

        let policy = config.therapy_policy();
        assert_eq!(policy.window, ConflictWindow::ExactInstant);
        assert_eq!(policy.completion.grace, Some(ChronoDuration::minutes(30)));
    }

    #[test]
    fn policy_knobs_are_read() {
        let config = config_from(&[
            ("CONFLICT_WINDOW_MINUTES", "60"),
            ("COMPLETION_GRACE_MINUTES", "off"),
            ("DATABASE_URL", "postgres://localhost/therapy"),
        ])
        .unwrap();
        let policy = config.therapy_policy();
        assert_eq!(policy.window, ConflictWindow::Within(ChronoDuration::minutes(60)));
        assert_eq!(policy.completion.grace, None);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/therapy"));
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = config_from(&[("STORE_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "STORE_TIMEOUT_MS"));

        let err = config_from(&[("PROGRESS_POLL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "PROGRESS_POLL_SECS"));

        let err = config_from(&[("CONFLICT_WINDOW_MINUTES", "200000000000000000")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "CONFLICT_WINDOW_MINUTES"));

        let err = config_from(&[("RUST_LOG", "chatty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "RUST_LOG"));
    }
}
