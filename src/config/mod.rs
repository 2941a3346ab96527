//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Allowed client origins for CORS (comma-separated, any when unset)
    pub client_origin: Option<String>,
    /// Bearer token required on operator commands (open when unset)
    pub operator_token: Option<String>,
    /// Control packets accepted per second and per team
    pub control_rate_limit: u32,

    /// Referee rules and timings
    pub match_settings: MatchSettings,
}

/// Rules and timings of a match
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSettings {
    /// Countdown duration of each half (seconds)
    pub half_duration_secs: f64,
    /// Penalty applied when a request does not name a duration (seconds)
    pub default_penalty_secs: f64,
    /// Wait for marker re-identification during half-time (seconds)
    pub identify_wait_secs: f64,
    /// Scheduler cadence
    pub tick_hz: u32,
    /// Robots registered per team when a match is created
    pub robots_per_team: u8,
    /// Events kept in the snapshot's recent window
    pub history_window: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            half_duration_secs: 300.0,
            default_penalty_secs: 5.0,
            identify_wait_secs: 4.0,
            tick_hz: 10,
            robots_per_team: 2,
            history_window: 3,
        }
    }
}

impl MatchSettings {
    /// Reject durations that are not finite, or not positive (the identify wait may be 0)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("TICK_HZ"));
        }
        if !positive(self.half_duration_secs) {
            return Err(ConfigError::Invalid("HALF_DURATION_SECS"));
        }
        if !positive(self.default_penalty_secs) {
            return Err(ConfigError::Invalid("DEFAULT_PENALTY_SECS"));
        }
        if !self.identify_wait_secs.is_finite() || self.identify_wait_secs < 0.0 {
            return Err(ConfigError::Invalid("IDENTIFY_WAIT_SECS"));
        }
        Ok(())
    }
}

fn positive(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:7070".to_string())
        };

        let defaults = MatchSettings::default();
        let match_settings = MatchSettings {
            half_duration_secs: parse_var("HALF_DURATION_SECS", defaults.half_duration_secs)?,
            default_penalty_secs: parse_var("DEFAULT_PENALTY_SECS", defaults.default_penalty_secs)?,
            identify_wait_secs: parse_var("IDENTIFY_WAIT_SECS", defaults.identify_wait_secs)?,
            tick_hz: parse_var("TICK_HZ", defaults.tick_hz)?,
            robots_per_team: parse_var("ROBOTS_PER_TEAM", defaults.robots_per_team)?,
            history_window: parse_var("HISTORY_WINDOW", defaults.history_window)?,
        };

        match_settings.validate()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            operator_token: env::var("OPERATOR_TOKEN").ok().filter(|s| !s.is_empty()),
            control_rate_limit: parse_var("CONTROL_RATE_LIMIT", 60)?,

            match_settings,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_defaults_and_rejects_garbage() {
        assert_eq!(parse_var("REFEREE_TEST_UNSET_VAR", 7u32).unwrap(), 7);

        env::set_var("REFEREE_TEST_BAD_VAR", "abc");
        assert!(matches!(
            parse_var::<u32>("REFEREE_TEST_BAD_VAR", 1),
            Err(ConfigError::Invalid("REFEREE_TEST_BAD_VAR"))
        ));

        env::set_var("REFEREE_TEST_GOOD_VAR", " 12 ");
        assert_eq!(parse_var("REFEREE_TEST_GOOD_VAR", 0u8).unwrap(), 12);
    }

    #[test]
    fn settings_reject_non_finite_and_negative_durations() {
        assert!(MatchSettings::default().validate().is_ok());

        let nan_half = MatchSettings {
            half_duration_secs: "NaN".parse().unwrap(),
            ..MatchSettings::default()
        };
        assert!(matches!(
            nan_half.validate(),
            Err(ConfigError::Invalid("HALF_DURATION_SECS"))
        ));

        let infinite_penalty = MatchSettings {
            default_penalty_secs: f64::INFINITY,
            ..MatchSettings::default()
        };
        assert!(matches!(
            infinite_penalty.validate(),
            Err(ConfigError::Invalid("DEFAULT_PENALTY_SECS"))
        ));

        for wait in [-1.0, f64::NAN] {
            let bad_wait = MatchSettings {
                identify_wait_secs: wait,
                ..MatchSettings::default()
            };
            assert!(matches!(
                bad_wait.validate(),
                Err(ConfigError::Invalid("IDENTIFY_WAIT_SECS"))
            ));
        }

        let no_wait = MatchSettings {
            identify_wait_secs: 0.0,
            ..MatchSettings::default()
        };
        assert!(no_wait.validate().is_ok());
    }
}
