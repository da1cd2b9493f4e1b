//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before the workers run.

use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ACCEPT_WINDOW_SECS, DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_JUDGE_CONCURRENCY,
    DEFAULT_JUDGE_IMAGE, DEFAULT_LONG_BATTLE_SECS, DEFAULT_MATCH_CONCURRENCY,
    DEFAULT_MATCH_MAX_ATTEMPTS, DEFAULT_MATCH_RATE_MAX, DEFAULT_MATCH_RATE_WINDOW_SECS,
    DEFAULT_MATCH_RETRY_DELAY_SECS, DEFAULT_QUICK_BATTLE_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
    DEFAULT_TIMEOUT_ATTEMPTS, DEFAULT_TIMEOUT_BACKOFF_MS,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub rust_log: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub matchmaking: MatchmakingConfig,
    pub battle: BattleConfig,
    pub judge: JudgeConfig,
    pub catalog: CatalogConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Matchmaking worker configuration
#[derive(Debug, Clone)]
pub struct MatchmakingConfig {
    /// Delay between retries when no opponent is found
    pub retry_delay_secs: u64,
    /// Give up matching after this many attempts
    pub max_attempts: u32,
    /// Parallel match jobs
    pub concurrency: usize,
    /// Rate limit: max jobs per window
    pub rate_limit_max: u32,
    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
}

/// Battle lifecycle configuration
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Gate activation behind a both-players-accept handshake
    pub require_acceptance: bool,
    /// Seconds a pending battle waits for acceptance before the sweep cancels it
    pub accept_window_secs: u64,
    /// Duration cap for ranked quick-match battles (seconds)
    pub quick_duration_secs: u64,
    /// Duration cap for accepted long-form battles (seconds)
    pub long_duration_secs: u64,
    /// Stale-pending sweep interval (seconds)
    pub sweep_interval_secs: u64,
    /// Timeout job retry attempts on transient failure
    pub timeout_attempts: u32,
    /// Base delay of the timeout job's exponential backoff (milliseconds)
    pub timeout_backoff_ms: u64,
}

/// Judge sandbox configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Docker image used for compile and run
    pub image: String,
    /// Parallel judge jobs
    pub concurrency: usize,
}

/// Exercise catalog configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub exercises_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            matchmaking: MatchmakingConfig::from_env()?,
            battle: BattleConfig::from_env()?,
            judge: JudgeConfig::from_env()?,
            catalog: CatalogConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?,
            max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
        })
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        })
    }
}

impl MatchmakingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            retry_delay_secs: parse_var("MATCH_RETRY_DELAY_SECS", DEFAULT_MATCH_RETRY_DELAY_SECS)?,
            max_attempts: parse_var("MATCH_MAX_ATTEMPTS", DEFAULT_MATCH_MAX_ATTEMPTS)?,
            concurrency: parse_var("MATCH_CONCURRENCY", DEFAULT_MATCH_CONCURRENCY)?,
            rate_limit_max: parse_var("MATCH_RATE_MAX", DEFAULT_MATCH_RATE_MAX)?,
            rate_limit_window_secs: parse_var(
                "MATCH_RATE_WINDOW_SECS",
                DEFAULT_MATCH_RATE_WINDOW_SECS,
            )?,
        })
    }

    /// Delay between match retries
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Rate limit window
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

impl BattleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            require_acceptance: env::var("BATTLE_REQUIRE_ACCEPTANCE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            accept_window_secs: parse_var("BATTLE_ACCEPT_WINDOW_SECS", DEFAULT_ACCEPT_WINDOW_SECS)?,
            quick_duration_secs: parse_var("BATTLE_QUICK_DURATION_SECS", DEFAULT_QUICK_BATTLE_SECS)?,
            long_duration_secs: parse_var("BATTLE_LONG_DURATION_SECS", DEFAULT_LONG_BATTLE_SECS)?,
            sweep_interval_secs: parse_var("BATTLE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
            timeout_attempts: parse_var("BATTLE_TIMEOUT_ATTEMPTS", DEFAULT_TIMEOUT_ATTEMPTS)?,
            timeout_backoff_ms: parse_var("BATTLE_TIMEOUT_BACKOFF_MS", DEFAULT_TIMEOUT_BACKOFF_MS)?,
        })
    }

    /// The duration cap battles run under in the configured mode.
    ///
    /// Quick matches skip the acceptance handshake and use the short cap;
    /// accepted long-form battles use the long one.
    pub fn duration_cap(&self) -> Duration {
        if self.require_acceptance {
            Duration::from_secs(self.long_duration_secs)
        } else {
            Duration::from_secs(self.quick_duration_secs)
        }
    }

    /// Same cap as a chrono duration, for timestamp arithmetic
    pub fn duration_cap_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_cap().as_secs() as i64)
    }

    /// How long a pending battle may wait for acceptance
    pub fn accept_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.accept_window_secs as i64)
    }

    /// Interval of the stale-pending sweep
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl JudgeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            image: env::var("JUDGE_IMAGE").unwrap_or_else(|_| DEFAULT_JUDGE_IMAGE.to_string()),
            concurrency: parse_var("JUDGE_CONCURRENCY", DEFAULT_JUDGE_CONCURRENCY)?,
        })
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            exercises_path: PathBuf::from(
                env::var("EXERCISES_PATH").unwrap_or_else(|_| "./exercises".to_string()),
            ),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_matches_use_the_short_cap() {
        let battle = BattleConfig {
            require_acceptance: false,
            accept_window_secs: 30,
            quick_duration_secs: 120,
            long_duration_secs: 1200,
            sweep_interval_secs: 10,
            timeout_attempts: 3,
            timeout_backoff_ms: 1000,
        };
        assert_eq!(battle.duration_cap(), Duration::from_secs(120));

        let long_form = BattleConfig {
            require_acceptance: true,
            ..battle
        };
        assert_eq!(long_form.duration_cap(), Duration::from_secs(1200));
    }
}
