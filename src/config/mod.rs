//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::game::RunnerConfig;
use crate::session::{LevelSource, SessionConfig};
use crate::session::service::DEFAULT_SPAWNS_PER_TEAM;
use crate::util::time::DEFAULT_TICK_INTERVAL_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Shared secret for signing intents
    pub intent_secret: String,
    /// Allowed client origins for CORS, any when empty
    pub client_origins: Vec<String>,

    /// Real-time length of one match-clock second
    pub tick_interval: Duration,
    /// Level file; a ring layout is generated when unset
    pub level_file: Option<PathBuf>,
    pub spawns_per_team: u32,
    /// Fixed seed for reproducible sessions
    pub match_seed: Option<u64>,
    /// Connect options used when a host sends none
    pub default_match_options: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR
        let server_addr = match var("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let intent_secret = var("INTENT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("INTENT_SECRET"))?;

        let client_origins = var("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let tick_interval_ms = match var("TICK_INTERVAL_MS") {
            Some(ms) => ms
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::Invalid("TICK_INTERVAL_MS"))?,
            None => DEFAULT_TICK_INTERVAL_MS,
        };

        let spawns_per_team = match var("SPAWNS_PER_TEAM") {
            Some(n) => n
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("SPAWNS_PER_TEAM"))?,
            None => DEFAULT_SPAWNS_PER_TEAM,
        };

        let match_seed = var("MATCH_SEED")
            .map(|seed| seed.parse::<u64>().map_err(|_| ConfigError::Invalid("MATCH_SEED")))
            .transpose()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            intent_secret,
            client_origins,
            tick_interval: Duration::from_millis(tick_interval_ms),
            level_file: var("LEVEL_FILE").filter(|p| !p.is_empty()).map(PathBuf::from),
            spawns_per_team,
            match_seed,
            default_match_options: var("DEFAULT_MATCH_OPTIONS").unwrap_or_default(),
        })
    }

    /// Hosting configuration for the session service
    pub fn session_config(&self) -> SessionConfig {
        let level = match &self.level_file {
            Some(path) => LevelSource::File(path.clone()),
            None => LevelSource::Generated {
                spawns_per_team: self.spawns_per_team,
            },
        };

        SessionConfig {
            level,
            runner: RunnerConfig {
                tick_interval: self.tick_interval,
                ..RunnerConfig::default()
            },
            seed: self.match_seed,
            default_options: self.default_match_options.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
