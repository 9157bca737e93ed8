use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Initial exclusive window start used before any cursor exists.
    pub aggregation_start: DateTime<Utc>,
    /// Scheduler tick period; 0 disables the scheduler.
    pub aggregation_interval_ms: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let aggregation_start = env_map
            .get("AGGREGATION_START")
            .ok_or_else(|| ConfigError::MissingEnv("AGGREGATION_START".to_string()))
            .and_then(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| {
                        ConfigError::InvalidValue(
                            "AGGREGATION_START".to_string(),
                            "must be an RFC 3339 timestamp".to_string(),
                        )
                    })
            })?;

        let aggregation_interval_ms = env_map
            .get("AGGREGATION_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("60000")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "AGGREGATION_INTERVAL_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;

        if aggregation_interval_ms < 0 {
            return Err(ConfigError::InvalidValue(
                "AGGREGATION_INTERVAL_MS".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            aggregation_start,
            aggregation_interval_ms,
        })
    }
}
