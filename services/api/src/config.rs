//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// Largest accepted `CATALOG_MAX_ATTEMPTS`.
pub const MAX_CATALOG_ATTEMPTS: u32 = 10;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub google_books_api_key: Option<String>,
    pub catalog_base_url: String,
    pub catalog_timeout: Duration,
    pub catalog_max_attempts: u32,
    pub session_ttl_days: i64,
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

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5002".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Catalog Settings ---
        let google_books_api_key = lookup("GOOGLE_BOOKS_API_KEY").filter(|key| !key.trim().is_empty());
        let catalog_base_url =
            lookup("CATALOG_BASE_URL").unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string());
        let catalog_timeout = Duration::from_secs(parse_or(&lookup, "CATALOG_TIMEOUT_SECS", 10)?);
        let catalog_max_attempts: u32 = parse_or(&lookup, "CATALOG_MAX_ATTEMPTS", 3)?;
        if !(1..=MAX_CATALOG_ATTEMPTS).contains(&catalog_max_attempts) {
            return Err(ConfigError::InvalidValue(
                "CATALOG_MAX_ATTEMPTS".to_string(),
                format!("must be between 1 and {}", MAX_CATALOG_ATTEMPTS),
            ));
        }

        // --- Load Auth and HTTP Settings ---
        let session_ttl_days = parse_or(&lookup, "SESSION_TTL_DAYS", 30)?;
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            google_books_api_key,
            catalog_base_url,
            catalog_timeout,
            catalog_max_attempts,
            session_ttl_days,
            cors_origin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
