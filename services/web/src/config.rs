//! services/web/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_GEOCODE_PRIMARY_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEOCODE_FALLBACK_URL: &str = "https://api.zippopotam.us/us";

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
    pub log_level: Level,
    pub api_base_url: String,
    pub socket_url: String,
    pub frontend_origin: String,
    pub session_store_path: PathBuf,
    pub geocode_primary_url: String,
    pub geocode_fallback_url: String,
    pub geocode_user_agent: String,
    pub socket_reconnect_attempts: u32,
    pub socket_reconnect_delay: Duration,
    pub push_device_token: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_origin = var_or("FRONTEND_ORIGIN", "http://localhost:3000");

        // --- Backend Endpoints ---
        let api_base_url = required("API_BASE_URL")?.trim_end_matches('/').to_string();
        let socket_url = required("SOCKET_URL")?;
        if !(socket_url.starts_with("ws://") || socket_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "SOCKET_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", socket_url),
            ));
        }

        // --- Client Storage ---
        let session_store_path = lookup("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.marketplace-session.json"));

        // --- Geocoding ---
        let geocode_primary_url = var_or("GEOCODE_PRIMARY_URL", DEFAULT_GEOCODE_PRIMARY_URL);
        let geocode_fallback_url = var_or("GEOCODE_FALLBACK_URL", DEFAULT_GEOCODE_FALLBACK_URL);
        let geocode_user_agent = var_or("GEOCODE_USER_AGENT", "marketplace-web/0.1");

        // --- Realtime ---
        let socket_reconnect_attempts: u32 =
            parse_number(&lookup, "SOCKET_RECONNECT_ATTEMPTS", 5)?;
        let reconnect_delay_ms: u64 = parse_number(&lookup, "SOCKET_RECONNECT_DELAY_MS", 1000)?;

        let push_device_token = lookup("PUSH_DEVICE_TOKEN").filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind_address,
            log_level,
            api_base_url,
            socket_url,
            frontend_origin,
            session_store_path,
            geocode_primary_url,
            geocode_fallback_url,
            geocode_user_agent,
            socket_reconnect_attempts,
            socket_reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            push_device_token,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a number in range", raw),
            )
        }),
    }
}
