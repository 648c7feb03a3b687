use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Shared secret the identity collaborator signs bearer tokens with.
    pub auth_secret: String,
    /// Interval between server-initiated WS keepalive pings.
    pub keepalive_interval_secs: u64,
    /// Position samples older than this horizon are purged in bulk.
    pub position_retention_days: i64,
    /// How often the purge task wakes up.
    pub position_purge_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            auth_secret: env::var("AUTH_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            keepalive_interval_secs: parse_or_default("KEEPALIVE_INTERVAL_SECS", 300)?,
            position_retention_days: parse_or_default("POSITION_RETENTION_DAYS", 7)?,
            position_purge_interval_secs: parse_or_default("POSITION_PURGE_INTERVAL_SECS", 3600)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
