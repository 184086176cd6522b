//! Service configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::services::store::DEFAULT_MAX_VALUE_BYTES;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres URL for quota records. `None` keeps quotas in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Directory for per-user editor documents. `None` keeps them in memory.
    pub store_dir: Option<PathBuf>,
    pub store_max_value_bytes: usize,
    /// Editor sessions untouched for this long are dropped from memory.
    pub session_idle: Duration,
}

impl AppConfig {
    /// Build typed service config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: Postgres connection string
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `STORE_DIR`: local store directory
    /// - `STORE_MAX_VALUE_BYTES`: default fits a maximum-size image as a data URI
    /// - `SESSION_IDLE_SECS`: default 1800
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_non_empty("DATABASE_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            store_dir: env_non_empty("STORE_DIR").map(PathBuf::from),
            store_max_value_bytes: env_parse("STORE_MAX_VALUE_BYTES", DEFAULT_MAX_VALUE_BYTES),
            session_idle: Duration::from_secs(env_parse("SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS)),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_garbage() {
        let key = "__TEST_IG_PARSE_GARBAGE__";
        unsafe { std::env::set_var(key, "not-a-number") };
        assert_eq!(env_parse(key, 7_u16), 7);
        unsafe { std::env::set_var(key, " 8080 ") };
        assert_eq!(env_parse(key, 7_u16), 8080);
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn blank_values_are_absent() {
        let key = "__TEST_IG_BLANK_VALUE__";
        unsafe { std::env::set_var(key, "   ") };
        assert_eq!(env_non_empty(key), None);
        unsafe { std::env::remove_var(key) };
        assert_eq!(env_non_empty(key), None);
    }

    #[test]
    fn from_env_reads_store_settings() {
        unsafe {
            std::env::set_var("STORE_DIR", "/tmp/imagigenius-store");
            std::env::set_var("STORE_MAX_VALUE_BYTES", "1024");
        }
        let config = AppConfig::from_env();
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/imagigenius-store")));
        assert_eq!(config.store_max_value_bytes, 1024);
        unsafe {
            std::env::remove_var("STORE_DIR");
            std::env::remove_var("STORE_MAX_VALUE_BYTES");
        }
    }

    #[test]
    fn from_env_reads_pool_and_session_settings() {
        unsafe {
            std::env::set_var("DB_MAX_CONNECTIONS", "12");
            std::env::set_var("SESSION_IDLE_SECS", "90");
        }
        let config = AppConfig::from_env();
        assert_eq!(config.db_max_connections, 12);
        assert_eq!(config.session_idle, Duration::from_secs(90));

        unsafe {
            std::env::set_var("DB_MAX_CONNECTIONS", "lots");
            std::env::remove_var("SESSION_IDLE_SECS");
        }
        let config = AppConfig::from_env();
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.session_idle, Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
        unsafe { std::env::remove_var("DB_MAX_CONNECTIONS") };
    }
}
