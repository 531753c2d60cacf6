//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    /// How long an expired token is retained before the purge job may remove it.
    pub token_retention_days: i64,
    /// Interval between purge sweeps. Purging is space reclamation only;
    /// expiry correctness never depends on it.
    pub purge_interval_seconds: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "rollcall".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap(),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: env::var("JWT_DURATION_MINUTES")
                .unwrap_or("60".into())
                .parse()
                .unwrap(),
            token_retention_days: env::var("TOKEN_RETENTION_DAYS")
                .unwrap_or("30".into())
                .parse()
                .unwrap(),
            purge_interval_seconds: env::var("PURGE_INTERVAL_SECONDS")
                .unwrap_or("3600".into())
                .parse()
                .unwrap(),
        }
    }

    /// Returns a read guard to the global configuration instance,
    /// initializing it from the environment on first access.
    fn global() -> &'static RwLock<AppConfig> {
        CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()))
    }

    /// Replaces the global configuration. Intended for tests that need to
    /// supply values without touching the process environment; also usable
    /// before the first read so `from_env` never runs.
    pub fn override_config(new_config: AppConfig) {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(new_config.clone()));
        let mut guard = lock.write().expect("config lock poisoned");
        *guard = new_config;
    }

    fn read() -> AppConfig {
        Self::global().read().expect("config lock poisoned").clone()
    }
}

pub fn env() -> String {
    AppConfig::read().env
}

pub fn project_name() -> String {
    AppConfig::read().project_name
}

pub fn log_level() -> String {
    AppConfig::read().log_level
}

pub fn log_file() -> String {
    AppConfig::read().log_file
}

pub fn log_to_stdout() -> bool {
    AppConfig::read().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::read().database_path
}

pub fn host() -> String {
    AppConfig::read().host
}

pub fn port() -> u16 {
    AppConfig::read().port
}

pub fn jwt_secret() -> String {
    AppConfig::read().jwt_secret
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::read().jwt_duration_minutes
}

pub fn token_retention_days() -> i64 {
    AppConfig::read().token_retention_days
}

pub fn purge_interval_seconds() -> u64 {
    AppConfig::read().purge_interval_seconds
}
