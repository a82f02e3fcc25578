use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(format!("unknown backend {other:?}, expected redis or sqlite")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: PathBuf,
    pub startup_flag_path: PathBuf,
    /// How long SQLite itself waits on a held lock before reporting it busy.
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let startup_flag_path = default_flag_path(&path);
        Self {
            path,
            startup_flag_path,
            busy_timeout: Duration::from_millis(250),
            max_connections: 5,
        }
    }
}

fn default_flag_path(db_path: &std::path::Path) -> PathBuf {
    let mut flag = db_path.as_os_str().to_owned();
    flag.push(".started");
    PathBuf::from(flag)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub redis: RedisConfig,
    pub sqlite: SqliteConfig,
    pub op_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    /// Reads every setting from the environment once. Unset variables fall
    /// back to defaults; set-but-unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sqlite_path: PathBuf = try_load("VOTE_DB_PATH", "votes.db")?;
        let startup_flag_path = match var("VOTE_STARTUP_FLAG_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_flag_path(&sqlite_path),
        };

        let retry = RetryPolicy {
            max_retries: try_load("VOTE_RETRY_MAX", "5")?,
            base_delay: Duration::from_millis(try_load("VOTE_RETRY_BASE_MS", "100")?),
            factor: try_load("VOTE_RETRY_FACTOR", "2.0")?,
        };
        if retry.factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: "VOTE_RETRY_FACTOR",
                value: retry.factor.to_string(),
                reason: "backoff factor must be at least 1.0".into(),
            });
        }

        let timeout_secs: u64 = try_load("VOTE_OP_TIMEOUT_SECS", "5")?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "VOTE_OP_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
                reason: "timeout must be positive".into(),
            });
        }

        Ok(Self {
            backend: try_load("VOTE_BACKEND", "redis")?,
            redis: RedisConfig {
                host: try_load("REDIS_HOST", "localhost")?,
                port: try_load("REDIS_PORT", "6379")?,
                password: var("REDIS_PASSWORD").filter(|p| !p.is_empty()),
                db: try_load("REDIS_DB", "0")?,
            },
            sqlite: SqliteConfig {
                path: sqlite_path,
                startup_flag_path,
                busy_timeout: Duration::from_millis(try_load("VOTE_DB_BUSY_TIMEOUT_MS", "250")?),
                max_connections: try_load("VOTE_DB_MAX_CONNECTIONS", "5")?,
            },
            op_timeout: Duration::from_secs(timeout_secs),
            retry,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse::<T>().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid { key, value: raw.clone(), reason: e.to_string() }
    })
}
