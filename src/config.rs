//! Service configuration.
//!
//! Loaded from a JSON file (path from `CONFIG_PATH`, default
//! `./config.json`), then overridden from the environment and validated.
//! A missing file is not an error: defaults are used instead.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::invalid(
                "storage",
                format!("unknown backend '{}', expected sqlite or memory", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits for the database lock.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Defaults with the database file at `path`.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: crate::db::get_db_path(Path::new("data")),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(alias = "httpServer")]
    pub http: HttpConfig,

    #[serde(alias = "dataBase")]
    pub database: DatabaseConfig,

    pub storage: StorageBackend,
}

impl AppConfig {
    /// Load configuration using the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path), |key| std::env::var(key).ok())
    }

    /// Load from `path`, apply overrides from `env`, then validate.
    pub fn load_from(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            log::info!("Config file {} not found, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `HTTP_HOST`, `HTTP_PORT`, `DB_PATH`,
    /// `DB_MAX_CONNECTIONS` and `STORAGE_BACKEND`. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HTTP_HOST") {
            self.http.host = host;
        }
        if let Some(port) = get("HTTP_PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("HTTP_PORT", format!("'{}' is not a port", port)))?;
        }
        if let Some(path) = get("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = get("DB_MAX_CONNECTIONS") {
            self.database.max_connections = max.trim().parse().map_err(|_| {
                ConfigError::invalid("DB_MAX_CONNECTIONS", format!("'{}' is not a number", max))
            })?;
        }
        if let Some(backend) = get("STORAGE_BACKEND") {
            self.storage = backend.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.host.trim().is_empty() {
            return Err(ConfigError::invalid("http.host", "must not be empty"));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "http.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.storage == StorageBackend::Sqlite {
            if self.database.path.as_os_str().is_empty() {
                return Err(ConfigError::invalid("database.path", "must not be empty"));
            }
            if self.database.max_connections == 0 {
                return Err(ConfigError::invalid(
                    "database.max_connections",
                    "must be greater than zero",
                ));
            }
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.http.host, self.http.port)
            .parse()
            .map_err(|_| {
                ConfigError::invalid(
                    "http.host",
                    format!("'{}' is not an IP address", self.http.host),
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}
