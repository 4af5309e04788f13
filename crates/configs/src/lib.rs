//! # configs
//!
//! Layered application settings.
//!
//! # Loading Order
//! 1. Built-in defaults (`config/defaults.toml`, embedded)
//! 2. `config/default.toml` in the working directory, if present
//! 3. `config/{BOARD_ENV}.toml`, if present
//! 4. Environment variables: `BOARD__SECTION__KEY`, e.g. `BOARD__SERVER__PORT=3000`
//!
//! A `.env` file is read first, so its entries count as environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const DEFAULTS: &str = include_str!("../config/defaults.toml");
const ENV_PREFIX: &str = "BOARD";
const DEV_SECRET: &str = "dev-only-secret-change-me-before-deploying";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,
    #[serde(default)]
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_secs: i64,
    pub max_failed_attempts: u32,
    pub lockout_window_secs: i64,
}

impl AuthSettings {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret.expose_secret() == DEV_SECRET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
}

impl Settings {
    /// Loads from the working directory and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env_name = std::env::var("BOARD_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from(Path::new("config"), &env_name, None)
    }

    /// `env_vars` replaces the process environment when given.
    pub fn load_from(
        config_dir: &Path,
        env_name: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join(env_name)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .source(env_vars),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!(env = env_name, backend = ?settings.database.backend, "configuration loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_url = self
            .database
            .url
            .as_ref()
            .is_some_and(|u| !u.expose_secret().is_empty());
        if self.database.backend == DatabaseBackend::Postgres && !has_url {
            return Err(ConfigError::Invalid(
                "database.url is required when database.backend = \"postgres\"".into(),
            ));
        }
        if self.auth.jwt_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_ttl_secs <= 0 || self.auth.lockout_window_secs <= 0 {
            return Err(ConfigError::Invalid("auth durations must be positive".into()));
        }
        if self.auth.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid("auth.max_failed_attempts must be at least 1".into()));
        }
        if self.media.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("media.max_upload_bytes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn no_dir() -> PathBuf {
        std::env::temp_dir().join("board-config-does-not-exist")
    }

    #[test]
    fn defaults_load_and_validate() {
        let s = Settings::load_from(&no_dir(), "test", env(&[])).unwrap();
        assert_eq!(s.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(s.database.backend, DatabaseBackend::Memory);
        assert_eq!(s.log.format, LogFormat::Pretty);
        assert_eq!(s.auth.max_failed_attempts, 5);
        assert!(s.auth.uses_dev_secret());
    }

    #[test]
    fn environment_overrides_defaults() {
        let s = Settings::load_from(
            &no_dir(),
            "test",
            env(&[
                ("BOARD__SERVER__PORT", "3000"),
                ("BOARD__LOG__FORMAT", "json"),
                ("BOARD__SERVER__CORS_ORIGINS", "http://a.test,http://b.test"),
            ]),
        )
        .unwrap();
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.log.format, LogFormat::Json);
        assert_eq!(s.server.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn postgres_requires_url() {
        let err = Settings::load_from(&no_dir(), "test", env(&[("BOARD__DATABASE__BACKEND", "postgres")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let s = Settings::load_from(
            &no_dir(),
            "test",
            env(&[
                ("BOARD__DATABASE__BACKEND", "postgres"),
                ("BOARD__DATABASE__URL", "postgres://board@localhost/board"),
            ]),
        )
        .unwrap();
        assert_eq!(s.database.backend, DatabaseBackend::Postgres);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = Settings::load_from(&no_dir(), "test", env(&[("BOARD__AUTH__JWT_SECRET", "short")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(m) if m.contains("jwt_secret")));
    }

    #[test]
    fn files_layer_over_defaults() {
        let dir = std::env::temp_dir().join(format!("board-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[media]\nurl_prefix = \"/files\"\n").unwrap();
        std::fs::write(dir.join("staging.toml"), "[server]\nport = 9090\n").unwrap();

        let s = Settings::load_from(&dir, "staging", env(&[])).unwrap();
        assert_eq!(s.media.url_prefix, "/files");
        assert_eq!(s.server.port, 9090);
        let _ = std::fs::remove_dir_all(dir);
    }
}
