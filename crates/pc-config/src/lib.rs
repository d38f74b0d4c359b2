//! PetCircle Configuration
//!
//! Layered configuration for the collaboration service:
//! - Built-in defaults
//! - Optional TOML file (`PC_CONFIG_PATH`)
//! - Environment variable overrides (`PC_*`)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable pointing at an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "PC_CONFIG_PATH";

/// Upper bound for invitation and removal-request lifetimes (ten years)
pub const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

/// Upper bound for the purge retention window (ten years)
pub const MAX_RETENTION_DAYS: u64 = 365 * 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub auth: AuthConfig,
    pub workflow: WorkflowConfig,
    /// In-memory storage with seeded pets and users
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub url: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "petcircle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the session issuer
    pub jwt_secret: Option<String>,
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "petcircle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub invitation_ttl_hours: u64,
    pub removal_ttl_hours: u64,
    /// Token generation attempts before giving up on uniqueness violations
    pub token_attempts: u32,
    pub purge: PurgeConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            invitation_ttl_hours: 168,
            removal_ttl_hours: 168,
            token_attempts: 3,
            purge: PurgeConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn invitation_ttl(&self) -> Duration {
        Duration::from_secs(self.invitation_ttl_hours.saturating_mul(3600))
    }

    pub fn removal_ttl(&self) -> Duration {
        Duration::from_secs(self.removal_ttl_hours.saturating_mul(3600))
    }
}

/// Periodic deletion of long-expired pending workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub retention_days: u64,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600,
            retention_days: 30,
        }
    }
}

impl PurgeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(86_400))
    }
}

impl CollabConfig {
    /// Load defaults, then `PC_CONFIG_PATH` (if set), then `PC_*` overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;
        info!(path = %path_str, "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PC_API_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PC_API_PORT") {
            self.server.port = parse_env("PC_API_PORT", &v)?;
        }
        if let Some(v) = lookup("PC_MONGO_URL") {
            self.mongo.url = v;
        }
        if let Some(v) = lookup("PC_MONGO_DB") {
            self.mongo.database = v;
        }
        if let Some(v) = lookup("PC_JWT_SECRET") {
            self.auth.jwt_secret = Some(v);
        }
        if let Some(v) = lookup("PC_JWT_ISSUER") {
            self.auth.issuer = v;
        }
        if let Some(v) = lookup("PC_INVITATION_TTL_HOURS") {
            self.workflow.invitation_ttl_hours = parse_env("PC_INVITATION_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("PC_REMOVAL_TTL_HOURS") {
            self.workflow.removal_ttl_hours = parse_env("PC_REMOVAL_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("PC_TOKEN_ATTEMPTS") {
            self.workflow.token_attempts = parse_env("PC_TOKEN_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("PC_PURGE_ENABLED") {
            self.workflow.purge.enabled = parse_bool("PC_PURGE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PC_PURGE_INTERVAL_SECS") {
            self.workflow.purge.interval_secs = parse_env("PC_PURGE_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("PC_PURGE_RETENTION_DAYS") {
            self.workflow.purge.retention_days = parse_env("PC_PURGE_RETENTION_DAYS", &v)?;
        }
        if let Some(v) = lookup("PC_DEV_MODE") {
            self.dev_mode = parse_bool("PC_DEV_MODE", &v)?;
        }
        debug!("Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workflow.invitation_ttl_hours == 0 || self.workflow.removal_ttl_hours == 0 {
            return Err(invalid("workflow TTLs must be greater than zero"));
        }
        if self.workflow.invitation_ttl_hours > MAX_TTL_HOURS
            || self.workflow.removal_ttl_hours > MAX_TTL_HOURS
        {
            return Err(invalid("workflow TTLs must not exceed ten years"));
        }
        if self.workflow.purge.retention_days > MAX_RETENTION_DAYS {
            return Err(invalid("workflow.purge.retention_days must not exceed ten years"));
        }
        if self.workflow.token_attempts == 0 {
            return Err(invalid("workflow.token_attempts must be at least 1"));
        }
        if self.workflow.purge.enabled && self.workflow.purge.interval_secs == 0 {
            return Err(invalid("workflow.purge.interval_secs must be greater than zero"));
        }
        let has_secret = self
            .auth
            .jwt_secret
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !self.dev_mode && !has_secret {
            return Err(invalid("auth.jwt_secret is required outside dev mode"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CollabConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.workflow.invitation_ttl(), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.workflow.token_attempts, 3);
        assert!(!config.workflow.purge.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CollabConfig::from_toml(
            r#"
            [mongo]
            database = "pets_test"

            [workflow]
            invitation_ttl_hours = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.mongo.database, "pets_test");
        assert_eq!(config.mongo.url, "mongodb://localhost:27017");
        assert_eq!(config.workflow.invitation_ttl_hours, 24);
        assert_eq!(config.workflow.removal_ttl_hours, 168);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            dev_mode = true

            [server]
            port = 9000

            [workflow.purge]
            enabled = true
            retention_days = 7
            "#
        )
        .unwrap();

        let config = CollabConfig::load_from(file.path()).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.server.port, 9000);
        assert!(config.workflow.purge.enabled);
        assert_eq!(config.workflow.purge.retention(), Duration::from_secs(7 * 86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = CollabConfig::load_from("/nonexistent/petcircle.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CollabConfig::default();
        config
            .apply_env_with(lookup(&[
                ("PC_API_PORT", "3000"),
                ("PC_JWT_SECRET", "s3cret"),
                ("PC_TOKEN_ATTEMPTS", "5"),
                ("PC_PURGE_ENABLED", "yes"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.workflow.token_attempts, 5);
        assert!(config.workflow.purge.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = CollabConfig::default();
        let err = config
            .apply_env_with(lookup(&[("PC_API_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "PC_API_PORT"));
    }

    #[test]
    fn test_validation() {
        let config = CollabConfig::default();
        assert!(config.validate().is_err(), "secret required outside dev mode");

        let mut config = CollabConfig::default();
        config.dev_mode = true;
        config.workflow.token_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = CollabConfig::default();
        config.auth.jwt_secret = Some("x".to_string());
        config.workflow.invitation_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_oversized_durations() {
        let mut config = CollabConfig::default();
        config.dev_mode = true;
        config.workflow.invitation_ttl_hours = 3_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = CollabConfig::default();
        config.dev_mode = true;
        config.workflow.removal_ttl_hours = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.workflow.removal_ttl(), Duration::from_secs(u64::MAX));

        let mut config = CollabConfig::default();
        config.dev_mode = true;
        config.workflow.purge.retention_days = MAX_RETENTION_DAYS + 1;
        assert!(config.validate().is_err());

        let mut config = CollabConfig::default();
        config.dev_mode = true;
        config.workflow.invitation_ttl_hours = MAX_TTL_HOURS;
        config.workflow.purge.retention_days = MAX_RETENTION_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_error_names_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[server]\nport = \"not-a-number\"\n").unwrap();

        let err = CollabConfig::load_from(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => {
                assert_eq!(path, file.path().display().to_string())
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
