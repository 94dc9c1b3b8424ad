//! Configuration management for Tollgate.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML file,
//! `TOLLGATE__SECTION__KEY` environment variables, then the plain `REDIS_URL`, `PORT`,
//! `RATE_LIMIT_COUNT`, `RATE_LIMIT_WINDOW_DURATION` and `RATE_LIMIT_WINDOW_UNIT` variables.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::ratelimit::{RateLimitConfig, TimeUnit, TimeWindow};

/// Plain environment variables and the settings they override.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("REDIS_URL", "storage.redis_url"),
    ("PORT", "server.port"),
    ("RATE_LIMIT_COUNT", "rate_limit.limit"),
    ("RATE_LIMIT_WINDOW_DURATION", "rate_limit.window_duration"),
    ("RATE_LIMIT_WINDOW_UNIT", "rate_limit.window_unit"),
];

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Quota configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// Which counter store backs the limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Shared Redis server; required when more than one instance enforces the same quota
    #[default]
    Redis,
    /// Process-local counters
    Memory,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Deadline for a single store call in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis_url: default_redis_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_timeout_ms() -> u64 {
    100
}

/// Quota as written in configuration, before validation.
///
/// Signed so that a negative value is reported as such instead of as a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per window
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Window length in `window_unit`s
    #[serde(default = "default_window_duration")]
    pub window_duration: i64,

    #[serde(default = "default_window_unit")]
    pub window_unit: TimeUnit,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_duration: default_window_duration(),
            window_unit: default_window_unit(),
        }
    }
}

fn default_limit() -> i64 {
    100
}

fn default_window_duration() -> i64 {
    1
}

fn default_window_unit() -> TimeUnit {
    TimeUnit::Minutes
}

impl RateLimitSettings {
    /// Validate and convert into the limiter's configuration.
    pub fn to_limit_config(&self) -> Result<RateLimitConfig> {
        let limit = u64::try_from(self.limit).map_err(|_| {
            TollgateError::Config(format!("rate limit must not be negative, got {}", self.limit))
        })?;
        let duration = u64::try_from(self.window_duration).map_err(|_| {
            TollgateError::Config(format!(
                "window duration must be greater than zero, got {}",
                self.window_duration
            ))
        })?;

        let window = TimeWindow::new(duration, self.window_unit)?;
        Ok(RateLimitConfig::new(limit, window))
    }
}

impl TollgateConfig {
    /// Load configuration from the process environment and an optional YAML file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Load configuration using `vars` in place of the process environment.
    pub fn load_with_env(path: Option<&Path>, vars: HashMap<String, String>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TOLLGATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, vars.get(*var).cloned())?;
        }

        let config: TollgateConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TollgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.to_limit_config()?;
        if self.storage.timeout_ms == 0 {
            return Err(TollgateError::Config(
                "storage timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::load_with_env(None, HashMap::new()).unwrap();

        assert_eq!(config.server.addr(), "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.storage.redis_url, "redis://localhost:6379");
        assert_eq!(config.storage.timeout(), Duration::from_millis(100));

        let limits = config.rate_limit.to_limit_config().unwrap();
        assert_eq!(limits.limit(), 100);
        assert_eq!(limits.window().as_secs(), 60);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  port: 9000
storage:
  backend: memory
rate_limit:
  limit: 50
  window_duration: 10
  window_unit: seconds
"#;
        let config = TollgateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        let limits = config.rate_limit.to_limit_config().unwrap();
        assert_eq!(limits.limit(), 50);
        assert_eq!(limits.window().as_secs(), 10);
    }

    #[test]
    fn test_prefixed_env_overrides() {
        let config = TollgateConfig::load_with_env(
            None,
            vars(&[
                ("TOLLGATE__RATE_LIMIT__LIMIT", "7"),
                ("TOLLGATE__RATE_LIMIT__WINDOW_UNIT", "hours"),
                ("TOLLGATE__STORAGE__TIMEOUT_MS", "250"),
            ]),
        )
        .unwrap();

        assert_eq!(config.rate_limit.limit, 7);
        assert_eq!(config.rate_limit.window_unit, TimeUnit::Hours);
        assert_eq!(config.storage.timeout_ms, 250);
    }

    #[test]
    fn test_plain_env_overrides() {
        let config = TollgateConfig::load_with_env(
            None,
            vars(&[
                ("REDIS_URL", "redis://cache:6380"),
                ("PORT", "8123"),
                ("RATE_LIMIT_COUNT", "20"),
                ("RATE_LIMIT_WINDOW_DURATION", "5"),
                ("RATE_LIMIT_WINDOW_UNIT", "minutes"),
            ]),
        )
        .unwrap();

        assert_eq!(config.storage.redis_url, "redis://cache:6380");
        assert_eq!(config.server.port, 8123);
        let limits = config.rate_limit.to_limit_config().unwrap();
        assert_eq!(limits.limit(), 20);
        assert_eq!(limits.window().as_secs(), 300);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let path = std::env::temp_dir().join(format!("tollgate-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "rate_limit:\n  limit: 10\n  window_duration: 2\n  window_unit: hours\n",
        )
        .unwrap();

        let result = TollgateConfig::load_with_env(
            Some(path.as_path()),
            vars(&[("RATE_LIMIT_COUNT", "11")]),
        );
        std::fs::remove_file(&path).unwrap();
        let config = result.unwrap();

        assert_eq!(config.rate_limit.limit, 11);
        assert_eq!(config.rate_limit.window_duration, 2);
        assert_eq!(config.rate_limit.window_unit, TimeUnit::Hours);
    }

    #[test]
    fn test_negative_limit_rejected() {
        let err = TollgateConfig::load_with_env(None, vars(&[("RATE_LIMIT_COUNT", "-1")]))
            .unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }

    #[test]
    fn test_zero_limit_allowed() {
        let config =
            TollgateConfig::load_with_env(None, vars(&[("RATE_LIMIT_COUNT", "0")])).unwrap();
        assert_eq!(config.rate_limit.to_limit_config().unwrap().limit(), 0);
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        for duration in ["0", "-5"] {
            let result = TollgateConfig::load_with_env(
                None,
                vars(&[("RATE_LIMIT_WINDOW_DURATION", duration)]),
            );
            assert!(result.is_err(), "duration {} should be rejected", duration);
        }
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let result =
            TollgateConfig::load_with_env(None, vars(&[("RATE_LIMIT_WINDOW_UNIT", "days")]));
        assert!(matches!(result, Err(TollgateError::Config(_))));

        let yaml = "rate_limit:\n  window_unit: fortnights\n";
        assert!(TollgateConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let yaml = "storage:\n  timeout_ms: 0\n";
        assert!(TollgateConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = TollgateConfig::from_file("/nonexistent/tollgate.yaml");
        assert!(matches!(result, Err(TollgateError::Io(_))));
    }
}
