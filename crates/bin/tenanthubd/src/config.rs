//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `tenanthub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tenanthub_app::inbound::ConsumerSettings;
use tenanthub_domain::id::TenantId;
use tenanthub_domain::tenant::Tenant;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// In-process message bus settings.
    pub bus: BusConfig,
    /// Inbound events consumer tuning, shared by every tenant.
    pub consumer: ConsumerConfig,
    /// Tenants activated at startup.
    pub tenants: Vec<TenantConfig>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Messages buffered per topic before slow subscribers start lagging.
    pub capacity: usize,
    /// First segment of every topic name.
    pub topic_prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub workers: usize,
    pub queue_depth: usize,
    pub stream_data_timeout_ms: u64,
}

/// One tenant to activate.
///
/// Without an `id`, a fresh one is generated at every start.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    #[serde(default)]
    pub id: Option<TenantId>,
    pub token: String,
    pub name: String,
}

impl Config {
    /// Load configuration from `tenanthub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("tenanthub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TENANTHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("TENANTHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("TENANTHUB_CONSUMER_WORKERS")
            && let Ok(workers) = val.parse()
        {
            self.consumer.workers = workers;
        }
        if let Ok(val) = std::env::var("TENANTHUB_TOPIC_PREFIX") {
            self.bus.topic_prefix = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.capacity == 0 {
            return Err(ConfigError::Validation(
                "bus capacity must be non-zero".to_string(),
            ));
        }
        if self.bus.topic_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "topic prefix must not be empty".to_string(),
            ));
        }
        self.consumer_settings()
            .validate()
            .map_err(|err| ConfigError::Validation(format!("consumer: {err}")))?;

        let mut tokens = HashSet::new();
        for tenant in &self.tenants {
            if tenant.token.is_empty() {
                return Err(ConfigError::Validation(
                    "tenant token must not be empty".to_string(),
                ));
            }
            if !tokens.insert(tenant.token.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate tenant token: {}",
                    tenant.token
                )));
            }
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            workers: self.consumer.workers,
            queue_depth: self.consumer.queue_depth,
            stream_data_timeout: Duration::from_millis(self.consumer.stream_data_timeout_ms),
        }
    }

    /// Build the configured tenants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a tenant has an empty name.
    pub fn tenants(&self) -> Result<Vec<Tenant>, ConfigError> {
        self.tenants
            .iter()
            .map(|entry| {
                let tenant = Tenant::new(entry.token.clone(), entry.name.clone()).map_err(|err| {
                    ConfigError::Validation(format!("tenant {}: {err}", entry.token))
                })?;
                Ok(match entry.id {
                    Some(id) => tenant.with_id(id),
                    None => tenant,
                })
            })
            .collect()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tenanthub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tenanthubd=info,tenanthub_app=info,tenanthub_adapter_storage_sqlite_sqlx=info"
                .to_string(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            topic_prefix: "tenanthub".to_string(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        let settings = ConsumerSettings::default();
        Self {
            workers: settings.workers,
            queue_depth: settings.queue_depth,
            stream_data_timeout_ms: u64::try_from(settings.stream_data_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
