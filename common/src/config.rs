// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub content: ContentServiceConfig,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentServiceConfig {
    /// Base URL of the content store's publication endpoint.
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// What `create` does when a pending entry already exists for the same
    /// target and kind.
    pub on_conflict: ConflictPolicy,
}

/// Policy for duplicate scheduling of the same target and kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Reject the new entry; the caller decides whether to cancel and
    /// recreate.
    Reject,
    /// Replace the prior pending entry with the new one.
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_seconds: u64,
    pub claim_ttl_seconds: u64,
    pub max_entries_per_poll: usize,
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Bounded attempt count for transient content-service failures within
    /// one execution; the entry stays pending if all attempts fail.
    pub max_transient_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults file → local
    /// overrides → environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.content.base_url.is_empty() {
            return Err("Content service base_url cannot be empty".to_string());
        }
        if self.content.request_timeout_seconds == 0 {
            return Err("Content service request timeout must be greater than 0".to_string());
        }

        if self.scheduler.poll_interval_seconds == 0 {
            return Err("Scheduler poll_interval_seconds must be greater than 0".to_string());
        }
        if self.scheduler.claim_ttl_seconds == 0 {
            return Err("Scheduler claim_ttl_seconds must be greater than 0".to_string());
        }
        if self.scheduler.worker_concurrency == 0 {
            return Err("Scheduler worker_concurrency must be greater than 0".to_string());
        }
        if self.scheduler.max_entries_per_poll == 0 {
            return Err("Scheduler max_entries_per_poll must be greater than 0".to_string());
        }

        if self.executor.max_transient_attempts == 0 {
            return Err("Executor max_transient_attempts must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/publish_scheduler".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            content: ContentServiceConfig {
                base_url: "http://localhost:8080/content".to_string(),
                request_timeout_seconds: 30,
            },
            store: StoreConfig {
                on_conflict: ConflictPolicy::Reject,
            },
            scheduler: SchedulerConfig {
                poll_interval_seconds: 10,
                claim_ttl_seconds: 60,
                max_entries_per_poll: 100,
                worker_concurrency: 8,
            },
            executor: ExecutorConfig {
                max_transient_attempts: 5,
                retry_base_delay_ms: 500,
                retry_max_delay_ms: 30_000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut settings = Settings::default();
        settings.scheduler.poll_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut settings = Settings::default();
        settings.scheduler.worker_concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_conflict_policy_default_is_reject() {
        let settings = Settings::default();
        assert_eq!(settings.store.on_conflict, ConflictPolicy::Reject);
    }
}
