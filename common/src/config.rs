// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Polling buckets supported out of the box, in seconds
pub const DEFAULT_INTERVALS: [u64; 6] = [1, 3, 15, 60, 300, 600];

/// User-Agent sent with every page fetch
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:68.0) Gecko/20100101 Firefox/68.0";

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub notifier: NotifierConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Table holding job rows (postgres backend only)
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Supported polling intervals in seconds; one loop runs per value
    pub intervals: Vec<u64>,
    /// Capacity of the admission gate shared by every interval loop
    pub max_concurrent_checks: usize,
    pub fetch_timeout_seconds: u64,
    pub persist_timeout_seconds: u64,
    pub query_timeout_seconds: u64,
    pub user_agent: String,
}

impl SchedulerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn supports_interval(&self, interval: u64) -> bool {
        self.intervals.contains(&interval)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
            max_concurrent_checks: 40,
            fetch_timeout_seconds: 10,
            persist_timeout_seconds: 15,
            query_timeout_seconds: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Log,
    Email,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub timeout_seconds: u64,
    pub email: Option<EmailConfig>,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub sender: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    pub api_key: String,
    #[serde(default = "default_sendgrid_endpoint")]
    pub endpoint: String,
}

fn default_sender_name() -> String {
    "Page Monitor".to_string()
}

fn default_sendgrid_endpoint() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: Option<u16>,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        // Missing keys fall back to the serde defaults of each section
        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scheduler.intervals")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.storage.backend, StorageBackend::Postgres) {
            if self.database.url.is_empty() {
                return Err("Database URL cannot be empty".to_string());
            }
            if self.database.max_connections == 0 {
                return Err("Database max_connections must be greater than 0".to_string());
            }
            if self.storage.table.is_empty()
                || !self
                    .storage
                    .table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(format!(
                    "Storage table '{}' must be a non-empty identifier",
                    self.storage.table
                ));
            }
        }

        // Validate scheduler config
        if self.scheduler.intervals.is_empty() {
            return Err("Scheduler intervals cannot be empty".to_string());
        }
        if self.scheduler.intervals.contains(&0) {
            return Err("Scheduler intervals must be greater than 0".to_string());
        }
        let mut unique = self.scheduler.intervals.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != self.scheduler.intervals.len() {
            return Err("Scheduler intervals must be unique".to_string());
        }
        if self.scheduler.max_concurrent_checks == 0 {
            return Err("Scheduler max_concurrent_checks must be greater than 0".to_string());
        }
        if self.scheduler.fetch_timeout_seconds == 0
            || self.scheduler.persist_timeout_seconds == 0
            || self.scheduler.query_timeout_seconds == 0
        {
            return Err("Scheduler timeouts must be greater than 0".to_string());
        }
        if self.notifier.timeout_seconds == 0 {
            return Err("Notifier timeout must be greater than 0".to_string());
        }

        // Validate notifier config
        match self.notifier.kind {
            NotifierKind::Email if self.notifier.email.is_none() => {
                return Err("Email configuration required when notifier kind is 'email'".to_string());
            }
            NotifierKind::Webhook if self.notifier.webhook.is_none() => {
                return Err(
                    "Webhook configuration required when notifier kind is 'webhook'".to_string(),
                );
            }
            _ => {}
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/page_monitor".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            table: "jobs".to_string(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            timeout_seconds: 10,
            email: None,
            webhook: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: None,
            tracing_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.scheduler.intervals, vec![1, 3, 15, 60, 300, 600]);
    }

    #[test]
    fn test_validation_catches_empty_intervals() {
        let mut settings = Settings::default();
        settings.scheduler.intervals.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_duplicate_intervals() {
        let mut settings = Settings::default();
        settings.scheduler.intervals = vec![1, 3, 3];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_gate_capacity() {
        let mut settings = Settings::default();
        settings.scheduler.max_concurrent_checks = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_query_timeout() {
        let mut settings = Settings::default();
        settings.scheduler.query_timeout_seconds = 0;
        assert_eq!(
            settings.validate(),
            Err("Scheduler timeouts must be greater than 0".to_string())
        );
    }

    #[test]
    fn test_validation_catches_zero_notifier_timeout() {
        let mut settings = Settings::default();
        settings.notifier.timeout_seconds = 0;
        assert_eq!(
            settings.validate(),
            Err("Notifier timeout must be greater than 0".to_string())
        );
    }

    #[test]
    fn test_validation_catches_email_kind_without_config() {
        let mut settings = Settings::default();
        settings.notifier.kind = NotifierKind::Email;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unsafe_table_name() {
        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::Postgres;
        settings.storage.table = "jobs; DROP TABLE jobs".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_path_merges_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            "[scheduler]\nintervals = [5, 10]\nmax_concurrent_checks = 4\n\n[storage]\nbackend = \"postgres\"\ntable = \"watched_pages\""
        )
        .unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.scheduler.intervals, vec![5, 10]);
        assert_eq!(settings.scheduler.max_concurrent_checks, 4);
        assert_eq!(settings.scheduler.fetch_timeout_seconds, 10);
        assert_eq!(settings.storage.backend, StorageBackend::Postgres);
        assert_eq!(settings.storage.table, "watched_pages");
    }
}
