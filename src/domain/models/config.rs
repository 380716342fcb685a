//! Runtime configuration shape, loaded/validated by
//! `infrastructure::config::ConfigLoader`.

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::config::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_node_id")]
    pub node_id: String,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            node_id: default_node_id(),
            database: DatabaseConfig::default(),
            logging: LogConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry: RetryConfig::default(),
            registry: RegistryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

fn default_tenant_id() -> String {
    "default".to_string()
}

fn default_node_id() -> String {
    "node-0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> String {
    "sqlite:.orbital/orbital.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_backfill_window_days")]
    pub cron_backfill_window_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            cron_backfill_window_days: default_backfill_window_days(),
        }
    }
}

fn default_scan_interval_secs() -> u64 {
    10
}

fn default_backfill_window_days() -> i64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_ttl_secs")]
    pub default_ttl_secs: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_registry_ttl_secs(),
        }
    }
}

fn default_registry_ttl_secs() -> i64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_http_bind(),
        }
    }
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}
