//! Hierarchical configuration loading via figment.
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults (`Config::default()`)
//! 2. `.orbital/config.yaml` (project config)
//! 3. `.orbital/local.yaml` (project local overrides, optional)
//! 4. Environment variables (`ORBITAL_*` prefix, highest priority)

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::error::ConfigError;
use crate::domain::models::config::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".orbital/config.yaml"))
            .merge(Yaml::file(".orbital/local.yaml"))
            .merge(Env::prefixed("ORBITAL_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.scheduler.scan_interval_secs == 0 {
            return Err(ConfigError::InvalidScanInterval(config.scheduler.scan_interval_secs));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(config.retry.initial_backoff_ms, config.retry.max_backoff_ms));
        }

        if config.registry.default_ttl_secs < 1 {
            return Err(ConfigError::InvalidRegistryTtl(config.registry.default_ttl_secs.max(0) as u64));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.tenant_id, "default");
        assert_eq!(config.scheduler.scan_interval_secs, 10);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_parsing_overrides_defaults() {
        let yaml = r"
tenant_id: acme
scheduler:
  scan_interval_secs: 30
retry:
  max_retries: 5
";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.tenant_id, "acme");
        assert_eq!(config.scheduler.scan_interval_secs, 30);
        assert_eq!(config.retry.max_retries, 5);
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn rejects_zero_scan_interval() {
        let mut config = Config::default();
        config.scheduler.scan_interval_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidScanInterval(0))));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(level) if level == "verbose"));
    }

    #[test]
    fn rejects_backoff_where_initial_exceeds_max() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30_000;
        config.retry.max_backoff_ms = 10_000;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBackoff(30_000, 10_000))));
    }

    #[test]
    fn hierarchical_merge_prefers_override_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "tenant_id: base\nscheduler:\n  scan_interval_secs: 5").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "tenant_id: override").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.tenant_id, "override");
        assert_eq!(config.scheduler.scan_interval_secs, 5, "base value should persist when not overridden");
    }
}
