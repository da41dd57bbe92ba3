use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::status::BackoffPolicy;

/// Backoff parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Base delay in seconds before the first retry of a fresh error.
    pub base_delay_secs: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 60,
            max_delay_secs: 86_400,
        }
    }
}

/// Global configuration loaded from `~/.config/extrec/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtrecConfig {
    /// Seconds between retry-worker sweeps.
    pub worker_interval_secs: u64,
    /// Maximum jobs recovered concurrently within one sweep.
    pub max_concurrent_recoveries: usize,
    /// Timeout in seconds for a single remediation call.
    pub remediation_timeout_secs: u64,
    /// Days a completed record is retained before the cleanup sweep drops it.
    pub retention_days: u64,
    /// Optional backoff overrides; if missing, built-in defaults are used.
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
}

impl Default for ExtrecConfig {
    fn default() -> Self {
        Self {
            worker_interval_secs: 60,
            max_concurrent_recoveries: 4,
            remediation_timeout_secs: 120,
            retention_days: 30,
            backoff: None,
        }
    }
}

impl ExtrecConfig {
    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }

    pub fn remediation_timeout(&self) -> Duration {
        Duration::from_secs(self.remediation_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        match &self.backoff {
            Some(b) => BackoffPolicy::from_secs(b.base_delay_secs, b.max_delay_secs),
            None => BackoffPolicy::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("extrec")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ExtrecConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ExtrecConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ExtrecConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ExtrecConfig::default();
        assert_eq!(cfg.worker_interval_secs, 60);
        assert_eq!(cfg.max_concurrent_recoveries, 4);
        assert_eq!(cfg.remediation_timeout_secs, 120);
        assert_eq!(cfg.retention_days, 30);
        assert!(cfg.backoff.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ExtrecConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ExtrecConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.worker_interval_secs, cfg.worker_interval_secs);
        assert_eq!(parsed.max_concurrent_recoveries, cfg.max_concurrent_recoveries);
        assert_eq!(parsed.remediation_timeout_secs, cfg.remediation_timeout_secs);
        assert_eq!(parsed.retention_days, cfg.retention_days);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            worker_interval_secs = 15
            max_concurrent_recoveries = 2
            remediation_timeout_secs = 30
            retention_days = 7
        "#;
        let cfg: ExtrecConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.worker_interval_secs, 15);
        assert_eq!(cfg.max_concurrent_recoveries, 2);
        assert_eq!(cfg.remediation_timeout_secs, 30);
        assert_eq!(cfg.retention_days, 7);
        assert_eq!(cfg.retention(), Duration::from_secs(7 * 24 * 60 * 60));
        assert!(cfg.backoff.is_none());
    }

    #[test]
    fn config_toml_backoff_section() {
        let toml = r#"
            worker_interval_secs = 60
            max_concurrent_recoveries = 4
            remediation_timeout_secs = 120
            retention_days = 30

            [backoff]
            base_delay_secs = 30
            max_delay_secs = 3600
        "#;
        let cfg: ExtrecConfig = toml::from_str(toml).unwrap();
        let backoff = cfg.backoff.as_ref().unwrap();
        assert_eq!(backoff.base_delay_secs, 30);
        assert_eq!(backoff.max_delay_secs, 3600);
        let policy = cfg.backoff_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(30));
        assert_eq!(policy.max_delay, Duration::from_secs(3600));
    }
}
