// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The explicit configuration record loaded at startup.
//!
//! Every setting vidforge reads is a field of [`VfConfig`], loaded from a
//! `vidforge.toml` file and overridable per-field via `VF_<SECTION>_<KEY>`
//! environment variables. No component looks up configuration by dynamic
//! attribute name at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub max_concurrent_requests: usize,
    pub max_queue_size: usize,
    pub worker_timeout_seconds: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { max_concurrent_requests: 5, max_queue_size: 100, worker_timeout_seconds: 3600 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { warning_percent: 0.0, critical_percent: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub cpu: Thresholds,
    pub memory: Thresholds,
    pub disk: Thresholds,
    pub monitor_interval_seconds: u64,
    pub history_hours: u64,
    pub total_cpu_cores: f64,
    pub total_memory_mb: u64,
    pub total_disk_mb: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            cpu: Thresholds { warning_percent: 70.0, critical_percent: 85.0 },
            memory: Thresholds { warning_percent: 75.0, critical_percent: 90.0 },
            disk: Thresholds { warning_percent: 80.0, critical_percent: 95.0 },
            monitor_interval_seconds: 5,
            history_hours: 24,
            total_cpu_cores: 8.0,
            total_memory_mb: 16_384,
            total_disk_mb: 512_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceLimits {
    pub capacity: f64,
    pub refill_per_second: f64,
    pub per_minute: u64,
    pub per_hour: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub services: HashMap<String, ServiceLimits>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_seconds: u64,
    pub failed_retention_hours: u64,
    pub completed_retention_hours: u64,
    pub cancelled_retention_hours: u64,
    pub temp_file_max_age_hours: u64,
    pub log_file_max_age_days: u64,
    pub disk_critical_percent: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            failed_retention_hours: 12,
            completed_retention_hours: 48,
            cancelled_retention_hours: 24,
            temp_file_max_age_hours: 6,
            log_file_max_age_days: 7,
            disk_critical_percent: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sessions_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { sessions_dir: PathBuf::from("./sessions"), temp_dir: PathBuf::from("./temp") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), log_dir: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfConfig {
    pub processor: ProcessorConfig,
    pub governor: GovernorConfig,
    pub rate_limiter: RateLimiterConfig,
    pub maintenance: MaintenanceConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl VfConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut cfg: VfConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Apply `VF_<SECTION>_<KEY>` overrides for the handful of settings an
    /// operator most commonly wants to tweak without editing the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("VF_PROCESSOR_MAX_CONCURRENT_REQUESTS") {
            self.processor.max_concurrent_requests = v;
        }
        if let Some(v) = env_usize("VF_PROCESSOR_MAX_QUEUE_SIZE") {
            self.processor.max_queue_size = v;
        }
        if let Some(v) = env_u64("VF_PROCESSOR_WORKER_TIMEOUT_SECONDS") {
            self.processor.worker_timeout_seconds = v;
        }
        if let Some(v) = env_u64("VF_GOVERNOR_MONITOR_INTERVAL_SECONDS") {
            self.governor.monitor_interval_seconds = v;
        }
        if let Some(v) = env_u64("VF_MAINTENANCE_INTERVAL_SECONDS") {
            self.maintenance.interval_seconds = v;
        }
        if let Ok(dir) = std::env::var("VF_STORAGE_SESSIONS_DIR") {
            self.storage.sessions_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("VF_STORAGE_TEMP_DIR") {
            self.storage.temp_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = std::env::var("VF_LOGGING_FILTER") {
            self.logging.filter = filter;
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_thresholds() {
        let cfg = VfConfig::default();
        assert_eq!(cfg.governor.cpu.warning_percent, 70.0);
        assert_eq!(cfg.governor.cpu.critical_percent, 85.0);
        assert_eq!(cfg.governor.memory.warning_percent, 75.0);
        assert_eq!(cfg.governor.disk.critical_percent, 95.0);
        assert_eq!(cfg.processor.worker_timeout_seconds, 3600);
        assert_eq!(cfg.maintenance.failed_retention_hours, 12);
        assert_eq!(cfg.maintenance.completed_retention_hours, 48);
        assert_eq!(cfg.maintenance.cancelled_retention_hours, 24);
    }

    #[test]
    fn load_parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidforge.toml");
        std::fs::write(
            &path,
            r#"
            [processor]
            max_concurrent_requests = 10
            "#,
        )
        .unwrap();
        let cfg = VfConfig::load(&path).unwrap();
        assert_eq!(cfg.processor.max_concurrent_requests, 10);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.processor.max_queue_size, 100);
    }

    #[test]
    #[serial_test::serial]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidforge.toml");
        std::fs::write(&path, "[processor]\nmax_concurrent_requests = 10\n").unwrap();
        std::env::set_var("VF_PROCESSOR_MAX_CONCURRENT_REQUESTS", "42");
        let cfg = VfConfig::load(&path).unwrap();
        std::env::remove_var("VF_PROCESSOR_MAX_CONCURRENT_REQUESTS");
        assert_eq!(cfg.processor.max_concurrent_requests, 42);
    }
}
