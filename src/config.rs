use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_cpu_threshold_percent")]
    pub cpu_percent: f64,
    #[serde(default = "default_memory_threshold_percent")]
    pub memory_percent: f64,
    #[serde(default = "default_disk_threshold_percent")]
    pub disk_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            samples: default_samples(),
            interval_secs: default_interval_secs(),
            disk_mount: default_disk_mount(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_threshold_percent(),
            memory_percent: default_memory_threshold_percent(),
            disk_percent: default_disk_threshold_percent(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database_path is required".to_string(),
            ));
        }
        if self.samples < 1 {
            return Err(ConfigError::Validation(
                "samples must be >= 1".to_string(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.disk_mount.trim().is_empty() {
            return Err(ConfigError::Validation(
                "disk_mount must not be empty".to_string(),
            ));
        }

        validate_thresholds(&self.thresholds)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_thresholds(cfg: &ThresholdConfig) -> Result<(), ConfigError> {
    let limits = [
        ("thresholds.cpu_percent", cfg.cpu_percent),
        ("thresholds.memory_percent", cfg.memory_percent),
        ("thresholds.disk_percent", cfg.disk_percent),
    ];
    for (name, value) in limits {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{name} must be in the range 0..100"
            )));
        }
    }
    Ok(())
}

fn default_database_path() -> PathBuf {
    PathBuf::from("log.db")
}

const fn default_samples() -> u32 {
    5
}

const fn default_interval_secs() -> u64 {
    10
}

fn default_disk_mount() -> String {
    "/".to_string()
}

const fn default_cpu_threshold_percent() -> f64 {
    80.0
}

const fn default_memory_threshold_percent() -> f64 {
    85.0
}

const fn default_disk_threshold_percent() -> f64 {
    90.0
}
