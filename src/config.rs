//! Configuration management for munin-open-files.
//!
//! This module handles loading, merging, and validating configuration from files,
//! the environment Munin sets up for plugins, and CLI arguments. Config files
//! may be YAML, JSON, or TOML.

use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::counters::DEFAULT_COUNTER_FILE;
use crate::thresholds::{ThresholdRatios, DEFAULT_CRITICAL_RATIO, DEFAULT_WARNING_RATIO};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Environment variable munin-node sets when the master accepts values in
/// the same run as `config`.
pub const DIRTYCONFIG_ENV: &str = "MUNIN_CAP_DIRTYCONFIG";

/// Locations searched when no config file is given on the command line.
/// munin-node picks the working directory, so none of these are relative.
const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "/etc/munin/open-files.yaml",
    "/etc/munin/open-files.yml",
    "/etc/munin/open-files.json",
];

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {}", .path.display(), .source)]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {}: {}", .path.display(), .source)]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Counter file to read, normally /proc/sys/fs/file-nr
    #[serde(alias = "counter-file")]
    pub counter_file: Option<PathBuf>,

    // Alert levels as a share of the maximum
    #[serde(alias = "warning-ratio")]
    pub warning_ratio: Option<f64>,
    #[serde(alias = "critical-ratio")]
    pub critical_ratio: Option<f64>,

    /// Print values right after `config`
    pub dirtyconfig: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            counter_file: Some(PathBuf::from(DEFAULT_COUNTER_FILE)),
            warning_ratio: Some(DEFAULT_WARNING_RATIO),
            critical_ratio: Some(DEFAULT_CRITICAL_RATIO),
            dirtyconfig: Some(false),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    pub fn counter_file(&self) -> PathBuf {
        self.counter_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COUNTER_FILE))
    }

    pub fn ratios(&self) -> ThresholdRatios {
        ThresholdRatios {
            warning: self.warning_ratio.unwrap_or(DEFAULT_WARNING_RATIO),
            critical: self.critical_ratio.unwrap_or(DEFAULT_CRITICAL_RATIO),
        }
    }

    pub fn dirtyconfig(&self) -> bool {
        self.dirtyconfig.unwrap_or(false)
    }

    /// Effective log level; unknown names are rejected by validation.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|level| LogLevel::from_str(level, true).ok())
            .unwrap_or(LogLevel::Warn)
    }
}

/// Validate effective config (used by --check-config and before every run)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    cfg.ratios().validate().map_err(ConfigError::Invalid)?;

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_str(level, true).is_err() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}', expected one of off, error, warn, info, debug, trace",
                level
            )));
        }
    }

    if let Some(path) = cfg.counter_file.as_deref() {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("counter_file must not be empty".into()));
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, the environment, config file, and defaults.
/// This enforces precedence: CLI (if provided) > environment > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    apply_munin_environment(&mut config, env::var(DIRTYCONFIG_ENV).ok().as_deref());
    apply_cli_overrides(&mut config, args);

    Ok(config)
}

/// Defaults plus CLI overrides, ignoring any config file.
///
/// Used when the configuration cannot be loaded but the mode must not fail,
/// which is the case for `autoconf`.
pub fn fallback_config(args: &Args) -> Config {
    let mut config = Config::default();
    apply_cli_overrides(&mut config, args);
    config
}

/// Applies the options given on the command line.
pub fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(path) = &args.counter_file {
        config.counter_file = Some(path.clone());
    }

    if let Some(level) = args.log_level {
        if let Some(value) = level.to_possible_value() {
            config.log_level = Some(value.get_name().to_string());
        }
    }
}

/// Applies the capabilities munin-node announces through the environment.
pub fn apply_munin_environment(config: &mut Config, dirtyconfig: Option<&str>) {
    if dirtyconfig == Some("1") {
        config.dirtyconfig = Some(true);
    }
}

/// Loads a config file, or the first default location that exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(found) => found.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?,
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?,
        _ => {
            // Default to YAML. An empty file is a valid, empty config.
            if content.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                    path: path.clone(),
                    source,
                })?
            }
        }
    };

    Ok(config)
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> anyhow::Result<()> {
    let output = render_config(config, format)?;
    println!("{}", output.trim_end());
    Ok(())
}
