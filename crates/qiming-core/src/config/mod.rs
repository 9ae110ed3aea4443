//! # Qiming Core Configuration
//!
//! Engine configuration loaded from JSON, YAML or TOML files.
//!
//! The file format is picked from the file extension through
//! [`ConfigFormat::from_path`]. YAML and TOML support sit behind the
//! `yaml-config` and `toml-config` features (both enabled by default).
//!
//! ```toml
//! initial_level = "estimated"
//!
//! [pipeline]
//! max_timeout_ms = 60000
//! retry_count = 1
//!
//! [levels.unknown]
//! confidence_threshold = 0.3
//!
//! [plugins.zodiac]
//! timeout_ms = 500
//! ```
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::certainty::{AnalysisStrategy, CertaintyLevel};
use crate::kernel::constants::{
    DEFAULT_HEALTH_CHECK_INTERVAL_MS, DEFAULT_HEALTH_CHECK_TIMEOUT_MS, DEFAULT_RETRY_COUNT,
    MAX_PLUGIN_TIMEOUT_MS,
};
use crate::kernel::error::ErrorKind;


/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// YAML format
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Parse `data` in this format
    pub fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            format: self.extension(),
            message,
        };
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Render `value` in this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String, ConfigError> {
        let serialize_error = |message: String| ConfigError::Serialize {
            format: self.extension(),
            message,
        };
        match self {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).map_err(|e| serialize_error(e.to_string()))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| serialize_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| serialize_error(e.to_string())),
        }
    }
}

/// Read and parse a file, choosing the format from its extension.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    format.deserialize(&data)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Failed to serialize config as {format}: {message}")]
    Serialize { format: &'static str, message: String },

    #[error("Unsupported config format for file {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::ConfigMissing
            }
            _ => ErrorKind::ConfigInvalid,
        }
    }
}

/// Plugin container settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Reject registrations that leave a required dependency unresolved
    pub validate_dependencies: bool,
    /// Initialize plugins as soon as they are registered
    pub auto_initialize: bool,
    pub health_checks_enabled: bool,
    pub health_check_interval_ms: u64,
    /// Budget for a single plugin health probe
    pub health_check_timeout_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            validate_dependencies: true,
            auto_initialize: false,
            health_checks_enabled: false,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
        }
    }
}

/// Engine-wide execution limits applied on top of the level configs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound for any per-plugin timeout a request asks for
    pub max_timeout_ms: u64,
    /// Extra attempts after a failed or timed-out invocation
    pub retry_count: u32,
    /// When false every run executes sequentially, whatever the level says
    pub allow_parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: MAX_PLUGIN_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            allow_parallel: true,
        }
    }
}

/// Per-plugin configuration handed to [`Plugin::initialize`](crate::plugin_system::Plugin::initialize)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// A disabled plugin is never selected for a run
    pub enabled: bool,
    /// Overrides the run timeout for this plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Overrides the pipeline retry count for this plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Free-form settings interpreted by the plugin itself
    pub settings: serde_json::Value,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: None,
            retry_count: None,
            settings: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl PluginConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Look up a typed setting
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.settings
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Partial override of a level's defaults. Unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfigOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_plugins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AnalysisStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_strategy: Option<AnalysisStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_execution: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_optional_failures: Option<bool>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub container: ContainerConfig,
    pub pipeline: PipelineConfig,
    /// Level the certainty manager starts at
    pub initial_level: CertaintyLevel,
    pub levels: BTreeMap<CertaintyLevel, LevelConfigOverride>,
    pub plugins: HashMap<String, PluginConfig>,
}

impl EngineConfig {
    /// Load and validate a configuration file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = load_file(path)?;
        config.validate()?;
        log::info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(data: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: EngineConfig = format.deserialize(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_string(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        format.serialize(self)
    }

    /// Resolved configuration for one plugin
    pub fn plugin_config(&self, plugin_id: &str) -> PluginConfig {
        self.plugins.get(plugin_id).cloned().unwrap_or_default()
    }

    /// Check value ranges. Collects every problem before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.pipeline.max_timeout_ms == 0 {
            problems.push("pipeline.max_timeout_ms must be greater than zero".to_string());
        }
        if self.container.health_check_interval_ms == 0 {
            problems.push("container.health_check_interval_ms must be greater than zero".to_string());
        }
        if self.container.health_check_timeout_ms == 0 {
            problems.push("container.health_check_timeout_ms must be greater than zero".to_string());
        }

        for (level, overrides) in &self.levels {
            if let Some(threshold) = overrides.confidence_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    problems.push(format!(
                        "levels.{level}.confidence_threshold {threshold} is outside [0, 1]"
                    ));
                }
            }
            if overrides.timeout_ms == Some(0) {
                problems.push(format!("levels.{level}.timeout_ms must be greater than zero"));
            }
            if overrides.enabled_plugins.as_ref().is_some_and(Vec::is_empty) {
                problems.push(format!("levels.{level}.enabled_plugins must not be empty"));
            }
        }

        let mut plugin_ids: Vec<&String> = self.plugins.keys().collect();
        plugin_ids.sort();
        for id in plugin_ids {
            if self.plugins[id].timeout_ms == Some(0) {
                problems.push(format!("plugins.{id}.timeout_ms must be greater than zero"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}
