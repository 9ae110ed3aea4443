use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PluginConfig;
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::context::{ProcessContext, StandardInput};
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::{Layer, PluginMetadata};

/// Error type returned by plugin hooks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("Plugin initialization error: {0}")]
    Init(String),
    #[error("Plugin execution error: {0}")]
    Execution(String),
    #[error("Plugin validation error: {0}")]
    Validation(String),
    #[error("Plugin unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a plugin's own input validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A passing report without warnings
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing report
    pub fn invalid<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid: false,
            errors: errors.into_iter().map(Into::into).collect(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// What a plugin produces for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOutput {
    pub success: bool,
    pub data: serde_json::Value,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PluginOutput {
    /// A successful output
    pub fn success(data: serde_json::Value, confidence: f64) -> Self {
        Self {
            success: true,
            data,
            confidence,
            execution_time_ms: 0,
            metadata: None,
            errors: Vec::new(),
        }
    }

    /// An unsuccessful output carrying an error message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            confidence: 0.0,
            execution_time_ms: 0,
            metadata: None,
            errors: vec![message.into()],
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Shape check applied to every output before it is recorded.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.data.is_null() {
            return Err("output carries no data".to_string());
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} is outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

/// Result of a plugin health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Context handed to [`Plugin::initialize`]
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Shared services (reference tables and the like)
    pub services: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn new(services: Arc<ServiceRegistry>) -> Self {
        Self { services }
    }
}

/// Core trait that all analysis plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier of the plugin
    fn id(&self) -> &str;

    /// The version of the plugin (semver)
    fn version(&self) -> &str;

    /// The layer the plugin executes in
    fn layer(&self) -> Layer;

    /// Plugin dependencies
    fn dependencies(&self) -> Vec<PluginDependency> {
        Vec::new()
    }

    /// Whether a failure of this plugin must fail the run
    fn critical(&self) -> bool {
        true
    }

    /// Descriptive metadata
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::default()
    }

    /// Initialize the plugin
    async fn initialize(&self, config: &PluginConfig, context: &PluginContext) -> Result<(), PluginError>;

    /// Validate the standardized input before processing
    fn validate(&self, input: &StandardInput) -> ValidationReport;

    /// Run the analysis
    async fn process(&self, input: &StandardInput, context: &ProcessContext) -> Result<PluginOutput, PluginError>;

    /// Release resources. Called on unregistration and shutdown.
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Whether the plugin can currently serve requests
    fn is_available(&self) -> bool {
        true
    }

    /// Health probe used by the periodic health check
    async fn health_status(&self) -> HealthStatus {
        HealthStatus::healthy()
    }
}
