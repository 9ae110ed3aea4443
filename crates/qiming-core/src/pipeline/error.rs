use thiserror::Error;

use crate::certainty::CertaintyLevel;
use crate::kernel::error::ErrorKind;
use crate::plugin_system::error::PluginSystemError;

/// Errors raised while preparing or executing a pipeline run.
///
/// Runs never return these directly; they are folded into the run response.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Request validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("No plugins are enabled and available at level {level}")]
    NoEnabledPlugins { level: CertaintyLevel },

    #[error("Plugin '{plugin_id}' is not registered or not active")]
    PluginUnavailable { plugin_id: String },

    #[error("Plugin '{plugin_id}' requires '{dependency}', which produced no result in this run")]
    MissingRequiredDependency { plugin_id: String, dependency: String },

    #[error("Plugin '{plugin_id}' rejected its input: {}", .errors.join("; "))]
    InputValidationFailed { plugin_id: String, errors: Vec<String> },

    #[error("Plugin '{plugin_id}' failed: {message}")]
    PluginExecutionFailed { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' timed out after {timeout_ms} ms")]
    PluginTimeout { plugin_id: String, timeout_ms: u64 },

    #[error("Plugin '{plugin_id}' returned an invalid output: {message}")]
    InvalidOutput { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' panicked: {message}")]
    PluginPanicked { plugin_id: String, message: String },

    #[error("Plugin selection failed: {0}")]
    Selection(#[from] PluginSystemError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ValidationFailed(_) | PipelineError::InputValidationFailed { .. } => {
                ErrorKind::ValidationFailed
            }
            PipelineError::NoEnabledPlugins { .. } | PipelineError::PluginUnavailable { .. } => {
                ErrorKind::PluginNotFound
            }
            PipelineError::MissingRequiredDependency { .. } => ErrorKind::DependencyMissing,
            PipelineError::PluginExecutionFailed { .. }
            | PipelineError::InvalidOutput { .. }
            | PipelineError::PluginPanicked { .. } => ErrorKind::PluginExecutionFailed,
            PipelineError::PluginTimeout { .. } => ErrorKind::PluginTimeout,
            PipelineError::Selection(inner) => inner.kind(),
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::PluginExecutionFailed { .. }
                | PipelineError::PluginTimeout { .. }
                | PipelineError::InvalidOutput { .. }
        )
    }
}
