//! # Qiming Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], covering registration, dependency graph,
//! lifecycle and container failures.
use crate::kernel::error::ErrorKind;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::lifecycle::PluginStatus;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin '{plugin_id}' is already registered")]
    AlreadyRegistered { plugin_id: String },

    #[error("Plugin '{plugin_id}' not found")]
    PluginNotFound { plugin_id: String },

    #[error("Invalid plugin '{plugin_id}': {}", .reasons.join("; "))]
    InvalidPlugin { plugin_id: String, reasons: Vec<String> },

    #[error("Plugin '{plugin_id}' has missing dependencies: {}", .missing.join(", "))]
    DependencyError { plugin_id: String, missing: Vec<String> },

    #[error("Registering plugin '{plugin_id}' introduces a circular dependency: {}", .cycle.join(" -> "))]
    CircularDependencyError { plugin_id: String, cycle: Vec<String> },

    #[error("Dependencies of plugin '{plugin_id}' are not ready: {}", .pending.join(", "))]
    DependenciesNotReady { plugin_id: String, pending: Vec<String> },

    #[error("Plugin initialization error for '{plugin_id}': {message}")]
    InitializationFailed { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' still has active dependents: {}", .dependents.join(", "))]
    HasActiveDependents { plugin_id: String, dependents: Vec<String> },

    #[error("Plugin '{plugin_id}' cannot be removed while required by: {}", .dependents.join(", "))]
    CannotRemove { plugin_id: String, dependents: Vec<String> },

    #[error("Plugin '{plugin_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        plugin_id: String,
        from: PluginStatus,
        to: PluginStatus,
    },

    #[error("Plugin shutdown error for '{plugin_id}': {message}")]
    ShutdownError { plugin_id: String, message: String },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),
}

impl PluginSystemError {
    /// Map onto the engine error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginSystemError::PluginNotFound { .. } => ErrorKind::PluginNotFound,
            PluginSystemError::InvalidPlugin { .. } | PluginSystemError::AlreadyRegistered { .. } => {
                ErrorKind::PluginLoadFailed
            }
            PluginSystemError::DependencyError { .. }
            | PluginSystemError::DependenciesNotReady { .. }
            | PluginSystemError::HasActiveDependents { .. }
            | PluginSystemError::CannotRemove { .. } => ErrorKind::DependencyMissing,
            PluginSystemError::CircularDependencyError { .. } => ErrorKind::CircularDependency,
            PluginSystemError::InitializationFailed { .. } => ErrorKind::PluginInitFailed,
            PluginSystemError::InvalidTransition { .. } | PluginSystemError::ShutdownError { .. } => {
                ErrorKind::SystemError
            }
            PluginSystemError::DependencyResolution(DependencyError::CyclicDependency(_)) => {
                ErrorKind::CircularDependency
            }
            PluginSystemError::DependencyResolution(_) => ErrorKind::DependencyMissing,
        }
    }
}
