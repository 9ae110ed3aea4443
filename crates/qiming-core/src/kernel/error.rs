//! # Qiming Core Kernel Errors
//!
//! Defines the top-level [`Error`] that aggregates every subsystem error, the
//! [`ErrorKind`] taxonomy used when errors are reported inside a run response,
//! and the [`Severity`] weight attached to each kind for logging.
use std::fmt;
use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::certainty::error::CertaintyError;
use crate::config::ConfigError;
use crate::pipeline::error::PipelineError;
use crate::plugin_system::error::PluginSystemError;

/// Top-level error type for the engine
#[derive(Debug, ThisError)]
pub enum Error {
    /// Registry, graph and lifecycle errors
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Certainty level selection and switching errors
    #[error("Certainty level error: {0}")]
    Certainty(#[from] CertaintyError),

    /// Errors raised while executing a pipeline run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurring during a specific engine lifecycle phase.
    #[error("Engine lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the engine's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    /// Map this error onto the engine error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PluginSystem(e) => e.kind(),
            Error::Certainty(e) => e.kind(),
            Error::Pipeline(e) => e.kind(),
            Error::Config(e) => e.kind(),
            Error::KernelLifecycleError { source: Some(inner), .. } => inner.kind(),
            Error::KernelLifecycleError { source: None, .. } | Error::Other(_) => ErrorKind::SystemError,
        }
    }

    /// Severity of this error, derived from its kind.
    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

/// Engine error taxonomy.
///
/// Every failure that reaches a caller, whether as an `Err` or inside a run
/// response, is classified as one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PluginNotFound,
    PluginLoadFailed,
    PluginInitFailed,
    PluginExecutionFailed,
    PluginTimeout,
    DependencyMissing,
    CircularDependency,
    ConfigInvalid,
    ConfigMissing,
    ValidationFailed,
    SystemError,
}

impl ErrorKind {
    /// Logging weight of this kind. Never used for control flow.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::ValidationFailed => Severity::Low,
            ErrorKind::PluginNotFound | ErrorKind::PluginTimeout | ErrorKind::ConfigMissing => {
                Severity::Medium
            }
            ErrorKind::PluginLoadFailed
            | ErrorKind::PluginInitFailed
            | ErrorKind::PluginExecutionFailed
            | ErrorKind::DependencyMissing
            | ErrorKind::ConfigInvalid => Severity::High,
            ErrorKind::CircularDependency | ErrorKind::SystemError => Severity::Critical,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::PluginNotFound => "PLUGIN_NOT_FOUND",
            ErrorKind::PluginLoadFailed => "PLUGIN_LOAD_FAILED",
            ErrorKind::PluginInitFailed => "PLUGIN_INIT_FAILED",
            ErrorKind::PluginExecutionFailed => "PLUGIN_EXECUTION_FAILED",
            ErrorKind::PluginTimeout => "PLUGIN_TIMEOUT",
            ErrorKind::DependencyMissing => "DEPENDENCY_MISSING",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::ConfigInvalid => "CONFIG_INVALID",
            ErrorKind::ConfigMissing => "CONFIG_MISSING",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::SystemError => "SYSTEM_ERROR",
        };
        f.write_str(label)
    }
}

/// Alerting weight attached to an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// The log level errors of this severity are reported at.
    pub fn log_level(&self) -> log::Level {
        match self {
            Severity::Low => log::Level::Info,
            Severity::Medium => log::Level::Warn,
            Severity::High | Severity::Critical => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}
