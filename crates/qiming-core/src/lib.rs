pub mod certainty;
pub mod config;
pub mod kernel;
pub mod pipeline;
pub mod plugin_system;

// Re-export key public types/traits for easier use by the binary and plugins
pub use certainty::{CertaintyLevel, CertaintyLevelManager, LevelConfig};
pub use config::EngineConfig;
pub use kernel::Engine;
pub use kernel::error::{Error, Result};
pub use pipeline::{NamingRequest, Pipeline, RunResponse};
pub use plugin_system::{Plugin, PluginContainer, PluginDescriptor};

#[cfg(test)]
pub(crate) mod test_support;
