//! # Qiming Core Plugin System
//!
//! Everything the engine knows about plugins: the contract they implement,
//! the descriptor captured at registration, the dependency graph derived from
//! their declared dependencies, the per-plugin lifecycle state machine and
//! the container that ties these together.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Plugin`] trait plus the values it exchanges with
//!   the engine ([`PluginOutput`], [`ValidationReport`], [`HealthStatus`]).
//! - **[`descriptor`]**: [`PluginDescriptor`] and [`Layer`].
//! - **[`dependency`]** and **[`version`]**: dependency declarations and
//!   semver ranges.
//! - **[`graph`]**: [`DependencyGraph`], the single graph implementation used
//!   for cycle detection, topological order and independent groups.
//! - **[`lifecycle`]**: [`LifecycleManager`] and [`PluginStatus`].
//! - **[`container`]**: [`PluginContainer`], registration with rollback,
//!   initialization, activation and health bookkeeping.
//! - **[`health`]**: periodic health probing through [`HealthMonitor`].
//! - **[`manifest`]**: descriptor lists loaded from JSON, YAML or TOML.
//! - **[`error`]**: [`PluginSystemError`].
pub mod container;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod health;
pub mod lifecycle;
pub mod manifest;
pub mod traits;
pub mod version;

pub use container::{InitializationReport, PluginContainer, SharedContainer};
pub use dependency::{DependencyError, DependencyReport, PluginDependency};
pub use descriptor::{Layer, PluginDescriptor, PluginMetadata};
pub use error::PluginSystemError;
pub use graph::{DependencyGraph, GraphStatus};
pub use health::{HealthMonitor, HealthReport};
pub use lifecycle::{LifecycleManager, PluginState, PluginStatus};
pub use manifest::PluginManifest;
pub use traits::{HealthStatus, Plugin, PluginContext, PluginError, PluginOutput, ValidationReport};
pub use version::VersionRange;

#[cfg(test)]
mod tests;
