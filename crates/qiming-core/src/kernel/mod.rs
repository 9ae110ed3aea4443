//! # Qiming Core Kernel
//!
//! The `kernel` module ties the engine together. It owns the bootstrap
//! ([`Engine`](bootstrap::Engine)), the system-wide constants, the error
//! taxonomy shared by every subsystem and the type-keyed service registry
//! handed to plugins during initialization.
//!
//! ## Key Components:
//!
//! - **Engine Bootstrapping**: [`Engine`](bootstrap::Engine) wires the plugin
//!   container, the certainty level manager and the execution pipeline.
//! - **Services**: [`ServiceRegistry`](services::ServiceRegistry) carries
//!   reference data and other collaborators into plugins.
//! - **Constants**: layer bounds and default timings in `constants`.
//! - **Error Handling**: [`Error`](error::Error), [`ErrorKind`](error::ErrorKind)
//!   and the crate-wide `Result` alias in `error`.
pub mod bootstrap;
pub mod constants;
pub mod error;
pub mod services;

pub use bootstrap::Engine;
pub use error::{Error, ErrorKind, Result, Severity};
pub use services::ServiceRegistry;

#[cfg(test)]
mod tests;
