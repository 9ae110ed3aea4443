use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin_system::version::VersionRange;

/// Represents a dependency on another plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    /// The id of the plugin depended on
    #[serde(rename = "id")]
    pub plugin_id: String,

    /// The version range that is acceptable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<VersionRange>,

    /// Whether this is a hard requirement or optional dependency
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The plugin was found, but the version is incompatible
    #[error("Plugin version mismatch: '{plugin_id}' requires version '{required_range}' but found '{actual_version}'")]
    IncompatibleVersion {
        plugin_id: String,
        required_range: VersionRange,
        actual_version: String,
    },

    /// Dependency cycle detected
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

impl PluginDependency {
    /// Create a new required dependency with a specific version range
    pub fn required(plugin_id: &str, version_range: VersionRange) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: Some(version_range),
            required: true,
        }
    }

    /// Create a new required dependency with any version
    pub fn required_any(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: None,
            required: true,
        }
    }

    /// Create a new optional dependency with a specific version range
    pub fn optional(plugin_id: &str, version_range: VersionRange) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: Some(version_range),
            required: false,
        }
    }

    /// Create a new optional dependency with any version
    pub fn optional_any(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: None,
            required: false,
        }
    }

    /// Check if this dependency is compatible with the given plugin version string
    pub fn is_compatible_with(&self, version_str: &str) -> bool {
        match &self.version_range {
            Some(range) => {
                let compatible = range.includes_str(version_str);
                if !compatible {
                    log::debug!(
                        "Version '{}' of '{}' does not satisfy '{}'",
                        version_str,
                        self.plugin_id,
                        range
                    );
                }
                compatible
            }
            // No version range means any version is acceptable
            None => true,
        }
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement_type = if self.required { "Requires" } else { "Optional" };
        match &self.version_range {
            Some(range) => write!(
                f,
                "{} plugin: {} (version: {})",
                requirement_type,
                self.plugin_id,
                range.constraint_string()
            ),
            None => write!(f, "{} plugin: {} (any version)", requirement_type, self.plugin_id),
        }
    }
}

/// Result of checking one plugin's dependencies against a set of available ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub plugin_id: String,
    /// Dependencies present in the available set
    pub satisfied: Vec<String>,
    /// Required dependencies absent from the available set
    pub missing_required: Vec<String>,
    /// Optional dependencies absent from the available set
    pub missing_optional: Vec<String>,
    /// Present dependencies whose version does not satisfy the declared range
    pub version_mismatches: Vec<String>,
}

impl DependencyReport {
    pub fn new(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            ..Self::default()
        }
    }

    /// True when no required dependency is missing and no version mismatches exist.
    pub fn is_satisfied(&self) -> bool {
        self.missing_required.is_empty() && self.version_mismatches.is_empty()
    }
}
