use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigFormat, load_file};
use crate::plugin_system::descriptor::PluginDescriptor;

/// A list of plugin descriptors loaded from a file.
///
/// ```json
/// { "plugins": [
///     { "id": "surname", "version": "1.0.0", "layer": 1 },
///     { "id": "stroke", "version": "1.0.0", "layer": 3,
///       "dependencies": [{ "id": "surname" }] }
/// ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
}

impl PluginManifest {
    pub fn new(plugins: Vec<PluginDescriptor>) -> Self {
        Self { plugins }
    }

    /// Load a manifest, choosing the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let manifest: PluginManifest = load_file(path)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn parse(data: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let manifest: PluginManifest = format.deserialize(data)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every descriptor must be valid and ids must be unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        for descriptor in &self.plugins {
            if !seen.insert(descriptor.id.as_str()) {
                problems.push(format!("plugin '{}' is listed more than once", descriptor.id));
            }
            for problem in descriptor.validate() {
                problems.push(format!("{}: {}", descriptor.id, problem));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|d| d.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.plugins.iter().map(|d| d.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
