use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{MAX_LAYER, MIN_LAYER};
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::parse_version;

/// Coarse execution stage of a plugin.
///
/// Layers run in ascending order; finer ordering inside a layer comes from
/// dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layer(u8);

impl Layer {
    /// Basic identity analysis (surname, gender, birth time)
    pub const BASIC_INFO: Layer = Layer(1);
    /// Time-based numerology (bazi, zodiac, five elements)
    pub const TIME_ANALYSIS: Layer = Layer(2);
    /// Character level analysis (strokes, phonetics, meaning)
    pub const CHARACTER_ANALYSIS: Layer = Layer(3);
    /// Candidate name generation
    pub const GENERATION: Layer = Layer(4);
    /// Scoring and ranking of candidates
    pub const SCORING: Layer = Layer(5);

    /// Wrap a raw layer number. Use [`is_known`](Self::is_known) to check bounds.
    pub const fn new(value: u8) -> Self {
        Layer(value)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Whether this layer lies inside `MIN_LAYER..=MAX_LAYER`.
    pub fn is_known(&self) -> bool {
        (MIN_LAYER..=MAX_LAYER).contains(&self.0)
    }

    /// Human-readable stage name
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "basic-info",
            2 => "time-analysis",
            3 => "character-analysis",
            4 => "generation",
            5 => "scoring",
            _ => "unknown",
        }
    }

    /// All known layers in ascending order
    pub fn all() -> impl Iterator<Item = Layer> {
        (MIN_LAYER..=MAX_LAYER).map(Layer)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} ({})", self.0, self.name())
    }
}

/// Descriptive metadata. Never consulted for scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Immutable identity of a registered plugin.
///
/// Captured from the plugin instance at registration time; later changes to
/// what the instance reports are not observed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub version: String,
    pub layer: Layer,
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,
    /// A non-critical plugin may fail without failing the run when the run
    /// skips optional failures.
    #[serde(default = "default_critical")]
    pub critical: bool,
    #[serde(default)]
    pub metadata: PluginMetadata,
}

fn default_critical() -> bool {
    true
}

impl PluginDescriptor {
    /// Create a critical descriptor without dependencies
    pub fn new(id: &str, version: &str, layer: Layer) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            layer,
            dependencies: Vec::new(),
            critical: true,
            metadata: PluginMetadata::default(),
        }
    }

    /// Snapshot the identity a plugin instance reports
    pub fn from_plugin(plugin: &dyn Plugin) -> Self {
        Self {
            id: plugin.id().to_string(),
            version: plugin.version().to_string(),
            layer: plugin.layer(),
            dependencies: plugin.dependencies(),
            critical: plugin.critical(),
            metadata: plugin.metadata(),
        }
    }

    pub fn with_dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn requires(self, plugin_id: &str) -> Self {
        self.with_dependency(PluginDependency::required_any(plugin_id))
    }

    pub fn optionally_uses(self, plugin_id: &str) -> Self {
        self.with_dependency(PluginDependency::optional_any(plugin_id))
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn with_metadata(mut self, metadata: PluginMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Optional plugins may be skipped on failure when the run allows it.
    pub fn is_optional(&self) -> bool {
        !self.critical
    }

    /// Ids of required dependencies, in declaration order
    pub fn required_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| d.required)
            .map(|d| d.plugin_id.as_str())
    }

    /// Structural validation. Returns every problem found, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.id.trim().is_empty() {
            problems.push("plugin id must not be empty".to_string());
        } else if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            problems.push(format!(
                "plugin id '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
                self.id
            ));
        }

        if self.version.trim().is_empty() {
            problems.push("plugin version must not be empty".to_string());
        } else if let Err(e) = parse_version(&self.version) {
            problems.push(e.to_string());
        }

        if !self.layer.is_known() {
            problems.push(format!(
                "layer {} is outside the known range {}..={}",
                self.layer.value(),
                MIN_LAYER,
                MAX_LAYER
            ));
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if dep.plugin_id.trim().is_empty() {
                problems.push("dependency id must not be empty".to_string());
            } else if !seen.insert(dep.plugin_id.as_str()) {
                problems.push(format!("dependency '{}' is declared more than once", dep.plugin_id));
            }
        }

        problems
    }
}
