use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use qiming_core::config::PluginConfig;
use qiming_core::pipeline::{ProcessContext, StandardInput};
use qiming_core::plugin_system::dependency::PluginDependency;
use qiming_core::plugin_system::descriptor::{Layer, PluginDescriptor, PluginMetadata};
use qiming_core::plugin_system::manifest::PluginManifest;
use qiming_core::plugin_system::traits::{Plugin, PluginContext, PluginError, PluginOutput, ValidationReport};

const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Stand-in plugin built from a descriptor.
///
/// Echoes which dependency results it received. Behavior can be steered
/// through its `PluginConfig.settings`:
///
/// ```json
/// { "delay_ms": 250, "fail": true, "confidence": 0.3 }
/// ```
pub struct SimulatedPlugin {
    descriptor: PluginDescriptor,
}

impl SimulatedPlugin {
    pub fn new(descriptor: PluginDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Plugin for SimulatedPlugin {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn version(&self) -> &str {
        &self.descriptor.version
    }

    fn layer(&self) -> Layer {
        self.descriptor.layer
    }

    fn dependencies(&self) -> Vec<PluginDependency> {
        self.descriptor.dependencies.clone()
    }

    fn critical(&self) -> bool {
        self.descriptor.critical
    }

    fn metadata(&self) -> PluginMetadata {
        self.descriptor.metadata.clone()
    }

    async fn initialize(&self, config: &PluginConfig, _context: &PluginContext) -> Result<(), PluginError> {
        if config.setting::<bool>("fail_init").unwrap_or(false) {
            return Err(PluginError::Init(format!("{} is configured to fail initialization", self.id())));
        }
        log::debug!("Simulated plugin '{}' ready", self.id());
        Ok(())
    }

    fn validate(&self, _input: &StandardInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn process(&self, input: &StandardInput, context: &ProcessContext) -> Result<PluginOutput, PluginError> {
        if let Some(delay_ms) = context.config.setting::<u64>("delay_ms") {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if context.config.setting::<bool>("fail").unwrap_or(false) {
            return Err(PluginError::Execution(format!("{} is configured to fail", self.id())));
        }

        let saw: Vec<&String> = input.dependency_results.keys().collect();
        let confidence = context
            .config
            .setting::<f64>("confidence")
            .unwrap_or(DEFAULT_CONFIDENCE);
        let data = json!({
            "plugin": self.id(),
            "layer": self.layer().value(),
            "strategy": context.strategy,
            "saw": saw,
        });
        Ok(PluginOutput::success(data, confidence))
    }
}

/// One simulated plugin per manifest entry, in manifest order
pub fn plugins_from_manifest(manifest: &PluginManifest) -> Vec<Arc<dyn Plugin>> {
    manifest
        .plugins
        .iter()
        .map(|descriptor| Arc::new(SimulatedPlugin::new(descriptor.clone())) as Arc<dyn Plugin>)
        .collect()
}
