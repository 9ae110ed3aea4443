// Shared fixtures for the in-crate test modules
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::certainty::{CertaintyLevel, CertaintyLevelManager};
use crate::certainty::manager::SharedLevelManager;
use crate::config::{ContainerConfig, PipelineConfig, PluginConfig};
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::context::{ProcessContext, StandardInput};
use crate::pipeline::executor::Pipeline;
use crate::pipeline::request::{BirthInfo, Gender, NamingInput};
use crate::plugin_system::container::{PluginContainer, SharedContainer};
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::Layer;
use crate::plugin_system::traits::{HealthStatus, Plugin, PluginContext, PluginError, PluginOutput, ValidationReport};

/// What `process` does
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Returns `Err`
    Fail,
    /// Fails the first `n` calls, then succeeds
    FailTimes(u32),
    /// Returns a successful output with a null payload
    NullData,
    Panic,
}

pub struct MockPlugin {
    id: String,
    version: String,
    layer: Layer,
    dependencies: Vec<PluginDependency>,
    critical: bool,
    behavior: Behavior,
    confidence: f64,
    delay: Duration,
    reject_input: bool,
    fail_init: bool,
    healthy: bool,
    available: AtomicBool,
    pub init_calls: AtomicU32,
    pub process_calls: AtomicU32,
    pub cleanup_calls: AtomicU32,
}

impl MockPlugin {
    pub fn new(id: &str, layer: u8) -> Self {
        Self {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            layer: Layer::new(layer),
            dependencies: Vec::new(),
            critical: true,
            behavior: Behavior::Succeed,
            confidence: 0.9,
            delay: Duration::ZERO,
            reject_input: false,
            fail_init: false,
            healthy: true,
            available: AtomicBool::new(true),
            init_calls: AtomicU32::new(0),
            process_calls: AtomicU32::new(0),
            cleanup_calls: AtomicU32::new(0),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn requires(mut self, id: &str) -> Self {
        self.dependencies.push(PluginDependency::required_any(id));
        self
    }

    pub fn optionally_uses(mut self, id: &str) -> Self {
        self.dependencies.push(PluginDependency::optional_any(id));
        self
    }

    pub fn depends_on(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn optional(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn rejecting_input(mut self) -> Self {
        self.reject_input = true;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn processed(&self) -> u32 {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn layer(&self) -> Layer {
        self.layer
    }

    fn dependencies(&self) -> Vec<PluginDependency> {
        self.dependencies.clone()
    }

    fn critical(&self) -> bool {
        self.critical
    }

    async fn initialize(&self, _config: &PluginConfig, _context: &PluginContext) -> Result<(), PluginError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(PluginError::Init(format!("{} refused to start", self.id)));
        }
        Ok(())
    }

    fn validate(&self, _input: &StandardInput) -> ValidationReport {
        if self.reject_input {
            ValidationReport::invalid([format!("{} cannot use this input", self.id)])
        } else {
            ValidationReport::ok()
        }
    }

    async fn process(&self, input: &StandardInput, _context: &ProcessContext) -> Result<PluginOutput, PluginError> {
        let call = self.process_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.behavior {
            Behavior::Fail => Err(PluginError::Execution(format!("{} failed", self.id))),
            Behavior::FailTimes(n) if call <= n => {
                Err(PluginError::Execution(format!("{} failed on call {}", self.id, call)))
            }
            Behavior::NullData => Ok(PluginOutput::success(serde_json::Value::Null, self.confidence)),
            Behavior::Panic => panic!("{} panicked", self.id),
            Behavior::Succeed | Behavior::FailTimes(_) => {
                let seen: Vec<&String> = input.dependency_results.keys().collect();
                Ok(PluginOutput::success(
                    json!({ "plugin": self.id, "saw": seen }),
                    self.confidence,
                ))
            }
        }
    }

    async fn cleanup(&self) -> Result<(), PluginError> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn health_status(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy(format!("{} is degraded", self.id))
        }
    }
}

/// Container with default settings, shared
pub fn shared_container() -> SharedContainer {
    PluginContainer::new(ContainerConfig::default(), Arc::new(ServiceRegistry::new())).into_shared()
}

/// Register every plugin and initialize them all
pub async fn populated_container(plugins: Vec<Arc<MockPlugin>>) -> SharedContainer {
    let container = shared_container();
    {
        let mut guard = container.write().await;
        for plugin in plugins {
            guard.register_plugin(plugin, None).await.expect("registration");
        }
        let report = guard.initialize_all().await.expect("initialization");
        assert!(report.is_complete(), "initialization failures: {:?}", report.failed);
    }
    container
}

pub fn level_manager(container: &SharedContainer, level: CertaintyLevel) -> SharedLevelManager {
    Arc::new(tokio::sync::RwLock::new(CertaintyLevelManager::new(
        Arc::clone(container),
        level,
    )))
}

/// Pipeline over `container` with the default level configs
pub fn pipeline(container: &SharedContainer) -> Pipeline {
    let levels = level_manager(container, CertaintyLevel::Unknown);
    Pipeline::new(Arc::clone(container), levels, PipelineConfig::default())
}

/// Family name and gender only
pub fn identity_input() -> NamingInput {
    NamingInput {
        family_name: Some("Li".to_string()),
        gender: Some(Gender::Female),
        ..NamingInput::default()
    }
}

/// Identity plus exact birth date and time
pub fn full_input() -> NamingInput {
    NamingInput {
        birth_info: BirthInfo {
            year: Some(2024),
            month: Some(3),
            day: Some(15),
            hour: Some(8),
            minute: Some(30),
        },
        ..identity_input()
    }
}

/// Pipeline whose `level` enables exactly `enabled`, in that order
pub async fn pipeline_at(container: &SharedContainer, level: CertaintyLevel, enabled: &[&str], parallel: bool) -> Pipeline {
    let levels = level_manager(container, level);
    {
        let mut manager = levels.write().await;
        let mut config = manager.get_config(level);
        config.enabled_plugins = enabled.iter().map(|id| id.to_string()).collect();
        config.parallel_execution = parallel;
        manager.update_config(level, config).expect("valid level config");
    }
    Pipeline::new(Arc::clone(container), levels, PipelineConfig::default())
}
