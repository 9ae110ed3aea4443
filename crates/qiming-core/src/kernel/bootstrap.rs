use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::certainty::manager::{CertaintyLevelManager, SharedLevelManager, SwitchOutcome};
use crate::certainty::{CertaintyLevel, LevelSelection, auto_select_level};
use crate::config::EngineConfig;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::executor::Pipeline;
use crate::pipeline::plan::ExecutionPlan;
use crate::pipeline::request::{NamingInput, NamingRequest};
use crate::pipeline::response::RunResponse;
use crate::plugin_system::container::{InitializationReport, PluginContainer, SharedContainer};
use crate::plugin_system::health::{HealthMonitor, HealthReport, run_health_checks};
use crate::plugin_system::traits::Plugin;

/// Main engine struct wiring the plugin container, the certainty level
/// manager and the execution pipeline.
pub struct Engine {
    config: EngineConfig,
    container: SharedContainer,
    levels: SharedLevelManager,
    pipeline: Pipeline,
    services: Arc<ServiceRegistry>,
    health_monitor: Option<HealthMonitor>,
    started: bool,
}

impl Engine {
    /// Creates an engine with an empty service registry.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_services(config, ServiceRegistry::new())
    }

    /// Load the configuration file at `path` and build an engine from it.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = EngineConfig::from_path(path)?;
        Self::new(config)
    }

    /// Creates an engine whose plugins see `services` during initialization
    /// and processing.
    pub fn with_services(config: EngineConfig, services: ServiceRegistry) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        config.validate().map_err(|e| bootstrap_error("invalid engine configuration", e.into()))?;

        let services = Arc::new(services);
        log::debug!("Service registry: {:?}", services);

        let container = PluginContainer::new(config.container.clone(), Arc::clone(&services)).into_shared();

        let mut manager = CertaintyLevelManager::new(Arc::clone(&container), config.initial_level);
        manager
            .apply_overrides(&config.levels)
            .map_err(|e| bootstrap_error("invalid level overrides", e.into()))?;
        let levels: SharedLevelManager = Arc::new(RwLock::new(manager));

        let pipeline = Pipeline::new(Arc::clone(&container), Arc::clone(&levels), config.pipeline.clone());
        log::info!("Engine ready at certainty level {}", config.initial_level);

        Ok(Self {
            config,
            container,
            levels,
            pipeline,
            services,
            health_monitor: None,
            started: false,
        })
    }

    /// Register a plugin with the configuration the engine config holds for its id.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let config = self.config.plugin_config(plugin.id());
        self.container
            .write()
            .await
            .register_plugin(plugin, Some(config))
            .await?;
        Ok(())
    }

    /// Remove a plugin that no other plugin requires.
    pub async fn unregister_plugin(&self, plugin_id: &str) -> Result<()> {
        self.container.write().await.unregister_plugin(plugin_id).await?;
        Ok(())
    }

    /// Initialize every registered plugin and start health monitoring when enabled.
    ///
    /// Individual initialization failures are reported, not returned.
    pub async fn start(&mut self) -> Result<InitializationReport> {
        if self.started {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                message: "Engine already started".to_string(),
                source: None,
            });
        }

        let report = self
            .container
            .write()
            .await
            .initialize_all()
            .await
            .map_err(|e| Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Initialize,
                message: "Could not order plugins for initialization".to_string(),
                source: Some(Box::new(e.into())),
            })?;
        for failure in &report.failed {
            log::warn!("Plugin '{}' is unavailable: {}", failure.plugin_id, failure.message);
        }

        if self.config.container.health_checks_enabled {
            self.health_monitor = Some(HealthMonitor::start(
                Arc::clone(&self.container),
                Duration::from_millis(self.config.container.health_check_interval_ms),
                Duration::from_millis(self.config.container.health_check_timeout_ms),
            ));
        }

        self.started = true;
        log::info!("Engine started with {} active plugin(s)", report.initialized.len());
        Ok(report)
    }

    /// Execute one request. Failures are reported inside the response.
    pub async fn run(&self, request: NamingRequest) -> RunResponse {
        self.pipeline.execute(request).await
    }

    /// Resolve how a request would execute without invoking any plugin.
    pub async fn plan(&self, request: &NamingRequest) -> Result<ExecutionPlan> {
        Ok(self.pipeline.plan(request).await?)
    }

    /// Pick a certainty level from raw input.
    pub fn select_level(&self, input: &NamingInput) -> LevelSelection {
        auto_select_level(input)
    }

    pub async fn current_level(&self) -> CertaintyLevel {
        self.levels.read().await.current_level()
    }

    /// Switch the engine-wide certainty level.
    pub async fn switch_level(&self, target: CertaintyLevel, context: Option<&NamingInput>) -> Result<SwitchOutcome> {
        Ok(self.levels.write().await.switch_level(target, context).await?)
    }

    /// Probe every plugin once, outside the periodic monitor.
    pub async fn check_health(&self) -> Vec<HealthReport> {
        let budget = Duration::from_millis(self.config.container.health_check_timeout_ms);
        run_health_checks(&self.container, budget).await
    }

    /// Stop health monitoring and shut every plugin down in reverse startup order.
    pub async fn shutdown(&mut self) -> Result<()> {
        log::info!("Shutting down engine...");
        if let Some(monitor) = self.health_monitor.take() {
            monitor.stop().await;
        }

        let outcome = self.container.write().await.shutdown_all().await;
        self.started = false;
        outcome.map_err(|e| {
            log::error!("Error during plugin shutdown: {}", e);
            Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Shutdown,
                message: "One or more plugins failed to shut down".to_string(),
                source: Some(Box::new(e.into())),
            }
        })?;
        log::info!("Engine shutdown complete.");
        Ok(())
    }

    /// Returns whether [`start`](Self::start) has completed.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_monitoring_health(&self) -> bool {
        self.health_monitor.as_ref().is_some_and(HealthMonitor::is_running)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn container(&self) -> SharedContainer {
        Arc::clone(&self.container)
    }

    pub fn levels(&self) -> SharedLevelManager {
        Arc::clone(&self.levels)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services)
    }
}

fn bootstrap_error(message: &str, source: Error) -> Error {
    log::error!("{}: {}", message, source);
    Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Bootstrap,
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}
