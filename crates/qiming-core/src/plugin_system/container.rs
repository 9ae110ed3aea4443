use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{ContainerConfig, PluginConfig};
use crate::kernel::services::ServiceRegistry;
use crate::plugin_system::dependency::{DependencyError, DependencyReport};
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::graph::{DependencyGraph, GraphStatus};
use crate::plugin_system::lifecycle::{LifecycleManager, LifecycleSummary, PluginState, PluginStatus};
use crate::plugin_system::traits::{Plugin, PluginContext};

/// Container shared between the engine, the level manager, the pipeline and
/// the health monitor.
pub type SharedContainer = Arc<RwLock<PluginContainer>>;

struct RegisteredPlugin {
    instance: Arc<dyn Plugin>,
    descriptor: PluginDescriptor,
    config: PluginConfig,
}

/// A plugin whose initialization failed during [`PluginContainer::initialize_all`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitFailure {
    pub plugin_id: String,
    pub message: String,
}

/// Outcome of [`PluginContainer::initialize_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitializationReport {
    /// Plugins that became `Active`, in initialization order
    pub initialized: Vec<String>,
    pub failed: Vec<InitFailure>,
    /// Plugins left untouched because their config disables them
    pub disabled: Vec<String>,
}

impl InitializationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot of the container for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub total_plugins: usize,
    pub lifecycle: LifecycleSummary,
    pub graph: GraphStatus,
}

/// Registry of plugin instances and their configuration.
///
/// Every registration goes through the dependency graph and the lifecycle
/// manager. A registration that fails validation leaves both exactly as they
/// were before the call.
pub struct PluginContainer {
    plugins: HashMap<String, RegisteredPlugin>,
    graph: DependencyGraph,
    lifecycle: LifecycleManager,
    config: ContainerConfig,
    services: Arc<ServiceRegistry>,
}

impl Default for PluginContainer {
    fn default() -> Self {
        Self::new(ContainerConfig::default(), Arc::new(ServiceRegistry::new()))
    }
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContainer")
            .field("plugins", &self.lifecycle.ids())
            .field("config", &self.config)
            .field("services", &self.services)
            .finish()
    }
}

impl PluginContainer {
    pub fn new(config: ContainerConfig, services: Arc<ServiceRegistry>) -> Self {
        Self {
            plugins: HashMap::new(),
            graph: DependencyGraph::new(),
            lifecycle: LifecycleManager::new(),
            config,
            services,
        }
    }

    /// Wrap the container for sharing across tasks
    pub fn into_shared(self) -> SharedContainer {
        Arc::new(RwLock::new(self))
    }

    /// Register a plugin instance.
    ///
    /// `config` defaults to [`PluginConfig::default`]. With `auto_initialize`
    /// set, the plugin is initialized right away; an initialization failure
    /// is logged and left in the lifecycle state, the registration stands.
    pub async fn register_plugin(
        &mut self,
        plugin: Arc<dyn Plugin>,
        config: Option<PluginConfig>,
    ) -> Result<(), PluginSystemError> {
        let descriptor = PluginDescriptor::from_plugin(plugin.as_ref());
        let id = descriptor.id.clone();

        if self.plugins.contains_key(&id) || self.lifecycle.contains(&id) {
            return Err(PluginSystemError::AlreadyRegistered { plugin_id: id });
        }

        let problems = descriptor.validate();
        if !problems.is_empty() {
            log::warn!("Rejected plugin '{}': {}", id, problems.join("; "));
            return Err(PluginSystemError::InvalidPlugin {
                plugin_id: id,
                reasons: problems,
            });
        }

        let graph_snapshot = self.graph.clone();
        self.lifecycle.register(&descriptor)?;
        self.graph
            .add_node(&id, descriptor.dependencies.clone(), descriptor.layer);

        if let Err(e) = self.check_registration(&descriptor) {
            self.graph = graph_snapshot;
            self.lifecycle.unregister(&id);
            log::warn!("Rolled back registration of '{}': {}", id, e);
            return Err(e);
        }

        log::info!(
            "Registered plugin '{}' v{} in {}",
            id,
            descriptor.version,
            descriptor.layer
        );
        self.plugins.insert(
            id.clone(),
            RegisteredPlugin {
                instance: plugin,
                descriptor,
                config: config.unwrap_or_default(),
            },
        );

        if self.config.auto_initialize {
            if let Err(e) = self.initialize_plugin(&id).await {
                log::warn!("Auto-initialization of '{}' failed: {}", id, e);
            }
        }
        Ok(())
    }

    /// Dependency and cycle checks run after `descriptor` was added to the graph.
    fn check_registration(&self, descriptor: &PluginDescriptor) -> Result<(), PluginSystemError> {
        if self.config.validate_dependencies {
            let available: HashSet<String> = self.graph.ids().iter().cloned().collect();
            let mut missing = Vec::new();
            for node_id in self.graph.ids() {
                let report = self.graph.check_dependencies(node_id, &available);
                for dep in report.missing_required {
                    if !missing.contains(&dep) {
                        missing.push(dep);
                    }
                }
            }
            if !missing.is_empty() {
                return Err(PluginSystemError::DependencyError {
                    plugin_id: descriptor.id.clone(),
                    missing,
                });
            }

            for dep in &descriptor.dependencies {
                let Some(range) = &dep.version_range else {
                    continue;
                };
                let Some(actual) = self.version_of(&dep.plugin_id) else {
                    continue;
                };
                if !dep.is_compatible_with(actual) {
                    return Err(DependencyError::IncompatibleVersion {
                        plugin_id: dep.plugin_id.clone(),
                        required_range: range.clone(),
                        actual_version: actual.to_string(),
                    }
                    .into());
                }
            }
        }

        if let Some(cycle) = self.graph.find_cycle() {
            return Err(PluginSystemError::CircularDependencyError {
                plugin_id: descriptor.id.clone(),
                cycle,
            });
        }
        Ok(())
    }

    fn version_of(&self, id: &str) -> Option<&str> {
        self.plugins.get(id).map(|p| p.descriptor.version.as_str())
    }

    /// Remove a plugin. Refused while another registered plugin requires it.
    pub async fn unregister_plugin(&mut self, id: &str) -> Result<(), PluginSystemError> {
        let instance = match self.plugins.get(id) {
            Some(registered) => Arc::clone(&registered.instance),
            None => {
                return Err(PluginSystemError::PluginNotFound {
                    plugin_id: id.to_string(),
                });
            }
        };

        let dependents = self.graph.blocking_dependents(id);
        if !dependents.is_empty() {
            return Err(PluginSystemError::CannotRemove {
                plugin_id: id.to_string(),
                dependents,
            });
        }

        if let Err(e) = instance.cleanup().await {
            log::warn!("Cleanup of plugin '{}' failed: {}", id, e);
        }
        if self.lifecycle.status(id).is_some_and(|s| !s.is_terminal()) {
            self.lifecycle.destroy(id)?;
        }
        self.lifecycle.unregister(id);
        self.graph.remove_node(id);
        self.plugins.remove(id);
        log::info!("Unregistered plugin '{}'", id);
        Ok(())
    }

    /// Initialize one plugin. Its required dependencies must already be `Active`.
    ///
    /// No retries: a failing init hook leaves the plugin in `Error`.
    pub async fn initialize_plugin(&mut self, id: &str) -> Result<(), PluginSystemError> {
        let (instance, config) = match self.plugins.get(id) {
            Some(registered) => (Arc::clone(&registered.instance), registered.config.clone()),
            None => {
                return Err(PluginSystemError::PluginNotFound {
                    plugin_id: id.to_string(),
                });
            }
        };

        if self.lifecycle.is_active(id) {
            return Ok(());
        }

        let pending = self.lifecycle.pending_dependencies(id);
        if !pending.is_empty() {
            return Err(PluginSystemError::DependenciesNotReady {
                plugin_id: id.to_string(),
                pending,
            });
        }

        self.lifecycle.begin_initialization(id)?;
        log::debug!("Initializing plugin '{}'", id);

        let context = PluginContext::new(Arc::clone(&self.services));
        let started = Instant::now();
        // Spawned so a panicking init hook surfaces as a JoinError
        let outcome = tokio::spawn(async move { instance.initialize(&config, &context).await }).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let message = match outcome {
            Ok(Ok(())) => {
                self.lifecycle.complete_initialization(id, elapsed_ms)?;
                log::info!("Plugin '{}' initialized in {} ms", id, elapsed_ms);
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => format!("initialization task failed: {join_error}"),
        };

        self.lifecycle.record_error(id, &message)?;
        log::error!("Plugin '{}' failed to initialize: {}", id, message);
        Err(PluginSystemError::InitializationFailed {
            plugin_id: id.to_string(),
            message,
        })
    }

    /// Initialize every registered plugin, layer by layer.
    ///
    /// Best effort: a failure is recorded in the report and the walk goes on.
    /// Plugins whose config disables them are left `Registered`.
    pub async fn initialize_all(&mut self) -> Result<InitializationReport, PluginSystemError> {
        let batches = self.lifecycle.startup_batches()?;
        let mut report = InitializationReport::default();

        for (layer, ids) in batches {
            log::debug!("Initializing {} plugin(s) in {}", ids.len(), layer);
            for id in ids {
                if self.lifecycle.is_active(&id) {
                    continue;
                }
                if self.plugins.get(&id).is_some_and(|p| !p.config.enabled) {
                    log::info!("Plugin '{}' is disabled, skipping initialization", id);
                    report.disabled.push(id);
                    continue;
                }
                match self.initialize_plugin(&id).await {
                    Ok(()) => report.initialized.push(id),
                    Err(e) => {
                        log::warn!("Initialization of '{}' failed, continuing: {}", id, e);
                        report.failed.push(InitFailure {
                            plugin_id: id,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        log::info!(
            "Initialized {} plugin(s), {} failed, {} disabled",
            report.initialized.len(),
            report.failed.len(),
            report.disabled.len()
        );
        Ok(report)
    }

    /// Make a plugin `Active`, initializing it first when needed.
    pub async fn activate_plugin(&mut self, id: &str) -> Result<(), PluginSystemError> {
        match self.lifecycle.status(id) {
            None => Err(PluginSystemError::PluginNotFound {
                plugin_id: id.to_string(),
            }),
            Some(PluginStatus::Active) => Ok(()),
            Some(PluginStatus::Registered) | Some(PluginStatus::Error) => self.initialize_plugin(id).await,
            Some(PluginStatus::Inactive) => {
                let pending = self.lifecycle.pending_dependencies(id);
                if !pending.is_empty() {
                    return Err(PluginSystemError::DependenciesNotReady {
                        plugin_id: id.to_string(),
                        pending,
                    });
                }
                self.lifecycle.activate(id)
            }
            Some(_) => self.lifecycle.activate(id),
        }
    }

    /// Move a plugin to `Inactive`. Active dependents must be deactivated first.
    pub fn deactivate_plugin(&mut self, id: &str) -> Result<(), PluginSystemError> {
        let status = self
            .lifecycle
            .status(id)
            .ok_or_else(|| PluginSystemError::PluginNotFound {
                plugin_id: id.to_string(),
            })?;

        let active_dependents: Vec<String> = self
            .graph
            .get_dependents(id)
            .into_iter()
            .filter(|d| d != id && self.lifecycle.is_active(d))
            .collect();
        if !active_dependents.is_empty() {
            return Err(PluginSystemError::HasActiveDependents {
                plugin_id: id.to_string(),
                dependents: active_dependents,
            });
        }

        if status == PluginStatus::Inactive {
            return Ok(());
        }
        self.lifecycle.deactivate(id)
    }

    /// Registered, `Active` and reporting itself available.
    pub fn is_plugin_available(&self, id: &str) -> bool {
        self.plugins
            .get(id)
            .is_some_and(|p| self.lifecycle.is_active(id) && p.instance.is_available())
    }

    /// The subset of `configured` ids that can run now, in the given order.
    pub fn enabled_plugins(&self, configured: &[String]) -> Vec<String> {
        configured
            .iter()
            .filter(|id| {
                self.plugins.get(id.as_str()).is_some_and(|p| p.config.enabled)
                    && self.is_plugin_available(id)
            })
            .cloned()
            .collect()
    }

    /// Topological order of `ids` over required edges.
    pub fn execution_order(&self, ids: &[String]) -> Result<Vec<String>, PluginSystemError> {
        Ok(self.graph.topological_sort(Some(ids))?)
    }

    /// Dependency report for one plugin, including version mismatches.
    pub fn dependency_report(&self, id: &str) -> DependencyReport {
        let available: HashSet<String> = self.plugins.keys().cloned().collect();
        let mut report = self.graph.check_dependencies(id, &available);
        for dep in self.graph.get_dependencies(id) {
            if let Some(actual) = self.version_of(&dep.plugin_id) {
                if !dep.is_compatible_with(actual) {
                    report.version_mismatches.push(dep.plugin_id.clone());
                }
            }
        }
        report
    }

    /// Deactivate, clean up and destroy every plugin in reverse startup order.
    ///
    /// Best effort: every plugin is visited, failures are aggregated.
    pub async fn shutdown_all(&mut self) -> Result<(), PluginSystemError> {
        let mut order = self
            .lifecycle
            .get_startup_order()
            .unwrap_or_else(|_| self.lifecycle.ids().to_vec());
        order.reverse();

        let mut failures: Vec<(String, String)> = Vec::new();
        for id in order {
            let Some(instance) = self.plugins.get(&id).map(|p| Arc::clone(&p.instance)) else {
                continue;
            };
            if self.lifecycle.is_active(&id) {
                if let Err(e) = self.lifecycle.deactivate(&id) {
                    failures.push((id.clone(), e.to_string()));
                }
            }
            if let Err(e) = instance.cleanup().await {
                log::warn!("Cleanup of plugin '{}' failed: {}", id, e);
                failures.push((id.clone(), e.to_string()));
            }
            if self.lifecycle.status(&id).is_some_and(|s| !s.is_terminal()) {
                if let Err(e) = self.lifecycle.destroy(&id) {
                    failures.push((id.clone(), e.to_string()));
                }
            }
            log::debug!("Plugin '{}' shut down", id);
        }

        if failures.is_empty() {
            log::info!("All plugins shut down");
            Ok(())
        } else {
            let ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
            let messages: Vec<String> = failures.iter().map(|(id, m)| format!("{id}: {m}")).collect();
            Err(PluginSystemError::ShutdownError {
                plugin_id: ids.join(", "),
                message: messages.join("; "),
            })
        }
    }

    /// Record one health probe result through the lifecycle manager.
    pub fn record_health_check(&mut self, id: &str, healthy: bool, message: Option<&str>) -> Result<(), PluginSystemError> {
        self.lifecycle.record_health_check(id, healthy, message)
    }

    /// Plugins eligible for health probing, in registration order
    pub fn health_check_targets(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        self.lifecycle
            .ids()
            .iter()
            .filter(|id| self.lifecycle.status(id).is_some_and(|s| !s.is_terminal()))
            .filter_map(|id| {
                self.plugins
                    .get(id)
                    .map(|p| (id.clone(), Arc::clone(&p.instance)))
            })
            .collect()
    }

    pub fn get_plugin(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(id).map(|p| Arc::clone(&p.instance))
    }

    pub fn descriptor(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(id).map(|p| &p.descriptor)
    }

    pub fn plugin_config(&self, id: &str) -> Option<&PluginConfig> {
        self.plugins.get(id).map(|p| &p.config)
    }

    /// Replace a plugin's configuration. Takes effect on the next run.
    pub fn set_plugin_config(&mut self, id: &str, config: PluginConfig) -> Result<(), PluginSystemError> {
        let registered = self
            .plugins
            .get_mut(id)
            .ok_or_else(|| PluginSystemError::PluginNotFound {
                plugin_id: id.to_string(),
            })?;
        registered.config = config;
        Ok(())
    }

    /// Registered ids in registration order
    pub fn plugin_ids(&self) -> Vec<String> {
        self.lifecycle
            .ids()
            .iter()
            .filter(|id| self.plugins.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn state(&self, id: &str) -> Option<&PluginState> {
        self.lifecycle.state(id)
    }

    pub fn status(&self, id: &str) -> Option<PluginStatus> {
        self.lifecycle.status(id)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services)
    }

    pub fn status_summary(&self) -> ContainerStatus {
        ContainerStatus {
            total_plugins: self.plugins.len(),
            lifecycle: self.lifecycle.summary(),
            graph: self.graph.status(),
        }
    }
}
