use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::{Layer, PluginDescriptor};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::graph::DependencyGraph;

/// Lifecycle status of a registered plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginStatus {
    Registered,
    Initializing,
    Active,
    Inactive,
    Error,
    Destroyed,
}

impl PluginStatus {
    /// Whether the state machine allows moving from `self` to `to`.
    pub fn can_transition_to(&self, to: PluginStatus) -> bool {
        use PluginStatus::*;
        match (self, to) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Registered, Initializing) => true,
            (Initializing, Active) | (Initializing, Error) => true,
            (Active, Inactive) | (Inactive, Active) => true,
            (Active, Error) | (Inactive, Error) | (Error, Error) => true,
            // Explicit re-initialization after a failure
            (Error, Initializing) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PluginStatus::Destroyed)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginStatus::Registered => "registered",
            PluginStatus::Initializing => "initializing",
            PluginStatus::Active => "active",
            PluginStatus::Inactive => "inactive",
            PluginStatus::Error => "error",
            PluginStatus::Destroyed => "destroyed",
        };
        f.write_str(label)
    }
}

/// Bookkeeping for one registered plugin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginState {
    pub status: PluginStatus,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub initialization_time_ms: Option<u64>,
    pub health_check_count: u32,
    pub last_health_check_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl PluginState {
    fn new() -> Self {
        Self {
            status: PluginStatus::Registered,
            error_count: 0,
            last_error: None,
            initialization_time_ms: None,
            health_check_count: 0,
            last_health_check_at: None,
            registered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
struct LifecycleEntry {
    layer: Layer,
    dependencies: Vec<PluginDependency>,
    state: PluginState,
}

/// Per-status plugin counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleSummary {
    pub registered: usize,
    pub initializing: usize,
    pub active: usize,
    pub inactive: usize,
    pub error: usize,
}

/// Tracks the lifecycle state machine of every registered plugin.
///
/// Only the container drives transitions; everything else reads.
#[derive(Debug, Clone, Default)]
pub struct LifecycleManager {
    entries: HashMap<String, LifecycleEntry>,
    order: Vec<String>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the `Registered` state for a plugin.
    pub fn register(&mut self, descriptor: &PluginDescriptor) -> Result<(), PluginSystemError> {
        if self.entries.contains_key(&descriptor.id) {
            return Err(PluginSystemError::AlreadyRegistered {
                plugin_id: descriptor.id.clone(),
            });
        }
        self.entries.insert(
            descriptor.id.clone(),
            LifecycleEntry {
                layer: descriptor.layer,
                dependencies: descriptor.dependencies.clone(),
                state: PluginState::new(),
            },
        );
        self.order.push(descriptor.id.clone());
        log::debug!("Lifecycle: '{}' registered", descriptor.id);
        Ok(())
    }

    /// Drop a plugin's state, returning it marked `Destroyed`.
    pub fn unregister(&mut self, id: &str) -> Option<PluginState> {
        let mut entry = self.entries.remove(id)?;
        self.order.retain(|o| o != id);
        entry.state.status = PluginStatus::Destroyed;
        Some(entry.state)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn state(&self, id: &str) -> Option<&PluginState> {
        self.entries.get(id).map(|e| &e.state)
    }

    pub fn status(&self, id: &str) -> Option<PluginStatus> {
        self.state(id).map(|s| s.status)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.status(id) == Some(PluginStatus::Active)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut LifecycleEntry, PluginSystemError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| PluginSystemError::PluginNotFound {
                plugin_id: id.to_string(),
            })
    }

    /// Move a plugin to `to`, enforcing the state machine.
    pub fn transition(&mut self, id: &str, to: PluginStatus) -> Result<(), PluginSystemError> {
        let entry = self.entry_mut(id)?;
        let from = entry.state.status;
        if !from.can_transition_to(to) {
            return Err(PluginSystemError::InvalidTransition {
                plugin_id: id.to_string(),
                from,
                to,
            });
        }
        entry.state.status = to;
        log::debug!("Lifecycle: '{}' {} -> {}", id, from, to);
        Ok(())
    }

    /// `Registered | Error -> Initializing`
    pub fn begin_initialization(&mut self, id: &str) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Initializing)
    }

    /// `Initializing -> Active`, recording how long initialization took.
    pub fn complete_initialization(&mut self, id: &str, elapsed_ms: u64) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Active)?;
        let entry = self.entry_mut(id)?;
        entry.state.initialization_time_ms = Some(elapsed_ms);
        Ok(())
    }

    /// Move to `Error` and record the failure.
    pub fn record_error(&mut self, id: &str, message: &str) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Error)?;
        let entry = self.entry_mut(id)?;
        entry.state.error_count += 1;
        entry.state.last_error = Some(message.to_string());
        Ok(())
    }

    pub fn activate(&mut self, id: &str) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Active)
    }

    pub fn deactivate(&mut self, id: &str) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Inactive)
    }

    /// Terminal transition. The entry stays until [`unregister`](Self::unregister).
    pub fn destroy(&mut self, id: &str) -> Result<(), PluginSystemError> {
        self.transition(id, PluginStatus::Destroyed)
    }

    /// Append a health probe result. Never changes `status`.
    pub fn record_health_check(&mut self, id: &str, healthy: bool, message: Option<&str>) -> Result<(), PluginSystemError> {
        let entry = self.entry_mut(id)?;
        entry.state.health_check_count += 1;
        entry.state.last_health_check_at = Some(Utc::now());
        if !healthy {
            entry.state.error_count += 1;
            entry.state.last_error = Some(message.unwrap_or("health check failed").to_string());
        }
        Ok(())
    }

    /// Required dependencies of `id` that are not `Active`.
    pub fn pending_dependencies(&self, id: &str) -> Vec<String> {
        let Some(entry) = self.entries.get(id) else {
            return Vec::new();
        };
        let mut pending = Vec::new();
        for dep in &entry.dependencies {
            let ready = self.is_active(&dep.plugin_id);
            if ready {
                continue;
            }
            if dep.required {
                pending.push(dep.plugin_id.clone());
            } else {
                log::debug!(
                    "Optional dependency '{}' of '{}' is not active",
                    dep.plugin_id,
                    id
                );
            }
        }
        pending
    }

    /// True iff every required dependency is `Active`.
    pub fn are_dependencies_ready(&self, id: &str) -> bool {
        self.entries.contains_key(id) && self.pending_dependencies(id).is_empty()
    }

    /// Registered plugins grouped by ascending layer, dependency-sorted within each layer.
    pub fn startup_batches(&self) -> Result<Vec<(Layer, Vec<String>)>, PluginSystemError> {
        let mut by_layer: BTreeMap<Layer, DependencyGraph> = BTreeMap::new();
        for id in &self.order {
            if let Some(entry) = self.entries.get(id) {
                by_layer
                    .entry(entry.layer)
                    .or_default()
                    .add_node(id, entry.dependencies.clone(), entry.layer);
            }
        }

        let mut batches = Vec::with_capacity(by_layer.len());
        for (layer, local) in by_layer {
            // Edges leaving the layer are ignored by the local graph
            let ordered = local.get_topological_order()?;
            batches.push((layer, ordered));
        }
        Ok(batches)
    }

    /// Flattened [`startup_batches`](Self::startup_batches).
    pub fn get_startup_order(&self) -> Result<Vec<String>, PluginSystemError> {
        Ok(self
            .startup_batches()?
            .into_iter()
            .flat_map(|(_, ids)| ids)
            .collect())
    }

    pub fn summary(&self) -> LifecycleSummary {
        let mut summary = LifecycleSummary::default();
        for entry in self.entries.values() {
            match entry.state.status {
                PluginStatus::Registered => summary.registered += 1,
                PluginStatus::Initializing => summary.initializing += 1,
                PluginStatus::Active => summary.active += 1,
                PluginStatus::Inactive => summary.inactive += 1,
                PluginStatus::Error => summary.error += 1,
                PluginStatus::Destroyed => {}
            }
        }
        summary
    }
}
