use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::certainty::CertaintyLevel;
use crate::certainty::config::{HIGH_VALUE_PLUGINS, LevelConfig, data_requirements, default_level_configs};
use crate::certainty::error::{CertaintyError, DATA_INCOMPATIBLE};
use crate::config::LevelConfigOverride;
use crate::kernel::constants::MAX_SWITCH_HISTORY;
use crate::pipeline::request::{DataField, NamingInput};
use crate::plugin_system::container::SharedContainer;

/// Direction of a level change, by information content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchDirection {
    Upgrade,
    Downgrade,
    Same,
}

impl SwitchDirection {
    fn between(from: CertaintyLevel, to: CertaintyLevel) -> Self {
        if to.is_higher_than(from) {
            SwitchDirection::Upgrade
        } else if from.is_higher_than(to) {
            SwitchDirection::Downgrade
        } else {
            SwitchDirection::Same
        }
    }
}

/// Whether the supplied data supports moving between two levels.
///
/// Downgrades are always compatible and only carry advisory issues. Upgrades
/// are incompatible when newly enabled plugins need fields the input lacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    pub direction: SwitchDirection,
    pub issues: Vec<String>,
    pub adaptations: Vec<String>,
    pub missing_fields: Vec<DataField>,
}

/// Read-only preview of a switch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchValidation {
    pub from: CertaintyLevel,
    pub to: CertaintyLevel,
    pub valid: bool,
    pub warnings: Vec<String>,
    pub hints: Vec<String>,
    pub to_enable: Vec<String>,
    pub to_disable: Vec<String>,
}

/// What a committed switch did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchOutcome {
    pub from: CertaintyLevel,
    pub to: CertaintyLevel,
    /// False when the manager was already at the target level
    pub changed: bool,
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    /// Per-plugin (de)activation failures. Logged, never fatal.
    pub plugin_failures: Vec<String>,
    pub issues: Vec<String>,
    pub adaptations: Vec<String>,
}

impl SwitchOutcome {
    fn unchanged(level: CertaintyLevel) -> Self {
        Self {
            from: level,
            to: level,
            changed: false,
            enabled: Vec::new(),
            disabled: Vec::new(),
            plugin_failures: Vec::new(),
            issues: Vec::new(),
            adaptations: Vec::new(),
        }
    }
}

/// One entry of the switch history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSwitchRecord {
    pub from: CertaintyLevel,
    pub to: CertaintyLevel,
    pub at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Level manager shared between the engine and the pipeline
pub type SharedLevelManager = Arc<RwLock<CertaintyLevelManager>>;

/// Owns the per-level configs and the current level.
///
/// Readers always receive clones of a [`LevelConfig`], so an update never
/// affects a run already in flight.
pub struct CertaintyLevelManager {
    configs: BTreeMap<CertaintyLevel, LevelConfig>,
    current: CertaintyLevel,
    container: SharedContainer,
    history: VecDeque<LevelSwitchRecord>,
}

impl CertaintyLevelManager {
    /// Manager with the reference default configs
    pub fn new(container: SharedContainer, initial_level: CertaintyLevel) -> Self {
        Self {
            configs: default_level_configs(),
            current: initial_level,
            container,
            history: VecDeque::with_capacity(MAX_SWITCH_HISTORY),
        }
    }

    /// Apply config-file overrides on top of the current configs.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<CertaintyLevel, LevelConfigOverride>,
    ) -> Result<(), CertaintyError> {
        for (level, partial) in overrides {
            let mut config = self.get_config(*level);
            config.apply(partial);
            self.update_config(*level, config)?;
        }
        Ok(())
    }

    pub fn current_level(&self) -> CertaintyLevel {
        self.current
    }

    /// Copy of a level's config
    pub fn get_config(&self, level: CertaintyLevel) -> LevelConfig {
        self.configs
            .get(&level)
            .cloned()
            .unwrap_or_else(|| LevelConfig::default_for(level))
    }

    /// Copies of every level's config
    pub fn configs(&self) -> BTreeMap<CertaintyLevel, LevelConfig> {
        self.configs.clone()
    }

    /// Validate and replace a level's config
    pub fn update_config(&mut self, level: CertaintyLevel, config: LevelConfig) -> Result<(), CertaintyError> {
        config.validate(level)?;
        log::info!("Updated config for level {}", level);
        self.configs.insert(level, config);
        Ok(())
    }

    /// The most recent switch attempts, oldest first
    pub fn history(&self) -> &VecDeque<LevelSwitchRecord> {
        &self.history
    }

    /// `(to_enable, to_disable)` when moving from `from` to `to`
    fn plugin_delta(&self, from: CertaintyLevel, to: CertaintyLevel) -> (Vec<String>, Vec<String>) {
        let from_config = self.get_config(from);
        let to_config = self.get_config(to);
        let to_enable = to_config
            .enabled_plugins
            .iter()
            .filter(|id| !from_config.enables(id))
            .cloned()
            .collect();
        let to_disable = from_config
            .enabled_plugins
            .iter()
            .filter(|id| !to_config.enables(id))
            .cloned()
            .collect();
        (to_enable, to_disable)
    }

    /// Check whether `context` supports moving from `from` to `to`.
    ///
    /// A missing context counts as supplying no data.
    pub fn check_data_compatibility(
        &self,
        from: CertaintyLevel,
        to: CertaintyLevel,
        context: Option<&NamingInput>,
    ) -> CompatibilityReport {
        let direction = SwitchDirection::between(from, to);
        let (to_enable, to_disable) = self.plugin_delta(from, to);
        let mut report = CompatibilityReport {
            compatible: true,
            direction,
            issues: Vec::new(),
            adaptations: Vec::new(),
            missing_fields: Vec::new(),
        };

        match direction {
            SwitchDirection::Same => {}
            SwitchDirection::Downgrade => {
                let dropped: Vec<&String> = to_disable
                    .iter()
                    .filter(|id| HIGH_VALUE_PLUGINS.contains(&id.as_str()))
                    .collect();
                for id in &dropped {
                    report
                        .issues
                        .push(format!("'{id}' will no longer run at level {to}"));
                }
                if !dropped.is_empty() {
                    let target = self.get_config(to);
                    report.adaptations.push(format!(
                        "fall back to the {} strategy for five-element analysis",
                        target.fallback_strategy
                    ));
                }
            }
            SwitchDirection::Upgrade => {
                let available = context.map(NamingInput::available_fields).unwrap_or_default();
                let mut missing = BTreeSet::new();
                for id in &to_enable {
                    let lacking: Vec<DataField> = data_requirements(id)
                        .iter()
                        .copied()
                        .filter(|field| !available.contains(field))
                        .collect();
                    if lacking.is_empty() {
                        continue;
                    }
                    let names: Vec<String> = lacking.iter().map(|f| f.to_string()).collect();
                    report
                        .issues
                        .push(format!("'{id}' needs {}", names.join(", ")));
                    missing.extend(lacking);
                }
                report.missing_fields = missing.into_iter().collect();
                report.compatible = report.missing_fields.is_empty();
            }
        }
        report
    }

    /// Feasibility preview of a switch. Never changes state.
    pub async fn validate_level_switch(&self, from: CertaintyLevel, to: CertaintyLevel) -> SwitchValidation {
        let (to_enable, to_disable) = self.plugin_delta(from, to);
        let mut warnings = Vec::new();
        let mut hints = Vec::new();

        let target = self.get_config(to);
        let registered_count = {
            let container = self.container.read().await;
            let mut count = 0;
            for id in &target.enabled_plugins {
                if container.contains(id) {
                    count += 1;
                } else {
                    warnings.push(format!("plugin '{id}' enabled at {to} is not registered"));
                }
            }
            count
        };

        match SwitchDirection::between(from, to) {
            SwitchDirection::Upgrade => {
                for id in &to_enable {
                    let fields = data_requirements(id);
                    if !fields.is_empty() {
                        let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
                        hints.push(format!("'{id}' requires {}", names.join(", ")));
                    }
                }
            }
            SwitchDirection::Downgrade => {
                warnings.push(format!(
                    "switching from {from} to {to} lowers analysis precision; {} plugin(s) will be disabled",
                    to_disable.len()
                ));
            }
            SwitchDirection::Same => {}
        }

        SwitchValidation {
            from,
            to,
            valid: registered_count > 0,
            warnings,
            hints,
            to_enable,
            to_disable,
        }
    }

    /// Switch to `target`, (de)activating the plugins that differ.
    ///
    /// Refused with `DATA_INCOMPATIBLE` when an upgrade lacks required data.
    /// Per-plugin (de)activation failures are logged and reported in the
    /// outcome. Failing to order the affected plugins rolls the switch back.
    pub async fn switch_level(
        &mut self,
        target: CertaintyLevel,
        context: Option<&NamingInput>,
    ) -> Result<SwitchOutcome, CertaintyError> {
        let from = self.current;
        if from == target {
            return Ok(SwitchOutcome::unchanged(target));
        }

        let compatibility = self.check_data_compatibility(from, target, context);
        if !compatibility.compatible {
            log::warn!(
                "Refusing switch {} -> {}: missing {:?}",
                from,
                target,
                compatibility.missing_fields
            );
            self.record(from, target, false, Some(DATA_INCOMPATIBLE.to_string()));
            return Err(CertaintyError::DataIncompatible {
                from,
                to: target,
                missing_fields: compatibility.missing_fields,
            });
        }

        let (to_enable, to_disable) = self.plugin_delta(from, target);
        match self.apply_switch(&to_enable, &to_disable).await {
            Ok(plugin_failures) => {
                self.current = target;
                self.record(from, target, true, None);
                log::info!(
                    "Switched certainty level {} -> {} (+{} / -{} plugins)",
                    from,
                    target,
                    to_enable.len(),
                    to_disable.len()
                );
                Ok(SwitchOutcome {
                    from,
                    to: target,
                    changed: true,
                    enabled: to_enable,
                    disabled: to_disable,
                    plugin_failures,
                    issues: compatibility.issues,
                    adaptations: compatibility.adaptations,
                })
            }
            Err(message) => {
                log::error!("Switch {} -> {} failed, rolling back: {}", from, target, message);
                self.rollback_switch(from).await;
                self.record(from, target, false, Some(message.clone()));
                Err(CertaintyError::SwitchFailed {
                    from,
                    to: target,
                    message,
                })
            }
        }
    }

    /// Deactivate `to_disable` dependents-first, then activate `to_enable`
    /// dependencies-first. Returns per-plugin failures.
    async fn apply_switch(&self, to_enable: &[String], to_disable: &[String]) -> Result<Vec<String>, String> {
        let mut container = self.container.write().await;
        let registered = |ids: &[String]| -> Vec<String> {
            ids.iter().filter(|id| container.contains(id)).cloned().collect()
        };
        let disable_ids = registered(to_disable);
        let enable_ids = registered(to_enable);

        let mut disable_order = container
            .execution_order(&disable_ids)
            .map_err(|e| e.to_string())?;
        disable_order.reverse();
        let enable_order = container
            .execution_order(&enable_ids)
            .map_err(|e| e.to_string())?;

        let mut failures = Vec::new();
        for id in &disable_order {
            if let Err(e) = container.deactivate_plugin(id) {
                log::warn!("Could not deactivate '{}' during level switch: {}", id, e);
                failures.push(format!("{id}: {e}"));
            }
        }
        for id in &enable_order {
            if let Err(e) = container.activate_plugin(id).await {
                log::warn!("Could not activate '{}' during level switch: {}", id, e);
                failures.push(format!("{id}: {e}"));
            }
        }
        Ok(failures)
    }

    /// Re-activate every plugin of `original` and restore it as the current level.
    pub async fn rollback_switch(&mut self, original: CertaintyLevel) {
        let config = self.get_config(original);
        {
            let mut container = self.container.write().await;
            let ids: Vec<String> = config
                .enabled_plugins
                .iter()
                .filter(|id| container.contains(id))
                .cloned()
                .collect();
            let order = container.execution_order(&ids).unwrap_or(ids);
            for id in &order {
                if let Err(e) = container.activate_plugin(id).await {
                    log::warn!("Rollback could not re-activate '{}': {}", id, e);
                }
            }
        }
        self.current = original;
        log::info!("Certainty level restored to {}", original);
    }

    fn record(&mut self, from: CertaintyLevel, to: CertaintyLevel, success: bool, reason: Option<String>) {
        if self.history.len() == MAX_SWITCH_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(LevelSwitchRecord {
            from,
            to,
            at: Utc::now(),
            success,
            reason,
        });
    }
}
