#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::certainty::config::plugin_ids::{BAZI, SURNAME, XIYONGSHEN, ZODIAC};
use crate::certainty::error::{CertaintyError, DATA_INCOMPATIBLE};
use crate::certainty::manager::{CertaintyLevelManager, SwitchDirection};
use crate::certainty::CertaintyLevel;
use crate::config::LevelConfigOverride;
use crate::kernel::constants::MAX_SWITCH_HISTORY;
use crate::pipeline::request::DataField;
use crate::plugin_system::container::SharedContainer;
use crate::plugin_system::lifecycle::PluginStatus;
use crate::test_support::{MockPlugin, full_input, identity_input, populated_container, shared_container};

async fn time_analysis_container() -> SharedContainer {
    populated_container(vec![
        MockPlugin::new(SURNAME, 1).shared(),
        MockPlugin::new(ZODIAC, 2).shared(),
        MockPlugin::new(BAZI, 2).shared(),
        MockPlugin::new(XIYONGSHEN, 2).requires(BAZI).shared(),
    ])
    .await
}

fn manager(container: &SharedContainer, level: CertaintyLevel) -> CertaintyLevelManager {
    CertaintyLevelManager::new(Arc::clone(container), level)
}

#[test]
fn test_upgrade_without_birth_data_is_incompatible() {
    let manager = manager(&shared_container(), CertaintyLevel::Unknown);
    let report = manager.check_data_compatibility(
        CertaintyLevel::Unknown,
        CertaintyLevel::FullyDetermined,
        Some(&identity_input()),
    );
    assert!(!report.compatible);
    assert_eq!(report.direction, SwitchDirection::Upgrade);
    assert_eq!(
        report.missing_fields,
        vec![
            DataField::BirthYear,
            DataField::BirthMonth,
            DataField::BirthDay,
            DataField::BirthHour
        ]
    );

    let with_data = manager.check_data_compatibility(
        CertaintyLevel::Unknown,
        CertaintyLevel::FullyDetermined,
        Some(&full_input()),
    );
    assert!(with_data.compatible);
    assert!(with_data.issues.is_empty());
}

#[test]
fn test_missing_context_counts_as_no_data() {
    let manager = manager(&shared_container(), CertaintyLevel::Unknown);
    let report = manager.check_data_compatibility(CertaintyLevel::Unknown, CertaintyLevel::Estimated, None);
    assert!(!report.compatible);
    assert_eq!(report.missing_fields, vec![DataField::BirthYear]);
}

#[test]
fn test_downgrade_is_always_compatible() {
    let manager = manager(&shared_container(), CertaintyLevel::FullyDetermined);
    let report = manager.check_data_compatibility(CertaintyLevel::FullyDetermined, CertaintyLevel::Unknown, None);
    assert!(report.compatible);
    assert_eq!(report.direction, SwitchDirection::Downgrade);
    assert_eq!(report.issues.len(), 3);
    assert_eq!(report.adaptations.len(), 1);

    let same = manager.check_data_compatibility(CertaintyLevel::Estimated, CertaintyLevel::Estimated, None);
    assert!(same.compatible);
    assert_eq!(same.direction, SwitchDirection::Same);
}

#[tokio::test]
async fn test_validate_switch_is_read_only() {
    let container = time_analysis_container().await;
    let manager = manager(&container, CertaintyLevel::Unknown);

    let preview = manager
        .validate_level_switch(CertaintyLevel::Unknown, CertaintyLevel::FullyDetermined)
        .await;
    assert!(preview.valid);
    assert!(preview.to_enable.contains(&BAZI.to_string()));
    assert!(preview.to_disable.is_empty());
    assert!(preview.hints.iter().any(|h| h.contains(BAZI)));
    assert!(preview.warnings.iter().any(|w| w.contains("ranking")));
    assert_eq!(manager.current_level(), CertaintyLevel::Unknown);
    assert!(manager.history().is_empty());
}

#[tokio::test]
async fn test_validate_switch_without_registered_plugins() {
    let manager = manager(&shared_container(), CertaintyLevel::Unknown);
    let preview = manager
        .validate_level_switch(CertaintyLevel::Unknown, CertaintyLevel::Estimated)
        .await;
    assert!(!preview.valid);
}

#[tokio::test]
async fn test_downgrade_deactivates_dropped_plugins() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);

    let outcome = manager.switch_level(CertaintyLevel::Unknown, None).await.unwrap();
    assert!(outcome.changed);
    assert!(outcome.disabled.contains(&ZODIAC.to_string()));
    assert!(outcome.plugin_failures.is_empty());
    assert_eq!(manager.current_level(), CertaintyLevel::Unknown);
    assert_eq!(container.read().await.status(ZODIAC), Some(PluginStatus::Inactive));
    assert_eq!(container.read().await.status(SURNAME), Some(PluginStatus::Active));

    let history = manager.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
}

#[tokio::test]
async fn test_upgrade_activates_new_plugins() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);
    manager.switch_level(CertaintyLevel::Unknown, None).await.unwrap();

    let outcome = manager
        .switch_level(CertaintyLevel::FullyDetermined, Some(&full_input()))
        .await
        .unwrap();
    assert_eq!(outcome.from, CertaintyLevel::Unknown);
    assert!(outcome.enabled.contains(&XIYONGSHEN.to_string()));
    assert_eq!(container.read().await.status(ZODIAC), Some(PluginStatus::Active));
    assert_eq!(manager.current_level(), CertaintyLevel::FullyDetermined);
}

#[tokio::test]
async fn test_upgrade_refused_without_data() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Unknown);

    let err = manager
        .switch_level(CertaintyLevel::PartiallyDetermined, Some(&identity_input()))
        .await
        .unwrap_err();
    assert!(matches!(err, CertaintyError::DataIncompatible { .. }));
    assert_eq!(err.reason_code(), Some(DATA_INCOMPATIBLE));
    assert_eq!(manager.current_level(), CertaintyLevel::Unknown);

    let record = &manager.history()[0];
    assert!(!record.success);
    assert_eq!(record.reason.as_deref(), Some(DATA_INCOMPATIBLE));
}

#[tokio::test]
async fn test_switch_history_keeps_latest_attempts() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);

    for _ in 0..MAX_SWITCH_HISTORY + 3 {
        assert!(
            manager
                .switch_level(CertaintyLevel::PartiallyDetermined, Some(&identity_input()))
                .await
                .is_err()
        );
    }
    manager.switch_level(CertaintyLevel::Unknown, None).await.unwrap();

    let history = manager.history();
    assert_eq!(history.len(), MAX_SWITCH_HISTORY);
    let latest = history.back().unwrap();
    assert!(latest.success);
    assert_eq!(latest.to, CertaintyLevel::Unknown);
    assert_eq!(history.iter().filter(|r| !r.success).count(), MAX_SWITCH_HISTORY - 1);
}

#[tokio::test]
async fn test_switch_to_current_level_is_a_no_op() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);
    let outcome = manager.switch_level(CertaintyLevel::Estimated, None).await.unwrap();
    assert!(!outcome.changed);
    assert!(manager.history().is_empty());
}

#[tokio::test]
async fn test_plugin_failures_do_not_abort_the_switch() {
    // stroke stays enabled at Unknown but requires zodiac, which does not
    let container = populated_container(vec![
        MockPlugin::new(ZODIAC, 2).shared(),
        MockPlugin::new("stroke", 3).requires(ZODIAC).shared(),
    ])
    .await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);

    let outcome = manager.switch_level(CertaintyLevel::Unknown, None).await.unwrap();
    assert_eq!(outcome.plugin_failures.len(), 1);
    assert!(outcome.plugin_failures[0].starts_with(ZODIAC));
    assert_eq!(manager.current_level(), CertaintyLevel::Unknown);
    assert_eq!(container.read().await.status(ZODIAC), Some(PluginStatus::Active));
}

#[tokio::test]
async fn test_rollback_restores_original_level() {
    let container = time_analysis_container().await;
    let mut manager = manager(&container, CertaintyLevel::Estimated);
    manager.switch_level(CertaintyLevel::Unknown, None).await.unwrap();

    manager.rollback_switch(CertaintyLevel::Estimated).await;
    assert_eq!(manager.current_level(), CertaintyLevel::Estimated);
    assert_eq!(container.read().await.status(ZODIAC), Some(PluginStatus::Active));
}

#[tokio::test]
async fn test_overrides_are_validated() {
    let mut manager = manager(&shared_container(), CertaintyLevel::Unknown);

    let mut overrides = BTreeMap::new();
    overrides.insert(
        CertaintyLevel::Estimated,
        LevelConfigOverride {
            confidence_threshold: Some(0.5),
            ..LevelConfigOverride::default()
        },
    );
    manager.apply_overrides(&overrides).unwrap();
    assert_eq!(manager.get_config(CertaintyLevel::Estimated).confidence_threshold, 0.5);

    overrides.insert(
        CertaintyLevel::Unknown,
        LevelConfigOverride {
            enabled_plugins: Some(Vec::new()),
            ..LevelConfigOverride::default()
        },
    );
    let err = manager.apply_overrides(&overrides).unwrap_err();
    assert!(matches!(err, CertaintyError::ConfigInvalid { level: CertaintyLevel::Unknown, .. }));
    assert!(!manager.get_config(CertaintyLevel::Unknown).enabled_plugins.is_empty());
}

#[tokio::test]
async fn test_config_copies_are_isolated() {
    let mut manager = manager(&shared_container(), CertaintyLevel::Unknown);
    let before = manager.get_config(CertaintyLevel::Unknown);

    let mut changed = before.clone();
    changed.timeout_ms = 1_000;
    manager.update_config(CertaintyLevel::Unknown, changed).unwrap();

    assert_eq!(before.timeout_ms, 15_000);
    assert_eq!(manager.get_config(CertaintyLevel::Unknown).timeout_ms, 1_000);
}
