#![cfg(test)]

use std::collections::HashSet;
use std::str::FromStr;

use crate::certainty::config::{AnalysisStrategy, LevelConfig, default_level_configs, plugin_ids};
use crate::certainty::error::CertaintyError;
use crate::certainty::CertaintyLevel;
use crate::config::LevelConfigOverride;
use crate::kernel::error::ErrorKind;

#[test]
fn test_parse_level_names() {
    assert_eq!(CertaintyLevel::from_str("fully_determined").unwrap(), CertaintyLevel::FullyDetermined);
    assert_eq!(CertaintyLevel::from_str("Partially-Determined").unwrap(), CertaintyLevel::PartiallyDetermined);
    assert_eq!(CertaintyLevel::from_str(" full ").unwrap(), CertaintyLevel::FullyDetermined);
    assert_eq!(CertaintyLevel::from_str("ESTIMATED").unwrap(), CertaintyLevel::Estimated);
    assert_eq!(CertaintyLevel::default(), CertaintyLevel::Unknown);

    let err = CertaintyLevel::from_str("certain").unwrap_err();
    assert_eq!(err, CertaintyError::UnknownLevel("certain".to_string()));
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[test]
fn test_rank_order() {
    let ranks: Vec<u8> = CertaintyLevel::all().iter().map(|l| l.rank()).collect();
    assert_eq!(ranks, vec![3, 2, 1, 0]);
    assert!(CertaintyLevel::Estimated.is_higher_than(CertaintyLevel::Unknown));
    assert!(!CertaintyLevel::Estimated.is_higher_than(CertaintyLevel::Estimated));
}

#[test]
fn test_level_serde_names() {
    let json = serde_json::to_string(&CertaintyLevel::PartiallyDetermined).unwrap();
    assert_eq!(json, "\"partially_determined\"");
    let level: CertaintyLevel = serde_json::from_str("\"unknown\"").unwrap();
    assert_eq!(level, CertaintyLevel::Unknown);
}

#[test]
fn test_enabled_sets_are_monotone() {
    let configs = default_level_configs();
    let set = |level: CertaintyLevel| -> HashSet<String> { configs[&level].enabled_plugins.iter().cloned().collect() };

    let full = set(CertaintyLevel::FullyDetermined);
    let partial = set(CertaintyLevel::PartiallyDetermined);
    let estimated = set(CertaintyLevel::Estimated);
    let unknown = set(CertaintyLevel::Unknown);

    assert!(full.is_superset(&partial));
    assert!(partial.is_superset(&estimated));
    assert!(estimated.is_superset(&unknown));
    assert_eq!(full.len(), 17);
}

#[test]
fn test_unknown_level_excludes_birth_time_analysis() {
    let unknown = LevelConfig::default_for(CertaintyLevel::Unknown);
    assert!(!unknown.enables(plugin_ids::BAZI));
    assert!(!unknown.enables(plugin_ids::XIYONGSHEN));
    assert!(!unknown.enables(plugin_ids::BIRTH_TIME));
    assert!(unknown.enables(plugin_ids::SURNAME));
    assert_eq!(unknown.strategy, AnalysisStrategy::Balanced);
    assert!(!unknown.parallel_execution);
}

#[test]
fn test_thresholds_descend_with_information() {
    let configs = default_level_configs();
    let thresholds: Vec<f64> = CertaintyLevel::all()
        .iter()
        .map(|l| configs[l].confidence_threshold)
        .collect();
    assert!(thresholds.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(configs[&CertaintyLevel::FullyDetermined].strategy, AnalysisStrategy::Precise);
}

#[test]
fn test_apply_override_keeps_unset_fields() {
    let mut config = LevelConfig::default_for(CertaintyLevel::Estimated);
    let original = config.clone();
    config.apply(&LevelConfigOverride {
        timeout_ms: Some(900),
        parallel_execution: Some(false),
        ..LevelConfigOverride::default()
    });

    assert_eq!(config.timeout_ms, 900);
    assert!(!config.parallel_execution);
    assert_eq!(config.enabled_plugins, original.enabled_plugins);
    assert_eq!(config.strategy, original.strategy);
}

#[test]
fn test_level_config_validation() {
    let mut config = LevelConfig::default_for(CertaintyLevel::Unknown);
    config.enabled_plugins.push(plugin_ids::SURNAME.to_string());
    config.confidence_threshold = 1.5;
    config.timeout_ms = 0;

    match config.validate(CertaintyLevel::Unknown) {
        Err(CertaintyError::ConfigInvalid { level, reasons }) => {
            assert_eq!(level, CertaintyLevel::Unknown);
            assert_eq!(reasons.len(), 3);
        }
        other => panic!("expected invalid config, got {other:?}"),
    }
}
