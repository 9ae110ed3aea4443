#![cfg(test)]

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::certainty::config::plugin_ids::{BAZI, GENDER, STROKE, SURNAME, ZODIAC};
use crate::certainty::CertaintyLevel;
use crate::config::{ContainerConfig, EngineConfig, LevelConfigOverride, PluginConfig};
use crate::kernel::bootstrap::Engine;
use crate::kernel::error::{Error, ErrorKind, KernelLifecyclePhase};
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::context::{ProcessContext, StandardInput};
use crate::pipeline::request::NamingRequest;
use crate::plugin_system::descriptor::Layer;
use crate::plugin_system::lifecycle::PluginStatus;
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError, PluginOutput, ValidationReport};
use crate::test_support::{MockPlugin, full_input, identity_input};

/// Stroke counts keyed by character
struct StrokeTable(BTreeMap<char, u32>);

/// Counts the strokes of the family name through the shared table
struct StrokeCounter;

#[async_trait]
impl Plugin for StrokeCounter {
    fn id(&self) -> &str {
        STROKE
    }

    fn version(&self) -> &str {
        "2.1.0"
    }

    fn layer(&self) -> Layer {
        Layer::CHARACTER_ANALYSIS
    }

    async fn initialize(&self, _config: &PluginConfig, context: &PluginContext) -> Result<(), PluginError> {
        if context.services.contains::<StrokeTable>() {
            Ok(())
        } else {
            Err(PluginError::Init("stroke table missing".to_string()))
        }
    }

    fn validate(&self, input: &StandardInput) -> ValidationReport {
        if input.input.has_family_name() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(["family name required"])
        }
    }

    async fn process(&self, input: &StandardInput, context: &ProcessContext) -> Result<PluginOutput, PluginError> {
        let table = context
            .services
            .get::<StrokeTable>()
            .ok_or_else(|| PluginError::Execution("stroke table missing".to_string()))?;
        let name = input.input.family_name.clone().unwrap_or_default();
        let strokes: u32 = name.chars().filter_map(|c| table.0.get(&c)).sum();
        Ok(PluginOutput::success(json!({ "strokes": strokes }), 1.0))
    }
}

fn strokes() -> ServiceRegistry {
    let table = StrokeTable([('L', 2), ('i', 1)].into_iter().collect());
    ServiceRegistry::new().with(Arc::new(table))
}

#[tokio::test]
async fn test_engine_lifecycle() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let surname = MockPlugin::new(SURNAME, 1).shared();
    engine.register_plugin(surname.clone()).await.unwrap();
    engine.register_plugin(MockPlugin::new(GENDER, 1).shared()).await.unwrap();
    assert!(!engine.is_started());

    let report = engine.start().await.unwrap();
    assert_eq!(report.initialized, vec![SURNAME.to_string(), GENDER.to_string()]);
    assert!(engine.is_started());
    assert!(!engine.is_monitoring_health());

    let response = engine
        .run(NamingRequest::new(identity_input()).with_request_id("lifecycle"))
        .await;
    assert!(response.success, "{:?}", response.errors);
    assert_eq!(response.request_id, "lifecycle");
    assert!(response.executed(SURNAME) && response.executed(GENDER));

    engine.shutdown().await.unwrap();
    assert!(!engine.is_started());
    assert_eq!(engine.container().read().await.status(SURNAME), Some(PluginStatus::Destroyed));
    assert_eq!(surname.cleanup_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_double_start_is_refused() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.start().await.unwrap();
    match engine.start().await {
        Err(Error::KernelLifecycleError { phase, source, .. }) => {
            assert_eq!(phase, KernelLifecyclePhase::Start);
            assert!(source.is_none());
        }
        other => panic!("expected lifecycle error, got {other:?}"),
    }
}

#[test]
fn test_invalid_config_fails_bootstrap() {
    let mut config = EngineConfig::default();
    config.pipeline.max_timeout_ms = 0;
    let err = Engine::new(config).err().unwrap();
    assert!(matches!(
        err,
        Error::KernelLifecycleError { phase: KernelLifecyclePhase::Bootstrap, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_level_overrides_are_applied() {
    let mut config = EngineConfig {
        initial_level: CertaintyLevel::Estimated,
        ..EngineConfig::default()
    };
    config.levels.insert(
        CertaintyLevel::Unknown,
        LevelConfigOverride {
            enabled_plugins: Some(vec![SURNAME.to_string()]),
            ..LevelConfigOverride::default()
        },
    );
    let engine = Engine::new(config).unwrap();
    let levels = engine.levels();
    let manager = levels.try_read().unwrap();
    assert_eq!(manager.current_level(), CertaintyLevel::Estimated);
    assert_eq!(manager.get_config(CertaintyLevel::Unknown).enabled_plugins, vec![SURNAME]);
}

#[tokio::test]
async fn test_plugin_config_comes_from_engine_config() {
    let mut config = EngineConfig::default();
    config
        .plugins
        .insert(ZODIAC.to_string(), PluginConfig::disabled());
    let mut engine = Engine::new(config).unwrap();
    engine.register_plugin(MockPlugin::new(ZODIAC, 2).shared()).await.unwrap();

    let report = engine.start().await.unwrap();
    assert_eq!(report.disabled, vec![ZODIAC.to_string()]);
    assert_eq!(engine.container().read().await.status(ZODIAC), Some(PluginStatus::Registered));
}

#[tokio::test]
async fn test_services_reach_plugins() {
    let mut engine = Engine::with_services(EngineConfig::default(), strokes()).unwrap();
    engine.register_plugin(Arc::new(StrokeCounter)).await.unwrap();
    assert!(engine.start().await.unwrap().is_complete());
    assert!(engine.services().contains::<StrokeTable>());

    let response = engine
        .run(NamingRequest::new(identity_input()).at_level(CertaintyLevel::Unknown))
        .await;
    assert!(response.success, "{:?}", response.errors);
    assert_eq!(response.result(STROKE).unwrap().data["strokes"], 3);
}

#[tokio::test]
async fn test_missing_service_fails_initialization() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register_plugin(Arc::new(StrokeCounter)).await.unwrap();

    let report = engine.start().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].message.contains("stroke table missing"));
    assert_eq!(engine.container().read().await.status(STROKE), Some(PluginStatus::Error));
}

#[tokio::test]
async fn test_switch_level_through_engine() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register_plugin(MockPlugin::new(SURNAME, 1).shared()).await.unwrap();
    engine.register_plugin(MockPlugin::new(BAZI, 2).shared()).await.unwrap();
    engine.start().await.unwrap();
    assert_eq!(engine.current_level().await, CertaintyLevel::Unknown);

    let err = engine
        .switch_level(CertaintyLevel::FullyDetermined, Some(&identity_input()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(engine.current_level().await, CertaintyLevel::Unknown);

    let outcome = engine
        .switch_level(CertaintyLevel::FullyDetermined, Some(&full_input()))
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(engine.current_level().await, CertaintyLevel::FullyDetermined);

    let selection = engine.select_level(&full_input());
    assert_eq!(selection.level, CertaintyLevel::FullyDetermined);
}

#[tokio::test]
async fn test_plan_and_unregister() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register_plugin(MockPlugin::new(SURNAME, 1).shared()).await.unwrap();
    engine.start().await.unwrap();

    let plan = engine
        .plan(&NamingRequest::new(identity_input()))
        .await
        .unwrap();
    assert_eq!(plan.order, vec![SURNAME]);

    engine.unregister_plugin(SURNAME).await.unwrap();
    let err = engine.plan(&NamingRequest::new(identity_input())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PluginNotFound);
    assert!(engine.unregister_plugin(SURNAME).await.is_err());
}

#[tokio::test]
async fn test_health_monitoring_follows_config() {
    let config = EngineConfig {
        container: ContainerConfig {
            health_checks_enabled: true,
            ..ContainerConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config).unwrap();
    engine
        .register_plugin(MockPlugin::new(SURNAME, 1).unhealthy().shared())
        .await
        .unwrap();
    engine.start().await.unwrap();
    assert!(engine.is_monitoring_health());

    let reports = engine.check_health().await;
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].healthy);

    engine.shutdown().await.unwrap();
    assert!(!engine.is_monitoring_health());
}

#[test]
fn test_engine_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"{ "initial_level": "partially_determined" }"#).unwrap();

    let engine = Engine::from_config_file(file.path()).unwrap();
    assert_eq!(engine.config().initial_level, CertaintyLevel::PartiallyDetermined);

    let err = Engine::from_config_file(std::path::Path::new("/nonexistent/engine.toml"))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
}
