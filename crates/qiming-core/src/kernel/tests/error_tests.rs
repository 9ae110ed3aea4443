#![cfg(test)]

use std::sync::Arc;

use crate::certainty::CertaintyLevel;
use crate::certainty::error::CertaintyError;
use crate::config::ConfigError;
use crate::kernel::error::{Error, ErrorKind, KernelLifecyclePhase, Severity};
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::error::PipelineError;
use crate::pipeline::request::DataField;
use crate::plugin_system::error::PluginSystemError;

#[test]
fn test_subsystem_errors_keep_their_kind() {
    let not_found: Error = PluginSystemError::PluginNotFound {
        plugin_id: "bazi".to_string(),
    }
    .into();
    assert_eq!(not_found.kind(), ErrorKind::PluginNotFound);
    assert_eq!(not_found.to_string(), "Plugin system error: Plugin 'bazi' not found");

    let refused: Error = CertaintyError::DataIncompatible {
        from: CertaintyLevel::Unknown,
        to: CertaintyLevel::Estimated,
        missing_fields: vec![DataField::BirthYear],
    }
    .into();
    assert_eq!(refused.kind(), ErrorKind::ValidationFailed);
    assert!(refused.to_string().contains("DATA_INCOMPATIBLE"));
    assert!(refused.to_string().contains("birth_year"));

    let timeout: Error = PipelineError::PluginTimeout {
        plugin_id: "zodiac".to_string(),
        timeout_ms: 50,
    }
    .into();
    assert_eq!(timeout.kind(), ErrorKind::PluginTimeout);

    let config: Error = ConfigError::Invalid(vec!["bad".to_string()]).into();
    assert_eq!(config.kind(), ErrorKind::ConfigInvalid);

    assert_eq!(Error::from("boom").kind(), ErrorKind::SystemError);
}

#[test]
fn test_lifecycle_error_inherits_source_kind() {
    let cycle = PluginSystemError::CircularDependencyError {
        plugin_id: "a".to_string(),
        cycle: vec!["a".to_string(), "a".to_string()],
    };
    let err = Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Initialize,
        message: "Could not order plugins".to_string(),
        source: Some(Box::new(cycle.into())),
    };
    assert_eq!(err.kind(), ErrorKind::CircularDependency);
    assert_eq!(err.severity(), Severity::Critical);
    assert_eq!(
        err.to_string(),
        "Engine lifecycle error during Initialize: Could not order plugins"
    );
    assert!(std::error::Error::source(&err).is_some());

    let bare = Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Start,
        message: "Engine already started".to_string(),
        source: None,
    };
    assert_eq!(bare.kind(), ErrorKind::SystemError);
}

#[test]
fn test_severity_and_log_level() {
    assert_eq!(ErrorKind::ValidationFailed.severity(), Severity::Low);
    assert_eq!(ErrorKind::PluginTimeout.severity(), Severity::Medium);
    assert_eq!(ErrorKind::DependencyMissing.severity(), Severity::High);
    assert_eq!(ErrorKind::CircularDependency.severity(), Severity::Critical);
    assert!(Severity::Critical > Severity::Low);

    assert_eq!(Severity::Low.log_level(), log::Level::Info);
    assert_eq!(Severity::Medium.log_level(), log::Level::Warn);
    assert_eq!(Severity::High.log_level(), log::Level::Error);
    assert_eq!(Severity::High.to_string(), "high");
}

#[test]
fn test_error_kind_labels() {
    assert_eq!(ErrorKind::DependencyMissing.to_string(), "DEPENDENCY_MISSING");
    assert_eq!(
        serde_json::to_value(ErrorKind::PluginExecutionFailed).unwrap(),
        "PLUGIN_EXECUTION_FAILED"
    );
    let parsed: ErrorKind = serde_json::from_str("\"CONFIG_MISSING\"").unwrap();
    assert_eq!(parsed, ErrorKind::ConfigMissing);
}

#[derive(Debug, PartialEq)]
struct WuxingTable {
    elements: usize,
}

#[test]
fn test_service_registry() {
    let mut registry = ServiceRegistry::new();
    assert!(registry.is_empty());

    registry.insert(Arc::new(WuxingTable { elements: 5 }));
    assert!(registry.contains::<WuxingTable>());
    assert_eq!(registry.get::<WuxingTable>().unwrap().elements, 5);
    assert!(registry.get::<String>().is_none());

    registry.insert(Arc::new(WuxingTable { elements: 4 }));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get::<WuxingTable>().unwrap().elements, 4);
    assert!(format!("{registry:?}").contains("WuxingTable"));

    let removed = registry.remove::<WuxingTable>().unwrap();
    assert_eq!(*removed, WuxingTable { elements: 4 });
    assert!(registry.is_empty());
    assert!(registry.remove::<WuxingTable>().is_none());
}
