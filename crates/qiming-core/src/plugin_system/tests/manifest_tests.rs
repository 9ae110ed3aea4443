#![cfg(test)]

use std::io::Write;

use tempfile::Builder;

use crate::config::{ConfigError, ConfigFormat};
use crate::kernel::error::ErrorKind;
use crate::plugin_system::descriptor::Layer;
use crate::plugin_system::manifest::PluginManifest;

const MANIFEST_JSON: &str = r#"{
    "plugins": [
        { "id": "surname", "version": "1.0.0", "layer": 1 },
        { "id": "stroke", "version": "1.2.0", "layer": 3,
          "dependencies": [{ "id": "surname" }, { "id": "zodiac", "required": false, "version_range": "^1" }],
          "critical": false,
          "metadata": { "category": "character", "tags": ["kangxi"] } }
    ]
}"#;

#[test]
fn test_parse_json_manifest() {
    let manifest = PluginManifest::parse(MANIFEST_JSON, ConfigFormat::Json).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.ids(), vec!["surname", "stroke"]);

    let stroke = manifest.get("stroke").unwrap();
    assert_eq!(stroke.layer, Layer::CHARACTER_ANALYSIS);
    assert!(stroke.is_optional());
    assert_eq!(stroke.required_dependencies().collect::<Vec<_>>(), vec!["surname"]);
    let zodiac = &stroke.dependencies[1];
    assert!(!zodiac.required);
    assert!(zodiac.is_compatible_with("1.3.0"));
    assert!(!zodiac.is_compatible_with("2.0.0"));
    assert_eq!(stroke.metadata.category.as_deref(), Some("character"));

    assert!(manifest.get("surname").unwrap().critical);
}

#[test]
fn test_duplicate_and_invalid_entries_are_collected() {
    let data = r#"{ "plugins": [
        { "id": "a", "version": "1.0.0", "layer": 1 },
        { "id": "a", "version": "x", "layer": 7 }
    ] }"#;
    match PluginManifest::parse(data, ConfigFormat::Json) {
        Err(ConfigError::Invalid(problems)) => assert_eq!(problems.len(), 3),
        other => panic!("expected invalid manifest, got {other:?}"),
    }
}

#[test]
fn test_invalid_version_range_fails_to_parse() {
    let data = r#"{ "plugins": [
        { "id": "a", "version": "1.0.0", "layer": 1, "dependencies": [{ "id": "b", "version_range": "not a range" }] }
    ] }"#;
    let err = PluginManifest::parse(data, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_load_manifest_from_file() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(MANIFEST_JSON.as_bytes()).unwrap();

    let manifest = PluginManifest::from_path(file.path()).unwrap();
    assert_eq!(manifest.len(), 2);
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_load_yaml_manifest() {
    let yaml = "plugins:\n  - id: gender\n    version: 0.3.1\n    layer: 1\n";
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let manifest = PluginManifest::from_path(file.path()).unwrap();
    assert_eq!(manifest.get("gender").unwrap().version, "0.3.1");
}

#[test]
fn test_missing_manifest_file() {
    let err = PluginManifest::from_path(std::path::Path::new("/nonexistent/plugins.json")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
}
