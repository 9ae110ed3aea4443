#![cfg(test)]

use std::str::FromStr;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::{Layer, PluginDescriptor};
use crate::plugin_system::version::VersionRange;
use crate::test_support::MockPlugin;

#[test]
fn test_descriptor_snapshots_plugin_identity() {
    let plugin = MockPlugin::new("xiyongshen", 2)
        .with_version("2.1.0")
        .requires("bazi")
        .optionally_uses("zodiac")
        .optional();
    let descriptor = PluginDescriptor::from_plugin(&plugin);

    assert_eq!(descriptor.id, "xiyongshen");
    assert_eq!(descriptor.version, "2.1.0");
    assert_eq!(descriptor.layer, Layer::TIME_ANALYSIS);
    assert!(descriptor.is_optional());
    assert_eq!(descriptor.required_dependencies().collect::<Vec<_>>(), vec!["bazi"]);
    assert!(descriptor.validate().is_empty());
}

#[test]
fn test_descriptor_validation_collects_problems() {
    let descriptor = PluginDescriptor::new("", "1.0", Layer::new(0))
        .requires("stroke")
        .optionally_uses("stroke");
    let problems = descriptor.validate();
    assert_eq!(problems.len(), 4, "{problems:?}");
}

#[test]
fn test_layer_names_and_bounds() {
    assert_eq!(Layer::BASIC_INFO.name(), "basic-info");
    assert_eq!(Layer::SCORING.to_string(), "L5 (scoring)");
    assert!(!Layer::new(6).is_known());
    assert_eq!(Layer::all().count(), 5);
    assert!(Layer::TIME_ANALYSIS < Layer::GENERATION);
}

#[test]
fn test_dependency_version_ranges() {
    let range = VersionRange::from_str(">=1.0.0, <2.0.0").unwrap();
    let dep = PluginDependency::required("stroke", range);
    assert!(dep.is_compatible_with("1.9.9"));
    assert!(!dep.is_compatible_with("2.0.0"));
    assert!(!dep.is_compatible_with("garbage"));
    assert_eq!(dep.to_string(), "Requires plugin: stroke (version: >=1.0.0, <2.0.0)");

    let any = PluginDependency::optional_any("zodiac");
    assert!(any.is_compatible_with("garbage"));
    assert_eq!(any.to_string(), "Optional plugin: zodiac (any version)");
}

#[test]
fn test_invalid_constraint() {
    assert!(VersionRange::from_str("one point oh").is_err());
}
