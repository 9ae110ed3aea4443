//! Reference catalogue of the naming analysis units.
//!
//! Descriptors only; the simulator turns them into runnable plugins. Listed
//! in an order where every required dependency precedes its dependents, so
//! the list can be registered as is.
use qiming_core::certainty::config::plugin_ids::*;
use qiming_core::plugin_system::descriptor::{Layer, PluginDescriptor, PluginMetadata};
use qiming_core::plugin_system::manifest::PluginManifest;

const VERSION: &str = "1.0.0";

fn unit(id: &str, layer: Layer, category: &str, description: &str) -> PluginDescriptor {
    PluginDescriptor::new(id, VERSION, layer).with_metadata(PluginMetadata {
        category: Some(category.to_string()),
        tags: Vec::new(),
        description: Some(description.to_string()),
    })
}

pub fn reference_catalog() -> PluginManifest {
    PluginManifest::new(vec![
        unit(SURNAME, Layer::BASIC_INFO, "input", "Family name analysis"),
        unit(GENDER, Layer::BASIC_INFO, "input", "Gender preferences"),
        unit(BIRTH_TIME, Layer::BASIC_INFO, "input", "Birth time normalization"),
        unit(ZODIAC, Layer::TIME_ANALYSIS, "time", "Zodiac sign of the birth year"),
        unit(BAZI, Layer::TIME_ANALYSIS, "time", "Four pillars of the birth moment").requires(BIRTH_TIME),
        unit(XIYONGSHEN, Layer::TIME_ANALYSIS, "time", "Favorable elements from the four pillars").requires(BAZI),
        unit(WUXING_BALANCE, Layer::TIME_ANALYSIS, "time", "Five-element balance")
            .optionally_uses(BAZI)
            .optionally_uses(XIYONGSHEN),
        unit(STROKE, Layer::CHARACTER_ANALYSIS, "character", "Kangxi stroke counts").requires(SURNAME),
        unit(SANCAI_WUGE, Layer::CHARACTER_ANALYSIS, "character", "Three talents and five grids").requires(STROKE),
        unit(PHONETIC, Layer::CHARACTER_ANALYSIS, "character", "Tone and rhyme harmony").requires(SURNAME),
        unit(MEANING, Layer::CHARACTER_ANALYSIS, "character", "Character meaning").non_critical(),
        unit(CHARACTER_FILTER, Layer::CHARACTER_ANALYSIS, "character", "Candidate character filter")
            .optionally_uses(WUXING_BALANCE)
            .optionally_uses(GENDER),
        unit(FAMILY_TRADITION, Layer::GENERATION, "generation", "Generation names and family rules")
            .requires(SURNAME)
            .non_critical(),
        unit(NAME_GENERATION, Layer::GENERATION, "generation", "Candidate name generation")
            .requires(CHARACTER_FILTER)
            .optionally_uses(FAMILY_TRADITION),
        unit(CULTURAL_CHECK, Layer::GENERATION, "generation", "Cultural taboo check")
            .requires(NAME_GENERATION)
            .optionally_uses(ZODIAC)
            .non_critical(),
        unit(SCORING, Layer::SCORING, "scoring", "Weighted candidate scoring")
            .requires(NAME_GENERATION)
            .optionally_uses(SANCAI_WUGE)
            .optionally_uses(PHONETIC)
            .optionally_uses(MEANING),
        unit(RANKING, Layer::SCORING, "scoring", "Final candidate ranking").requires(SCORING),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use qiming_core::certainty::{CertaintyLevel, LevelConfig};

    #[test]
    fn test_catalog_is_valid_and_complete() {
        let catalog = reference_catalog();
        assert_eq!(catalog.len(), 17);
        assert!(catalog.validate().is_ok());

        let full = LevelConfig::default_for(CertaintyLevel::FullyDetermined);
        for id in &full.enabled_plugins {
            assert!(catalog.get(id).is_some(), "{id} missing from catalogue");
        }
    }

    #[test]
    fn test_required_dependencies_are_enabled_together() {
        let catalog = reference_catalog();
        for level in CertaintyLevel::all() {
            let config = LevelConfig::default_for(level);
            for id in &config.enabled_plugins {
                let descriptor = catalog.get(id).unwrap();
                for dep in descriptor.required_dependencies() {
                    assert!(config.enables(dep), "{id} needs {dep} at {level}");
                }
            }
        }
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let ids = reference_catalog().ids();
        for (position, descriptor) in reference_catalog().plugins.iter().enumerate() {
            for dep in descriptor.required_dependencies() {
                let dep_position = ids.iter().position(|id| id == dep).unwrap();
                assert!(dep_position < position);
            }
        }
    }
}
