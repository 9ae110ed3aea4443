use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::certainty::CertaintyLevel;
use crate::certainty::error::CertaintyError;
use crate::config::LevelConfigOverride;
use crate::pipeline::request::DataField;

/// Ids of the reference analysis plugins the default level configs refer to.
pub mod plugin_ids {
    pub const SURNAME: &str = "surname";
    pub const GENDER: &str = "gender";
    pub const BIRTH_TIME: &str = "birth-time";
    pub const BAZI: &str = "bazi";
    pub const ZODIAC: &str = "zodiac";
    pub const XIYONGSHEN: &str = "xiyongshen";
    pub const WUXING_BALANCE: &str = "wuxing-balance";
    pub const STROKE: &str = "stroke";
    pub const SANCAI_WUGE: &str = "sancai-wuge";
    pub const PHONETIC: &str = "phonetic";
    pub const MEANING: &str = "meaning";
    pub const CHARACTER_FILTER: &str = "character-filter";
    pub const FAMILY_TRADITION: &str = "family-tradition";
    pub const NAME_GENERATION: &str = "name-generation";
    pub const CULTURAL_CHECK: &str = "cultural-check";
    pub const SCORING: &str = "scoring";
    pub const RANKING: &str = "ranking";
}

use plugin_ids::*;

/// Plugins whose loss on a downgrade is worth reporting
pub const HIGH_VALUE_PLUGINS: &[&str] = &[BAZI, XIYONGSHEN, BIRTH_TIME];

/// Input fields a plugin cannot work without
pub fn data_requirements(plugin_id: &str) -> &'static [DataField] {
    match plugin_id {
        BIRTH_TIME | BAZI => &[DataField::BirthYear, DataField::BirthMonth, DataField::BirthDay],
        XIYONGSHEN => &[DataField::BirthHour],
        ZODIAC => &[DataField::BirthYear],
        FAMILY_TRADITION => &[DataField::FamilyName],
        _ => &[],
    }
}

/// Analysis strategy tag attached to a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStrategy {
    /// Full numerological analysis on exact data
    Precise,
    /// Standard analysis tolerating a missing birth hour
    Standard,
    /// Probability-weighted analysis over estimated data
    Probabilistic,
    /// Generic five-element balancing without birth data
    Balanced,
}

impl fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisStrategy::Precise => "precise",
            AnalysisStrategy::Standard => "standard",
            AnalysisStrategy::Probabilistic => "probabilistic",
            AnalysisStrategy::Balanced => "balanced",
        };
        f.write_str(label)
    }
}

/// Execution configuration of one certainty level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Plugin ids enabled at this level, in preference order
    pub enabled_plugins: Vec<String>,
    pub strategy: AnalysisStrategy,
    /// Outputs below this confidence are kept but flagged with a warning
    pub confidence_threshold: f64,
    pub fallback_strategy: AnalysisStrategy,
    /// Per-plugin timeout for runs at this level
    pub timeout_ms: u64,
    pub parallel_execution: bool,
    pub skip_optional_failures: bool,
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|id| id.to_string()).collect()
}

const UNKNOWN_PLUGINS: &[&str] = &[
    SURNAME,
    GENDER,
    WUXING_BALANCE,
    STROKE,
    SANCAI_WUGE,
    PHONETIC,
    MEANING,
    CHARACTER_FILTER,
    NAME_GENERATION,
    SCORING,
];
const ESTIMATED_EXTRA: &[&str] = &[ZODIAC, CULTURAL_CHECK];
const PARTIAL_EXTRA: &[&str] = &[BIRTH_TIME, BAZI];
const FULL_EXTRA: &[&str] = &[XIYONGSHEN, FAMILY_TRADITION, RANKING];

impl LevelConfig {
    /// Reference defaults. Each level enables a superset of the level below.
    pub fn default_for(level: CertaintyLevel) -> Self {
        let mut enabled = ids(UNKNOWN_PLUGINS);
        if level.rank() >= CertaintyLevel::Estimated.rank() {
            enabled.extend(ids(ESTIMATED_EXTRA));
        }
        if level.rank() >= CertaintyLevel::PartiallyDetermined.rank() {
            enabled.extend(ids(PARTIAL_EXTRA));
        }
        if level.rank() >= CertaintyLevel::FullyDetermined.rank() {
            enabled.extend(ids(FULL_EXTRA));
        }

        let (strategy, confidence_threshold, fallback_strategy, timeout_ms, parallel_execution) = match level {
            CertaintyLevel::FullyDetermined => (AnalysisStrategy::Precise, 0.85, AnalysisStrategy::Standard, 30_000, true),
            CertaintyLevel::PartiallyDetermined => {
                (AnalysisStrategy::Standard, 0.7, AnalysisStrategy::Balanced, 25_000, true)
            }
            CertaintyLevel::Estimated => (AnalysisStrategy::Probabilistic, 0.55, AnalysisStrategy::Balanced, 20_000, true),
            CertaintyLevel::Unknown => (AnalysisStrategy::Balanced, 0.4, AnalysisStrategy::Balanced, 15_000, false),
        };

        Self {
            enabled_plugins: enabled,
            strategy,
            confidence_threshold,
            fallback_strategy,
            timeout_ms,
            parallel_execution,
            skip_optional_failures: true,
        }
    }

    pub fn enables(&self, plugin_id: &str) -> bool {
        self.enabled_plugins.iter().any(|id| id == plugin_id)
    }

    /// Apply the fields set in `overrides`
    pub fn apply(&mut self, overrides: &LevelConfigOverride) {
        if let Some(enabled) = &overrides.enabled_plugins {
            self.enabled_plugins = enabled.clone();
        }
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(threshold) = overrides.confidence_threshold {
            self.confidence_threshold = threshold;
        }
        if let Some(fallback) = overrides.fallback_strategy {
            self.fallback_strategy = fallback;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(parallel) = overrides.parallel_execution {
            self.parallel_execution = parallel;
        }
        if let Some(skip) = overrides.skip_optional_failures {
            self.skip_optional_failures = skip;
        }
    }

    pub fn validate(&self, level: CertaintyLevel) -> Result<(), CertaintyError> {
        let mut reasons = Vec::new();
        if self.enabled_plugins.is_empty() {
            reasons.push("enabled_plugins must not be empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.enabled_plugins {
            if !seen.insert(id.as_str()) {
                reasons.push(format!("plugin '{id}' is listed more than once"));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            reasons.push(format!(
                "confidence_threshold {} is outside [0, 1]",
                self.confidence_threshold
            ));
        }
        if self.timeout_ms == 0 {
            reasons.push("timeout_ms must be greater than zero".to_string());
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(CertaintyError::ConfigInvalid { level, reasons })
        }
    }
}

/// Default config of every level
pub fn default_level_configs() -> BTreeMap<CertaintyLevel, LevelConfig> {
    CertaintyLevel::all()
        .into_iter()
        .map(|level| (level, LevelConfig::default_for(level)))
        .collect()
}
