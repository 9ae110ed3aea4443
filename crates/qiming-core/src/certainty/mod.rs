//! # Qiming Core Certainty Levels
//!
//! A certainty level classifies how complete a caller's input is. Each level
//! maps to a [`LevelConfig`]: which plugins run, under which strategy, with
//! which thresholds and timeouts. [`CertaintyLevelManager`] owns those
//! configs and switches between levels at runtime; [`auto_select_level`]
//! picks a level from raw input.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod manager;
pub mod selector;

pub use config::{AnalysisStrategy, LevelConfig, default_level_configs};
pub use error::CertaintyError;
pub use manager::{
    CertaintyLevelManager, CompatibilityReport, LevelSwitchRecord, SharedLevelManager, SwitchDirection, SwitchOutcome,
    SwitchValidation,
};
pub use selector::{LevelSelection, auto_select_level};

#[cfg(test)]
mod tests;

/// Input completeness classification.
///
/// Declared in descending information content, which is also the derived
/// ordering; use [`rank`](Self::rank) to compare information content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertaintyLevel {
    /// Exact birth date and time are known
    FullyDetermined,
    /// Birth date known, time of day missing or partial
    PartiallyDetermined,
    /// Only a year or a due-date estimate
    Estimated,
    /// No birth information at all
    #[default]
    Unknown,
}

impl CertaintyLevel {
    /// Information content, higher means more complete input
    pub fn rank(&self) -> u8 {
        match self {
            CertaintyLevel::FullyDetermined => 3,
            CertaintyLevel::PartiallyDetermined => 2,
            CertaintyLevel::Estimated => 1,
            CertaintyLevel::Unknown => 0,
        }
    }

    /// All levels, most information first
    pub fn all() -> [CertaintyLevel; 4] {
        [
            CertaintyLevel::FullyDetermined,
            CertaintyLevel::PartiallyDetermined,
            CertaintyLevel::Estimated,
            CertaintyLevel::Unknown,
        ]
    }

    /// Whether `self` carries more information than `other`
    pub fn is_higher_than(&self, other: CertaintyLevel) -> bool {
        self.rank() > other.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertaintyLevel::FullyDetermined => "fully_determined",
            CertaintyLevel::PartiallyDetermined => "partially_determined",
            CertaintyLevel::Estimated => "estimated",
            CertaintyLevel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CertaintyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertaintyLevel {
    type Err = CertaintyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "fullydetermined" | "full" => Ok(CertaintyLevel::FullyDetermined),
            "partiallydetermined" | "partial" => Ok(CertaintyLevel::PartiallyDetermined),
            "estimated" => Ok(CertaintyLevel::Estimated),
            "unknown" => Ok(CertaintyLevel::Unknown),
            _ => Err(CertaintyError::UnknownLevel(s.to_string())),
        }
    }
}
