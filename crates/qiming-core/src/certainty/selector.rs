use serde::Serialize;

use crate::certainty::CertaintyLevel;
use crate::pipeline::request::NamingInput;

const EXACT_TIME_WEIGHT: i32 = 50;
const DATE_WEIGHT: i32 = 35;
const YEAR_OR_ESTIMATE_WEIGHT: i32 = 20;
const IDENTITY_WEIGHT: i32 = 20;
const MISSING_IDENTITY_PENALTY: i32 = -10;
const DUE_DATE_BONUS: i32 = 5;
const CANDIDATES_BONUS: i32 = 5;

const FULLY_DETERMINED_MIN: i32 = 70;
const PARTIALLY_DETERMINED_MIN: i32 = 50;
const ESTIMATED_MIN: i32 = 30;

/// Level picked for an input, with the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSelection {
    pub level: CertaintyLevel,
    pub score: i32,
    /// Confidence attached to the chosen level
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Score how complete `input` is and map the score onto a level.
///
/// Pure and deterministic.
pub fn auto_select_level(input: &NamingInput) -> LevelSelection {
    let mut score = 0;
    let mut reasons = Vec::new();
    let birth = &input.birth_info;

    if birth.has_exact_time() {
        score += EXACT_TIME_WEIGHT;
        reasons.push(format!("birth date with hour and minute (+{EXACT_TIME_WEIGHT})"));
    } else if birth.has_date() {
        score += DATE_WEIGHT;
        reasons.push(format!("birth date without exact time (+{DATE_WEIGHT})"));
    } else if birth.year.is_some() || input.due_date.is_some() {
        score += YEAR_OR_ESTIMATE_WEIGHT;
        reasons.push(format!("birth year or due-date estimate only (+{YEAR_OR_ESTIMATE_WEIGHT})"));
    }

    if input.has_family_name() && input.gender.is_some() {
        score += IDENTITY_WEIGHT;
        reasons.push(format!("family name and gender (+{IDENTITY_WEIGHT})"));
    } else {
        score += MISSING_IDENTITY_PENALTY;
        reasons.push(format!("family name or gender missing ({MISSING_IDENTITY_PENALTY})"));
    }

    if input.due_date.is_some() {
        score += DUE_DATE_BONUS;
        reasons.push(format!("due-date estimate (+{DUE_DATE_BONUS})"));
    }
    if !input.candidate_characters.is_empty() {
        score += CANDIDATES_BONUS;
        reasons.push(format!("candidate characters supplied (+{CANDIDATES_BONUS})"));
    }

    let (level, confidence) = if score >= FULLY_DETERMINED_MIN {
        (CertaintyLevel::FullyDetermined, 0.95)
    } else if score >= PARTIALLY_DETERMINED_MIN {
        (CertaintyLevel::PartiallyDetermined, 0.8)
    } else if score >= ESTIMATED_MIN {
        (CertaintyLevel::Estimated, 0.6)
    } else {
        (CertaintyLevel::Unknown, 0.4)
    };

    LevelSelection {
        level,
        score,
        confidence,
        reasons,
    }
}
