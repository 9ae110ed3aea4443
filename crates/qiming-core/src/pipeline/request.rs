use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::certainty::CertaintyLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// A piece of input a plugin may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataField {
    BirthYear,
    BirthMonth,
    BirthDay,
    BirthHour,
    FamilyName,
    Gender,
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataField::BirthYear => "birth_year",
            DataField::BirthMonth => "birth_month",
            DataField::BirthDay => "birth_day",
            DataField::BirthHour => "birth_hour",
            DataField::FamilyName => "family_name",
            DataField::Gender => "gender",
        };
        f.write_str(label)
    }
}

/// Structured birth time. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthInfo {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
}

impl BirthInfo {
    /// Year, month and day are all known
    pub fn has_date(&self) -> bool {
        self.year.is_some() && self.month.is_some() && self.day.is_some()
    }

    pub fn has_exact_time(&self) -> bool {
        self.has_date() && self.hour.is_some() && self.minute.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self == &BirthInfo::default()
    }
}

/// Expected birth date when the child is not yet born
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateEstimate {
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
}

/// Caller-supplied data a run analyses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingInput {
    pub family_name: Option<String>,
    pub gender: Option<Gender>,
    pub birth_info: BirthInfo,
    pub due_date: Option<DueDateEstimate>,
    /// Characters the caller wants considered
    pub candidate_characters: Vec<String>,
}

impl NamingInput {
    pub fn has_family_name(&self) -> bool {
        self.family_name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Fields present in this input. A due date supplies the birth year.
    pub fn available_fields(&self) -> BTreeSet<DataField> {
        let mut fields = BTreeSet::new();
        let birth = &self.birth_info;
        if birth.year.is_some() || self.due_date.is_some() {
            fields.insert(DataField::BirthYear);
        }
        if birth.month.is_some() {
            fields.insert(DataField::BirthMonth);
        }
        if birth.day.is_some() {
            fields.insert(DataField::BirthDay);
        }
        if birth.hour.is_some() {
            fields.insert(DataField::BirthHour);
        }
        if self.has_family_name() {
            fields.insert(DataField::FamilyName);
        }
        if self.gender.is_some() {
            fields.insert(DataField::Gender);
        }
        fields
    }

    /// Identity and range checks. Returns every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.has_family_name() {
            problems.push("family_name is required".to_string());
        }
        if self.gender.is_none() {
            problems.push("gender is required".to_string());
        }

        let birth = &self.birth_info;
        if birth.month.is_some_and(|m| !(1..=12).contains(&m)) {
            problems.push("birth_info.month must be within 1..=12".to_string());
        }
        if birth.day.is_some_and(|d| !(1..=31).contains(&d)) {
            problems.push("birth_info.day must be within 1..=31".to_string());
        }
        if birth.hour.is_some_and(|h| h > 23) {
            problems.push("birth_info.hour must be within 0..=23".to_string());
        }
        if birth.minute.is_some_and(|m| m > 59) {
            problems.push("birth_info.minute must be within 0..=59".to_string());
        }
        if birth.minute.is_some() && birth.hour.is_none() {
            problems.push("birth_info.minute requires birth_info.hour".to_string());
        }
        if let Some(due) = &self.due_date {
            if due.month.is_some_and(|m| !(1..=12).contains(&m)) {
                problems.push("due_date.month must be within 1..=12".to_string());
            }
        }
        if self.candidate_characters.iter().any(|c| c.trim().is_empty()) {
            problems.push("candidate_characters must not contain empty entries".to_string());
        }
        problems
    }
}

/// Caller overrides of the level's execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionPreferences {
    pub timeout_ms: Option<u64>,
    pub skip_optional_failures: Option<bool>,
    pub parallel_execution: Option<bool>,
}

/// One pipeline run request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRequest {
    /// Generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
    pub input: NamingInput,
    /// Auto-selected from `input` when absent
    #[serde(default)]
    pub certainty_level: Option<CertaintyLevel>,
    #[serde(default)]
    pub preferences: ExecutionPreferences,
}

impl NamingRequest {
    pub fn new(input: NamingInput) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn at_level(mut self, level: CertaintyLevel) -> Self {
        self.certainty_level = Some(level);
        self
    }

    pub fn with_preferences(mut self, preferences: ExecutionPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Request-level checks performed before any plugin is selected.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self
            .request_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            problems.push("request_id must not be empty".to_string());
        }
        if self.preferences.timeout_ms == Some(0) {
            problems.push("preferences.timeout_ms must be greater than zero".to_string());
        }
        problems.extend(self.input.validate());
        problems
    }
}
