//! # Qiming Core Pipeline
//!
//! Executes one naming request: validates it, resolves the certainty level
//! and the enabled plugin set, then runs the plugins layer by layer in
//! dependency order, sequentially or in independent concurrent groups.
//!
//! A run moves through [`PipelinePhase`]s and always ends in a
//! [`RunResponse`], also when it fails.
use std::fmt;

use serde::Serialize;

pub mod context;
pub mod error;
pub mod executor;
pub mod plan;
pub mod request;
pub mod response;

pub use context::{ExecutionContext, ExecutionOptions, ProcessContext, StandardInput};
pub use error::PipelineError;
pub use executor::Pipeline;
pub use plan::{ExecutionPlan, LayerPlan};
pub use request::{BirthInfo, DataField, DueDateEstimate, ExecutionPreferences, Gender, NamingInput, NamingRequest};
pub use response::{ExecutionMode, PluginResults, RunError, RunMetadata, RunResponse};


/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Created,
    Validating,
    Selecting,
    Executing,
    Aggregating,
    Done,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelinePhase::Created => "created",
            PipelinePhase::Validating => "validating",
            PipelinePhase::Selecting => "selecting",
            PipelinePhase::Executing => "executing",
            PipelinePhase::Aggregating => "aggregating",
            PipelinePhase::Done => "done",
        };
        f.write_str(label)
    }
}
