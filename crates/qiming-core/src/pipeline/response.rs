use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::certainty::{AnalysisStrategy, CertaintyLevel, LevelSelection};
use crate::kernel::error::ErrorKind;
use crate::pipeline::PipelinePhase;
use crate::plugin_system::traits::PluginOutput;

/// Plugin outputs keyed by plugin id, in completion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginResults {
    entries: Vec<(String, PluginOutput)>,
}

impl PluginResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the output of `plugin_id`
    pub fn insert(&mut self, plugin_id: &str, output: PluginOutput) {
        match self.entries.iter_mut().find(|(id, _)| id == plugin_id) {
            Some((_, existing)) => *existing = output,
            None => self.entries.push((plugin_id.to_string(), output)),
        }
    }

    pub fn get(&self, plugin_id: &str) -> Option<&PluginOutput> {
        self.entries
            .iter()
            .find(|(id, _)| id == plugin_id)
            .map(|(_, output)| output)
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.get(plugin_id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginOutput)> {
        self.entries.iter().map(|(id, output)| (id.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PluginResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, output) in &self.entries {
            map.serialize_entry(id, output)?;
        }
        map.end()
    }
}

/// One error recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunError {
    pub plugin_id: String,
    pub message: String,
    /// A fatal error stops the run
    pub fatal: bool,
    pub kind: ErrorKind,
    pub timestamp: DateTime<Utc>,
}

/// How plugins inside a layer were scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub processing_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub executed_plugins: Vec<String>,
    pub skipped_plugins: Vec<String>,
    pub failed_plugins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AnalysisStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certainty_level: Option<CertaintyLevel>,
    /// Present when the level was chosen from the input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_selection: Option<LevelSelection>,
    /// Last phase the run entered
    pub phase: PipelinePhase,
}

/// Structured outcome of a run. Returned even when the run failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResponse {
    pub request_id: String,
    pub success: bool,
    pub results: PluginResults,
    pub errors: Vec<RunError>,
    pub warnings: Vec<String>,
    pub metadata: RunMetadata,
}

impl RunResponse {
    pub fn result(&self, plugin_id: &str) -> Option<&PluginOutput> {
        self.results.get(plugin_id)
    }

    /// Errors that stopped the run
    pub fn fatal_errors(&self) -> impl Iterator<Item = &RunError> {
        self.errors.iter().filter(|e| e.fatal)
    }

    pub fn executed(&self, plugin_id: &str) -> bool {
        self.metadata.executed_plugins.iter().any(|id| id == plugin_id)
    }
}
