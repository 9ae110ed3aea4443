use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::certainty::{AnalysisStrategy, CertaintyLevel};
use crate::config::PluginConfig;
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::error::PipelineError;
use crate::pipeline::request::NamingInput;
use crate::pipeline::response::{PluginResults, RunError};
use crate::plugin_system::traits::PluginOutput;

/// Settings resolved for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionOptions {
    /// Per-plugin timeout unless the plugin's config overrides it
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub skip_optional_failures: bool,
    pub parallel_execution: bool,
    pub confidence_threshold: f64,
}

/// Per-run mutable state. Never shared across runs.
#[derive(Debug)]
pub struct ExecutionContext {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub level: CertaintyLevel,
    pub strategy: AnalysisStrategy,
    pub options: ExecutionOptions,
    pub results: PluginResults,
    pub errors: Vec<RunError>,
    pub warnings: Vec<String>,
    pub executed_plugins: Vec<String>,
    pub skipped_plugins: Vec<String>,
    pub failed_plugins: Vec<String>,
}

impl ExecutionContext {
    /// `started_at` and `started` mark when the run was received, before validation.
    pub fn new(
        request_id: String,
        started_at: DateTime<Utc>,
        started: Instant,
        level: CertaintyLevel,
        strategy: AnalysisStrategy,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            request_id,
            started_at,
            started,
            level,
            strategy,
            options,
            results: PluginResults::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            executed_plugins: Vec::new(),
            skipped_plugins: Vec::new(),
            failed_plugins: Vec::new(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn has_result(&self, plugin_id: &str) -> bool {
        self.results.contains(plugin_id)
    }

    pub fn record_result(&mut self, plugin_id: &str, output: PluginOutput) {
        self.results.insert(plugin_id, output);
        self.executed_plugins.push(plugin_id.to_string());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", self.request_id, message);
        self.warnings.push(message);
    }

    pub fn mark_skipped(&mut self, plugin_id: &str) {
        if !self.skipped_plugins.iter().any(|id| id == plugin_id) {
            self.skipped_plugins.push(plugin_id.to_string());
        }
    }

    /// Record an error, logged at the severity of its kind.
    pub fn record_error(&mut self, plugin_id: &str, error: &PipelineError, fatal: bool) {
        let kind = error.kind();
        log::log!(
            kind.severity().log_level(),
            "[{}] {} error from '{}' ({}): {}",
            self.request_id,
            if fatal { "fatal" } else { "non-fatal" },
            plugin_id,
            kind,
            error
        );
        self.errors.push(RunError {
            plugin_id: plugin_id.to_string(),
            message: error.to_string(),
            fatal,
            kind,
            timestamp: Utc::now(),
        });
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Outputs of `dependency_ids` produced so far
    pub fn dependency_results<'a>(&self, dependency_ids: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, PluginOutput> {
        dependency_ids
            .into_iter()
            .filter_map(|id| self.results.get(id).map(|output| (id.to_string(), output.clone())))
            .collect()
    }

    /// Read-only copy of every output produced so far
    pub fn snapshot(&self) -> Arc<PluginResults> {
        Arc::new(self.results.clone())
    }
}

/// The standardized view of a run handed to one plugin
#[derive(Debug, Clone)]
pub struct StandardInput {
    pub request_id: String,
    pub plugin_id: String,
    pub certainty_level: CertaintyLevel,
    pub input: Arc<NamingInput>,
    /// Outputs of this plugin's declared dependencies that ran before it
    pub dependency_results: BTreeMap<String, PluginOutput>,
}

impl StandardInput {
    pub fn dependency(&self, plugin_id: &str) -> Option<&PluginOutput> {
        self.dependency_results.get(plugin_id)
    }
}

/// Read-only run context handed to [`Plugin::process`](crate::plugin_system::Plugin::process)
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub request_id: String,
    pub certainty_level: CertaintyLevel,
    pub strategy: AnalysisStrategy,
    pub config: PluginConfig,
    pub services: Arc<ServiceRegistry>,
    /// Outputs completed before this plugin's group started
    pub completed: Arc<PluginResults>,
}
