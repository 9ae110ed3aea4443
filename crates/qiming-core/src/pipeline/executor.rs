use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::certainty::manager::SharedLevelManager;
use crate::certainty::{CertaintyLevel, LevelConfig, LevelSelection, auto_select_level};
use crate::config::{PipelineConfig, PluginConfig};
use crate::kernel::constants::PIPELINE_ERROR_SOURCE;
use crate::kernel::services::ServiceRegistry;
use crate::pipeline::PipelinePhase;
use crate::pipeline::context::{ExecutionContext, ExecutionOptions, ProcessContext, StandardInput};
use crate::pipeline::error::PipelineError;
use crate::pipeline::plan::{ExecutionPlan, dependency_warnings, layout};
use crate::pipeline::request::{NamingInput, NamingRequest};
use crate::pipeline::response::{ExecutionMode, PluginResults, RunError, RunMetadata, RunResponse};
use crate::plugin_system::container::SharedContainer;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::traits::{Plugin, PluginOutput, ValidationReport};

struct SelectedPlugin {
    plugin: Arc<dyn Plugin>,
    descriptor: PluginDescriptor,
    config: PluginConfig,
}

/// Everything resolved before the first plugin runs
struct Selection {
    plan: ExecutionPlan,
    plugins: HashMap<String, SelectedPlugin>,
    services: Arc<ServiceRegistry>,
}

/// One scheduled plugin call, self-contained so it can run concurrently
struct Invocation {
    plugin_id: String,
    plugin: Arc<dyn Plugin>,
    optional: bool,
    input: StandardInput,
    context: ProcessContext,
    timeout: Duration,
    retries: u32,
}

enum Failure {
    Validation(ValidationReport),
    Error(PipelineError),
}

struct InvocationOutcome {
    plugin_id: String,
    optional: bool,
    attempts: u32,
    elapsed_ms: u64,
    validation_warnings: Vec<String>,
    result: Result<PluginOutput, Failure>,
}

/// Executes naming requests against the registered plugins.
///
/// Cheap to clone; clones share the container and the level manager.
#[derive(Clone)]
pub struct Pipeline {
    container: SharedContainer,
    levels: SharedLevelManager,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(container: SharedContainer, levels: SharedLevelManager, config: PipelineConfig) -> Self {
        Self {
            container,
            levels,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a request to completion.
    ///
    /// Never fails: validation, selection and plugin errors are all reported
    /// in the returned response with `success == false`.
    pub async fn execute(&self, request: NamingRequest) -> RunResponse {
        let started_at = Utc::now();
        let started = Instant::now();
        let request_id = resolve_request_id(&request);
        log::info!("[{}] Run {}", request_id, PipelinePhase::Created);

        log::debug!("[{}] Phase {}", request_id, PipelinePhase::Validating);
        let problems = request.validate();
        if !problems.is_empty() {
            let error = PipelineError::ValidationFailed(problems);
            return rejected(request_id, started_at, started, PipelinePhase::Validating, &error);
        }

        let (level, selection_info) = match request.certainty_level {
            Some(level) => (level, None),
            None => {
                let selection = auto_select_level(&request.input);
                (selection.level, Some(selection))
            }
        };
        let level_config = self.levels.read().await.get_config(level);
        let options = self.resolve_options(&level_config, &request);

        let mut ctx = ExecutionContext::new(request_id.clone(), started_at, started, level, level_config.strategy, options);
        if let Some(selection) = &selection_info {
            log::info!(
                "[{}] Certainty level {} auto-selected with score {}",
                request_id,
                selection.level,
                selection.score
            );
        }

        log::debug!("[{}] Phase {} at level {}", request_id, PipelinePhase::Selecting, level);
        let selection = match self
            .select(&request_id, level, &level_config, options, selection_info.clone())
            .await
        {
            Ok(selection) => selection,
            Err(error) => {
                ctx.record_error(PIPELINE_ERROR_SOURCE, &error, true);
                return finish(ctx, PipelinePhase::Selecting, selection_info, None);
            }
        };
        for warning in &selection.plan.warnings {
            ctx.warn(warning.clone());
        }
        for id in &selection.plan.unavailable {
            log::debug!("[{}] '{}' is configured for {} but not available", request_id, id, level);
        }

        log::debug!("[{}] Phase {}", request_id, PipelinePhase::Executing);
        let input = Arc::new(request.input);
        self.run_layers(&mut ctx, &selection, &input).await;

        log::debug!("[{}] Phase {}", request_id, PipelinePhase::Aggregating);
        let mode = selection.plan.mode;
        let phase = if ctx.has_fatal_error() {
            PipelinePhase::Executing
        } else {
            PipelinePhase::Done
        };
        finish(ctx, phase, selection_info, Some(mode))
    }

    /// Resolve level, selection and scheduling without invoking any plugin.
    pub async fn plan(&self, request: &NamingRequest) -> Result<ExecutionPlan, PipelineError> {
        let problems = request.validate();
        if !problems.is_empty() {
            return Err(PipelineError::ValidationFailed(problems));
        }
        let request_id = resolve_request_id(request);
        let (level, selection_info) = match request.certainty_level {
            Some(level) => (level, None),
            None => {
                let selection = auto_select_level(&request.input);
                (selection.level, Some(selection))
            }
        };
        let level_config = self.levels.read().await.get_config(level);
        let options = self.resolve_options(&level_config, request);
        let selection = self
            .select(&request_id, level, &level_config, options, selection_info)
            .await?;
        Ok(selection.plan)
    }

    fn resolve_options(&self, level_config: &LevelConfig, request: &NamingRequest) -> ExecutionOptions {
        let preferences = &request.preferences;
        ExecutionOptions {
            timeout_ms: preferences
                .timeout_ms
                .map(|ms| ms.min(self.config.max_timeout_ms))
                .unwrap_or(level_config.timeout_ms),
            retry_count: self.config.retry_count,
            skip_optional_failures: preferences
                .skip_optional_failures
                .unwrap_or(level_config.skip_optional_failures),
            parallel_execution: preferences
                .parallel_execution
                .unwrap_or(level_config.parallel_execution)
                && self.config.allow_parallel,
            confidence_threshold: level_config.confidence_threshold,
        }
    }

    /// Enabled set, topological order and layer layout at one level.
    async fn select(
        &self,
        request_id: &str,
        level: CertaintyLevel,
        level_config: &LevelConfig,
        options: ExecutionOptions,
        level_selection: Option<LevelSelection>,
    ) -> Result<Selection, PipelineError> {
        let container = self.container.read().await;

        let enabled = container.enabled_plugins(&level_config.enabled_plugins);
        if enabled.is_empty() {
            return Err(PipelineError::NoEnabledPlugins { level });
        }
        let unavailable: Vec<String> = level_config
            .enabled_plugins
            .iter()
            .filter(|id| !enabled.contains(id))
            .cloned()
            .collect();

        let order = container.execution_order(&enabled)?;
        let mode = if options.parallel_execution {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        let layers = layout(container.graph(), &order, mode);
        let warnings = dependency_warnings(container.graph(), &order);

        let mut plugins = HashMap::with_capacity(order.len());
        for id in &order {
            let (Some(plugin), Some(descriptor)) = (container.get_plugin(id), container.descriptor(id)) else {
                return Err(PipelineError::PluginUnavailable { plugin_id: id.clone() });
            };
            plugins.insert(
                id.clone(),
                SelectedPlugin {
                    plugin,
                    descriptor: descriptor.clone(),
                    config: container.plugin_config(id).cloned().unwrap_or_default(),
                },
            );
        }

        log::debug!(
            "[{}] Selected {} plugin(s) in {} layer(s), {} mode",
            request_id,
            order.len(),
            layers.len(),
            if mode == ExecutionMode::Parallel { "parallel" } else { "sequential" }
        );

        Ok(Selection {
            plan: ExecutionPlan {
                request_id: request_id.to_string(),
                level,
                level_selection,
                strategy: level_config.strategy,
                mode,
                options,
                order,
                layers,
                unavailable,
                warnings,
            },
            plugins,
            services: container.services(),
        })
    }

    /// Execute layer by layer. Each group settles completely before the next starts.
    async fn run_layers(&self, ctx: &mut ExecutionContext, selection: &Selection, input: &Arc<NamingInput>) {
        'layers: for layer in &selection.plan.layers {
            log::debug!(
                "[{}] Layer {} ({}): {} group(s)",
                ctx.request_id,
                layer.layer,
                layer.name,
                layer.groups.len()
            );
            let layer_started = Instant::now();

            for group in &layer.groups {
                let available: HashSet<String> = {
                    let container = self.container.read().await;
                    group
                        .iter()
                        .filter(|id| container.is_plugin_available(id))
                        .cloned()
                        .collect()
                };

                let snapshot = ctx.snapshot();
                let mut invocations = Vec::with_capacity(group.len());
                for id in group {
                    if !available.contains(id) {
                        ctx.warn(format!("plugin '{id}' is no longer active, skipping"));
                        ctx.mark_skipped(id);
                        continue;
                    }
                    let Some(selected) = selection.plugins.get(id) else {
                        continue;
                    };
                    if let Some(invocation) = prepare(ctx, selected, selection, input, &snapshot) {
                        invocations.push(invocation);
                    }
                }
                if ctx.has_fatal_error() {
                    break 'layers;
                }

                let outcomes = if invocations.len() == 1 {
                    match invocations.pop() {
                        Some(invocation) => vec![invoke(invocation).await],
                        None => Vec::new(),
                    }
                } else {
                    futures::future::join_all(invocations.into_iter().map(invoke)).await
                };

                for outcome in outcomes {
                    apply_outcome(ctx, outcome);
                }
                if ctx.has_fatal_error() {
                    break 'layers;
                }
            }

            log::debug!(
                "[{}] Layer {} settled in {} ms",
                ctx.request_id,
                layer.layer,
                layer_started.elapsed().as_millis()
            );
        }
    }
}

fn resolve_request_id(request: &NamingRequest) -> String {
    request
        .request_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Dependency checks and input assembly for one plugin.
///
/// Returns `None` when the plugin must not run; the reason is already
/// recorded in `ctx`.
fn prepare(
    ctx: &mut ExecutionContext,
    selected: &SelectedPlugin,
    selection: &Selection,
    input: &Arc<NamingInput>,
    snapshot: &Arc<PluginResults>,
) -> Option<Invocation> {
    let descriptor = &selected.descriptor;
    let id = descriptor.id.as_str();

    for dep in &descriptor.dependencies {
        if ctx.has_result(&dep.plugin_id) {
            continue;
        }
        if dep.required {
            let error = PipelineError::MissingRequiredDependency {
                plugin_id: id.to_string(),
                dependency: dep.plugin_id.clone(),
            };
            ctx.record_error(id, &error, true);
            ctx.failed_plugins.push(id.to_string());
            return None;
        }
        ctx.warn(format!(
            "optional dependency '{}' of '{}' produced no result",
            dep.plugin_id, id
        ));
    }

    let standard_input = StandardInput {
        request_id: ctx.request_id.clone(),
        plugin_id: id.to_string(),
        certainty_level: ctx.level,
        input: Arc::clone(input),
        dependency_results: ctx.dependency_results(descriptor.dependencies.iter().map(|d| d.plugin_id.as_str())),
    };
    let context = ProcessContext {
        request_id: ctx.request_id.clone(),
        certainty_level: ctx.level,
        strategy: ctx.strategy,
        config: selected.config.clone(),
        services: Arc::clone(&selection.services),
        completed: Arc::clone(snapshot),
    };

    Some(Invocation {
        plugin_id: id.to_string(),
        plugin: Arc::clone(&selected.plugin),
        optional: descriptor.is_optional(),
        input: standard_input,
        context,
        timeout: Duration::from_millis(selected.config.timeout_ms.unwrap_or(ctx.options.timeout_ms)),
        retries: selected.config.retry_count.unwrap_or(ctx.options.retry_count),
    })
}

/// Validate, then process with timeout and retries.
async fn invoke(invocation: Invocation) -> InvocationOutcome {
    let started = Instant::now();
    let outcome = |attempts, validation_warnings, result| InvocationOutcome {
        plugin_id: invocation.plugin_id.clone(),
        optional: invocation.optional,
        attempts,
        elapsed_ms: started.elapsed().as_millis() as u64,
        validation_warnings,
        result,
    };

    let plugin = Arc::clone(&invocation.plugin);
    let input = invocation.input.clone();
    let report = match tokio::spawn(async move { plugin.validate(&input) }).await {
        Ok(report) => report,
        Err(join_error) => {
            let error = PipelineError::PluginPanicked {
                plugin_id: invocation.plugin_id.clone(),
                message: join_error.to_string(),
            };
            return outcome(0, Vec::new(), Err(Failure::Error(error)));
        }
    };
    if !report.valid {
        let warnings = report.warnings.clone();
        return outcome(0, warnings, Err(Failure::Validation(report)));
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt(&invocation).await {
            Ok(output) => return outcome(attempts, report.warnings.clone(), Ok(output)),
            Err(error) if error.is_retryable() && attempts <= invocation.retries => {
                log::info!(
                    "Plugin '{}' attempt {} failed, retrying: {}",
                    invocation.plugin_id,
                    attempts,
                    error
                );
            }
            Err(error) => return outcome(attempts, report.warnings.clone(), Err(Failure::Error(error))),
        }
    }
}

/// One `process` call raced against the timeout.
///
/// A timed-out task is detached, not aborted: the plugin's own work keeps
/// running in the background.
async fn attempt(invocation: &Invocation) -> Result<PluginOutput, PipelineError> {
    let plugin = Arc::clone(&invocation.plugin);
    let input = invocation.input.clone();
    let context = invocation.context.clone();
    let handle = tokio::spawn(async move { plugin.process(&input, &context).await });

    let output = match tokio::time::timeout(invocation.timeout, handle).await {
        Err(_) => {
            log::warn!(
                "Plugin '{}' timed out after {} ms",
                invocation.plugin_id,
                invocation.timeout.as_millis()
            );
            return Err(PipelineError::PluginTimeout {
                plugin_id: invocation.plugin_id.clone(),
                timeout_ms: invocation.timeout.as_millis() as u64,
            });
        }
        Ok(Err(join_error)) => {
            return Err(PipelineError::PluginPanicked {
                plugin_id: invocation.plugin_id.clone(),
                message: join_error.to_string(),
            });
        }
        Ok(Ok(Err(plugin_error))) => {
            return Err(PipelineError::PluginExecutionFailed {
                plugin_id: invocation.plugin_id.clone(),
                message: plugin_error.to_string(),
            });
        }
        Ok(Ok(Ok(output))) => output,
    };

    if !output.success {
        let message = if output.errors.is_empty() {
            "plugin reported an unsuccessful result".to_string()
        } else {
            output.errors.join("; ")
        };
        return Err(PipelineError::PluginExecutionFailed {
            plugin_id: invocation.plugin_id.clone(),
            message,
        });
    }
    output
        .check_shape()
        .map_err(|message| PipelineError::InvalidOutput {
            plugin_id: invocation.plugin_id.clone(),
            message,
        })?;
    Ok(output)
}

fn apply_outcome(ctx: &mut ExecutionContext, outcome: InvocationOutcome) {
    let id = outcome.plugin_id.as_str();
    for warning in &outcome.validation_warnings {
        ctx.warn(format!("{id}: {warning}"));
    }
    let tolerated = outcome.optional && ctx.options.skip_optional_failures;

    match outcome.result {
        Ok(mut output) => {
            if output.execution_time_ms == 0 {
                output.execution_time_ms = outcome.elapsed_ms;
            }
            if output.confidence < ctx.options.confidence_threshold {
                ctx.warn(format!(
                    "'{}' confidence {:.2} is below the level threshold {:.2}",
                    id, output.confidence, ctx.options.confidence_threshold
                ));
            }
            log::debug!(
                "[{}] '{}' completed in {} ms after {} attempt(s)",
                ctx.request_id,
                id,
                output.execution_time_ms,
                outcome.attempts
            );
            ctx.record_result(id, output);
        }
        Err(Failure::Validation(report)) => {
            let error = PipelineError::InputValidationFailed {
                plugin_id: id.to_string(),
                errors: report.errors,
            };
            if tolerated {
                ctx.warn(format!("skipping optional plugin: {error}"));
                ctx.mark_skipped(id);
            } else {
                ctx.record_error(id, &error, true);
                ctx.failed_plugins.push(id.to_string());
            }
        }
        Err(Failure::Error(error)) => {
            ctx.record_error(id, &error, !tolerated);
            ctx.failed_plugins.push(id.to_string());
            if tolerated {
                ctx.mark_skipped(id);
            }
        }
    }
}

/// Response for a request rejected before a level was resolved
fn rejected(
    request_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    phase: PipelinePhase,
    error: &PipelineError,
) -> RunResponse {
    log::warn!("[{}] Run rejected: {}", request_id, error);
    RunResponse {
        request_id,
        success: false,
        results: PluginResults::new(),
        errors: vec![RunError {
            plugin_id: PIPELINE_ERROR_SOURCE.to_string(),
            message: error.to_string(),
            fatal: true,
            kind: error.kind(),
            timestamp: Utc::now(),
        }],
        warnings: Vec::new(),
        metadata: RunMetadata {
            processing_time_ms: started.elapsed().as_millis() as u64,
            started_at,
            executed_plugins: Vec::new(),
            skipped_plugins: Vec::new(),
            failed_plugins: Vec::new(),
            strategy: None,
            execution_mode: None,
            certainty_level: None,
            level_selection: None,
            phase,
        },
    }
}

fn finish(
    ctx: ExecutionContext,
    phase: PipelinePhase,
    level_selection: Option<LevelSelection>,
    mode: Option<ExecutionMode>,
) -> RunResponse {
    let success = !ctx.has_fatal_error();
    let processing_time_ms = ctx.elapsed_ms();
    log::info!(
        "[{}] Run finished: success={}, executed={}, skipped={}, failed={}, {} ms",
        ctx.request_id,
        success,
        ctx.executed_plugins.len(),
        ctx.skipped_plugins.len(),
        ctx.failed_plugins.len(),
        processing_time_ms
    );
    RunResponse {
        request_id: ctx.request_id,
        success,
        results: ctx.results,
        errors: ctx.errors,
        warnings: ctx.warnings,
        metadata: RunMetadata {
            processing_time_ms,
            started_at: ctx.started_at,
            executed_plugins: ctx.executed_plugins,
            skipped_plugins: ctx.skipped_plugins,
            failed_plugins: ctx.failed_plugins,
            strategy: Some(ctx.strategy),
            execution_mode: mode,
            certainty_level: Some(ctx.level),
            level_selection,
            phase,
        },
    }
}
