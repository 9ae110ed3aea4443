mod catalog;
mod logging;
mod simulate;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde::Serialize;

use qiming_core::certainty::{CertaintyLevel, LevelConfig, auto_select_level, default_level_configs};
use qiming_core::config::{EngineConfig, load_file};
use qiming_core::pipeline::NamingRequest;
use qiming_core::plugin_system::manifest::PluginManifest;
use qiming_core::Engine;

use logging::LogFormat;

/// Qiming: plugin orchestration for name analysis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the default configuration of every certainty level
    Levels,
    /// Pick a certainty level for a request file
    Select {
        /// Request file (JSON, YAML or TOML)
        #[arg(long)]
        input: PathBuf,
    },
    /// Show how a request would execute without running any plugin
    Plan(RunArgs),
    /// Run a request through simulated plugins
    Simulate {
        #[command(flatten)]
        run: RunArgs,
        /// Force sequential execution inside every layer
        #[arg(long)]
        sequential: bool,
        /// Per-plugin timeout for this run
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Request file (JSON, YAML or TOML)
    #[arg(long)]
    input: PathBuf,
    /// Plugin manifest; the reference catalogue when omitted
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Certainty level, auto-selected from the input when omitted
    #[arg(long)]
    level: Option<CertaintyLevel>,
    /// Engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// One entry of `qiming levels`
#[derive(Serialize)]
struct LevelView {
    level: CertaintyLevel,
    plugin_count: usize,
    #[serde(flatten)]
    config: LevelConfig,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = logging::init(args.verbose, args.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = match args.command {
        Commands::Levels => print_levels(),
        Commands::Select { input } => select(&input),
        Commands::Plan(run) => plan(&run).await,
        Commands::Simulate {
            run,
            sequential,
            timeout_ms,
        } => simulate(&run, sequential, timeout_ms).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_levels() -> CliResult<bool> {
    let views: Vec<LevelView> = default_level_configs()
        .into_iter()
        .map(|(level, config)| LevelView {
            level,
            plugin_count: config.enabled_plugins.len(),
            config,
        })
        .collect();
    print_json(&views)?;
    Ok(true)
}

fn load_request(path: &Path, level: Option<CertaintyLevel>) -> CliResult<NamingRequest> {
    let mut request: NamingRequest = load_file(path)?;
    if level.is_some() {
        request.certainty_level = level;
    }
    Ok(request)
}

fn select(input: &Path) -> CliResult<bool> {
    let request = load_request(input, None)?;
    let selection = auto_select_level(&request.input);
    info!("Selected level {} with score {}", selection.level, selection.score);
    print_json(&selection)?;
    Ok(true)
}

/// Engine over simulated plugins, started and ready to run.
async fn build_engine(run: &RunArgs) -> CliResult<Engine> {
    let config = match &run.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let manifest = match &run.manifest {
        Some(path) => PluginManifest::from_path(path)?,
        None => catalog::reference_catalog(),
    };

    let mut engine = Engine::new(config)?;
    for plugin in simulate::plugins_from_manifest(&manifest) {
        engine.register_plugin(plugin).await?;
    }
    let report = engine.start().await?;
    info!(
        "Started {} simulated plugin(s), {} failed, {} disabled",
        report.initialized.len(),
        report.failed.len(),
        report.disabled.len()
    );
    Ok(engine)
}

async fn plan(run: &RunArgs) -> CliResult<bool> {
    let request = load_request(&run.input, run.level)?;
    let mut engine = build_engine(run).await?;
    let plan = engine.plan(&request).await;
    engine.shutdown().await?;
    print_json(&plan?)?;
    Ok(true)
}

async fn simulate(run: &RunArgs, sequential: bool, timeout_ms: Option<u64>) -> CliResult<bool> {
    let mut request = load_request(&run.input, run.level)?;
    if sequential {
        request.preferences.parallel_execution = Some(false);
    }
    if timeout_ms.is_some() {
        request.preferences.timeout_ms = timeout_ms;
    }

    let mut engine = build_engine(run).await?;
    let response = engine.run(request).await;
    engine.shutdown().await?;

    print_json(&response)?;
    if !response.success {
        for e in response.fatal_errors() {
            eprintln!("{} [{}]: {}", e.plugin_id, e.kind, e.message);
        }
    }
    Ok(response.success)
}
