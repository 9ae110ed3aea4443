use std::io;

use clap::ValueEnum;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber and route `log` records from the engine into it.
///
/// `RUST_LOG` wins over the default directive. Output goes to stderr so
/// command results on stdout stay machine readable.
pub fn init(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    LogTracer::init()?;

    match format {
        LogFormat::Text => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    tracing::debug!(verbose, ?format, "Logging initialized");
    Ok(())
}
