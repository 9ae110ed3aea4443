/// Application name
pub const APP_NAME: &str = "Qiming";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lowest plugin layer
pub const MIN_LAYER: u8 = 1;

/// Highest plugin layer
pub const MAX_LAYER: u8 = 5;

/// Upper bound for a per-plugin timeout requested by a caller
pub const MAX_PLUGIN_TIMEOUT_MS: u64 = 120_000;

/// Default number of extra attempts for a failing plugin invocation
pub const DEFAULT_RETRY_COUNT: u32 = 0;

/// Default interval between health-check sweeps
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

/// Timeout applied to a single plugin health probe
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;

/// Level switch attempts kept by the certainty level manager
pub const MAX_SWITCH_HISTORY: usize = 64;

/// Identifier used in run errors that are not attributable to a plugin
pub const PIPELINE_ERROR_SOURCE: &str = "pipeline";
