//! System-wide default constants.
//!
//! Centralises magic numbers that are not operator-tunable.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BOREHOLE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "borehole_config.toml";

// ============================================================================
// Caches
// ============================================================================

/// One hour in milliseconds.
pub const HOUR_MS: u64 = 3_600_000;

/// Interval of the geospatial cache background sweep (ms). 300 000 = 5 min.
pub const CACHE_CLEANUP_INTERVAL_MS: u64 = 300_000;

/// Decimal places kept when keying the geology score cache.
pub const GEOLOGY_CACHE_PRECISION: i32 = 4;

// ============================================================================
// Precipitation
// ============================================================================

/// Months whose summed rainfall falls below this are counted as dry (mm).
pub const DRY_MONTH_THRESHOLD_MM: f64 = 30.0;

/// Consecutive below-normal records needed before a drought is emitted.
pub const DROUGHT_MIN_CONSECUTIVE: usize = 30;

/// A record is below normal when rain < this fraction of the monthly average.
pub const DROUGHT_RAIN_FRACTION: f64 = 0.3;

/// A record is heavy when rain > this multiple of the monthly average.
pub const HEAVY_RAIN_MULTIPLIER: f64 = 2.0;

/// Upper bound of the uniform perturbation applied to all-zero development data (mm).
pub const DEV_ZERO_RAIN_JITTER_MM: f64 = 2.0;

// ============================================================================
// Simulation
// ============================================================================

/// Default seed for the offline synthetic provider.
pub const SYNTHETIC_DEFAULT_SEED: u64 = 42;
