//! Engine Configuration - every tunable of the scoring pipeline as TOML values
//!
//! Each section implements `Default` with the documented engine constants,
//! so an empty or missing config file yields the reference behaviour.

use super::defaults;
use crate::providers::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Deployment environment. Development perturbs all-zero rainfall series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Root configuration for the engine.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$BOREHOLE_CONFIG` env var
/// 2. `./borehole_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Precipitation fetch window and retry policy
    #[serde(default)]
    pub precipitation: PrecipitationConfig,

    /// Recharge detection factors
    #[serde(default)]
    pub recharge: RechargeConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Remote provider endpoints and timeouts
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Water budget coefficients
    #[serde(default)]
    pub water_budget: WaterBudgetConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$BOREHOLE_CONFIG` environment variable
    /// 2. `./borehole_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), environment = %config.environment, "Loaded engine config from BOREHOLE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from BOREHOLE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "BOREHOLE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(environment = %config.environment, "Loaded engine config from ./borehole_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./borehole_config.toml, using defaults");
                }
            }
        }

        info!("No borehole_config.toml found - using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Precipitation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecipitationConfig {
    /// Years of hourly history requested, ending today
    #[serde(default = "default_years_back")]
    pub years_back: u32,

    #[serde(default = "default_precip_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,

    /// Years of daily data synthesized when the archive is unreachable
    #[serde(default = "default_fallback_years")]
    pub fallback_years: u32,
}

fn default_years_back() -> u32 {
    10
}
fn default_precip_timeout_ms() -> u64 {
    20_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2_000
}
fn default_retry_backoff() -> f64 {
    1.5
}
fn default_fallback_years() -> u32 {
    5
}

impl Default for PrecipitationConfig {
    fn default() -> Self {
        Self {
            years_back: default_years_back(),
            timeout_ms: default_precip_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_backoff: default_retry_backoff(),
            fallback_years: default_fallback_years(),
        }
    }
}

impl PrecipitationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            backoff: self.retry_backoff,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

// ============================================================================
// Recharge
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeConfig {
    /// Soil moisture above which the wet-soil factor applies
    #[serde(default = "default_soil_moisture_threshold")]
    pub soil_moisture_threshold: f64,

    #[serde(default = "default_soil_factor_high")]
    pub soil_factor_high: f64,

    #[serde(default = "default_soil_factor_low")]
    pub soil_factor_low: f64,

    /// Mean slope (degrees) at or above which runoff dominates
    #[serde(default = "default_slope_threshold_deg")]
    pub slope_threshold_deg: f64,

    /// Factor applied on steep terrain
    #[serde(default = "default_slope_factor_high")]
    pub slope_factor_high: f64,

    /// Factor applied on gentle terrain
    #[serde(default = "default_slope_factor_low")]
    pub slope_factor_low: f64,

    /// Average annual rainfall (mm) below which the report notes weak recharge
    #[serde(default = "default_min_annual_rainfall_mm")]
    pub min_annual_rainfall_mm: f64,

    /// Recommended depths shallower than this (m) are noted as likely seasonal
    #[serde(default = "default_bedrock_depth_min_m")]
    pub bedrock_depth_min_m: f64,

    /// Minimum event size (mm) considered able to infiltrate; noted when the
    /// largest recharge event falls short
    #[serde(default = "default_infiltration_rate_min")]
    pub infiltration_rate_min: f64,

    /// Upper cap on the statistical recharge threshold (mm)
    #[serde(default = "default_max_threshold_mm")]
    pub max_threshold_mm: f64,

    #[serde(default = "default_threshold_std_multiplier")]
    pub threshold_std_multiplier: f64,

    /// Fraction of the series maximum that always qualifies as recharge
    #[serde(default = "default_max_rainfall_fraction")]
    pub max_rainfall_fraction: f64,

    /// Share of records taken as events when detection finds none
    #[serde(default = "default_fallback_top_fraction")]
    pub fallback_top_fraction: f64,

    #[serde(default = "default_fallback_efficiency")]
    pub fallback_efficiency: f64,
}

fn default_soil_moisture_threshold() -> f64 {
    0.30
}
fn default_soil_factor_high() -> f64 {
    1.5
}
fn default_soil_factor_low() -> f64 {
    0.7
}
fn default_slope_threshold_deg() -> f64 {
    15.0
}
fn default_slope_factor_high() -> f64 {
    0.5
}
fn default_slope_factor_low() -> f64 {
    1.2
}
fn default_min_annual_rainfall_mm() -> f64 {
    200.0
}
fn default_bedrock_depth_min_m() -> f64 {
    30.0
}
fn default_infiltration_rate_min() -> f64 {
    10.0
}
fn default_max_threshold_mm() -> f64 {
    20.0
}
fn default_threshold_std_multiplier() -> f64 {
    0.3
}
fn default_max_rainfall_fraction() -> f64 {
    0.7
}
fn default_fallback_top_fraction() -> f64 {
    0.2
}
fn default_fallback_efficiency() -> f64 {
    0.2
}

impl Default for RechargeConfig {
    fn default() -> Self {
        Self {
            soil_moisture_threshold: default_soil_moisture_threshold(),
            soil_factor_high: default_soil_factor_high(),
            soil_factor_low: default_soil_factor_low(),
            slope_threshold_deg: default_slope_threshold_deg(),
            slope_factor_high: default_slope_factor_high(),
            slope_factor_low: default_slope_factor_low(),
            min_annual_rainfall_mm: default_min_annual_rainfall_mm(),
            bedrock_depth_min_m: default_bedrock_depth_min_m(),
            infiltration_rate_min: default_infiltration_rate_min(),
            max_threshold_mm: default_max_threshold_mm(),
            threshold_std_multiplier: default_threshold_std_multiplier(),
            max_rainfall_fraction: default_max_rainfall_fraction(),
            fallback_top_fraction: default_fallback_top_fraction(),
            fallback_efficiency: default_fallback_efficiency(),
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Geology score lifetime; absent means entries never expire
    #[serde(default)]
    pub geology_ttl_ms: Option<u64>,

    /// Provider responses without a more specific category
    #[serde(default = "default_geospatial_ttl_ms")]
    pub geospatial_ttl_ms: u64,

    #[serde(default = "default_flood_ttl_ms")]
    pub flood_ttl_ms: u64,

    #[serde(default = "default_roads_ttl_ms")]
    pub roads_ttl_ms: u64,

    #[serde(default = "default_country_ttl_ms")]
    pub country_ttl_ms: u64,

    /// Interval of the background sweep that drops expired entries
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

fn default_geospatial_ttl_ms() -> u64 {
    defaults::HOUR_MS
}
fn default_flood_ttl_ms() -> u64 {
    defaults::HOUR_MS
}
fn default_roads_ttl_ms() -> u64 {
    defaults::HOUR_MS / 2
}
fn default_country_ttl_ms() -> u64 {
    defaults::HOUR_MS * 24
}
fn default_cleanup_interval_ms() -> u64 {
    defaults::CACHE_CLEANUP_INTERVAL_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geology_ttl_ms: None,
            geospatial_ttl_ms: default_geospatial_ttl_ms(),
            flood_ttl_ms: default_flood_ttl_ms(),
            roads_ttl_ms: default_roads_ttl_ms(),
            country_ttl_ms: default_country_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_archive_url")]
    pub precipitation_url: String,

    /// Current-conditions endpoint used for soil moisture and temperature layers
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    #[serde(default = "default_elevation_url")]
    pub elevation_url: String,

    #[serde(default = "default_lithology_url")]
    pub lithology_url: String,

    #[serde(default = "default_features_url")]
    pub features_url: String,

    /// Timeout for elevation, formation and feature calls
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_lithology_timeout_ms")]
    pub lithology_timeout_ms: u64,

    #[serde(default = "default_formation_radius_km")]
    pub formation_radius_km: f64,

    #[serde(default = "default_feature_radius_m")]
    pub feature_radius_m: f64,

    /// Cells per side of sampled raster layers
    #[serde(default = "default_raster_grid_size")]
    pub raster_grid_size: usize,
}

fn default_archive_url() -> String {
    "https://archive-api.open-meteo.com/v1/archive".to_string()
}
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}
fn default_elevation_url() -> String {
    "https://api.open-elevation.com/api/v1/lookup".to_string()
}
fn default_lithology_url() -> String {
    "https://macrostrat.org/api/v2/geologic_units/map".to_string()
}
fn default_features_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}
fn default_provider_timeout_ms() -> u64 {
    15_000
}
fn default_lithology_timeout_ms() -> u64 {
    8_000
}
fn default_formation_radius_km() -> f64 {
    5.0
}
fn default_feature_radius_m() -> f64 {
    5_000.0
}
fn default_raster_grid_size() -> usize {
    5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            precipitation_url: default_archive_url(),
            forecast_url: default_forecast_url(),
            elevation_url: default_elevation_url(),
            lithology_url: default_lithology_url(),
            features_url: default_features_url(),
            timeout_ms: default_provider_timeout_ms(),
            lithology_timeout_ms: default_lithology_timeout_ms(),
            formation_radius_km: default_formation_radius_km(),
            feature_radius_m: default_feature_radius_m(),
            raster_grid_size: default_raster_grid_size(),
        }
    }
}

impl ProviderConfig {
    /// Retry policy for general provider calls, sharing the precipitation
    /// backoff schedule.
    pub fn retry_policy(&self, precipitation: &PrecipitationConfig) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            ..precipitation.retry_policy()
        }
    }

    pub fn lithology_retry_policy(&self, precipitation: &PrecipitationConfig) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.lithology_timeout_ms),
            ..precipitation.retry_policy()
        }
    }
}

// ============================================================================
// Water Budget
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterBudgetConfig {
    #[serde(default = "default_runoff_coefficient")]
    pub runoff_coefficient: f64,

    #[serde(default = "default_aquifer_thickness_m")]
    pub aquifer_thickness_m: f64,

    #[serde(default = "default_specific_yield")]
    pub specific_yield: f64,

    #[serde(default = "default_soil_depth_m")]
    pub soil_depth_m: f64,

    #[serde(default = "default_soil_porosity")]
    pub soil_porosity: f64,
}

fn default_runoff_coefficient() -> f64 {
    0.3
}
fn default_aquifer_thickness_m() -> f64 {
    30.0
}
fn default_specific_yield() -> f64 {
    0.15
}
fn default_soil_depth_m() -> f64 {
    1.0
}
fn default_soil_porosity() -> f64 {
    0.4
}

impl Default for WaterBudgetConfig {
    fn default() -> Self {
        Self {
            runoff_coefficient: default_runoff_coefficient(),
            aquifer_thickness_m: default_aquifer_thickness_m(),
            specific_yield: default_specific_yield(),
            soil_depth_m: default_soil_depth_m(),
            soil_porosity: default_soil_porosity(),
        }
    }
}
