//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use super::EngineConfig;
use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " - did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Maintained by hand to match the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "environment",
        // [precipitation]
        "precipitation",
        "precipitation.years_back",
        "precipitation.timeout_ms",
        "precipitation.max_retries",
        "precipitation.retry_delay_ms",
        "precipitation.retry_backoff",
        "precipitation.fallback_years",
        // [recharge]
        "recharge",
        "recharge.soil_moisture_threshold",
        "recharge.soil_factor_high",
        "recharge.soil_factor_low",
        "recharge.slope_threshold_deg",
        "recharge.slope_factor_high",
        "recharge.slope_factor_low",
        "recharge.min_annual_rainfall_mm",
        "recharge.bedrock_depth_min_m",
        "recharge.infiltration_rate_min",
        "recharge.max_threshold_mm",
        "recharge.threshold_std_multiplier",
        "recharge.max_rainfall_fraction",
        "recharge.fallback_top_fraction",
        "recharge.fallback_efficiency",
        // [cache]
        "cache",
        "cache.geology_ttl_ms",
        "cache.geospatial_ttl_ms",
        "cache.flood_ttl_ms",
        "cache.roads_ttl_ms",
        "cache.country_ttl_ms",
        "cache.cleanup_interval_ms",
        // [providers]
        "providers",
        "providers.precipitation_url",
        "providers.forecast_url",
        "providers.elevation_url",
        "providers.lithology_url",
        "providers.features_url",
        "providers.timeout_ms",
        "providers.lithology_timeout_ms",
        "providers.formation_radius_km",
        "providers.feature_radius_m",
        "providers.raster_grid_size",
        // [water_budget]
        "water_budget",
        "water_budget.runoff_coefficient",
        "water_budget.aquifer_thickness_m",
        "water_budget.specific_yield",
        "water_budget.soil_depth_m",
        "water_budget.soil_porosity",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new(); // parse errors are reported by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        errors.push(format!("{name} = {value} must be strictly between 0 and 1"));
    }
}

fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{name} = {value} must be a finite number > 0"));
    }
}

/// Collect every impossible value in a parsed config.
pub fn validate_ranges(config: &EngineConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let p = &config.precipitation;
    if p.years_back == 0 {
        errors.push("precipitation.years_back must be > 0".to_string());
    }
    if p.timeout_ms == 0 {
        errors.push("precipitation.timeout_ms must be > 0".to_string());
    }
    if p.max_retries == 0 {
        errors.push("precipitation.max_retries must be >= 1".to_string());
    }
    if !p.retry_backoff.is_finite() || p.retry_backoff < 1.0 {
        errors.push(format!(
            "precipitation.retry_backoff = {} must be >= 1.0",
            p.retry_backoff
        ));
    }
    if p.fallback_years == 0 {
        errors.push("precipitation.fallback_years must be > 0".to_string());
    }

    let r = &config.recharge;
    check_fraction(r.soil_moisture_threshold, "recharge.soil_moisture_threshold", &mut errors);
    check_positive(r.soil_factor_high, "recharge.soil_factor_high", &mut errors);
    check_positive(r.soil_factor_low, "recharge.soil_factor_low", &mut errors);
    check_positive(r.slope_threshold_deg, "recharge.slope_threshold_deg", &mut errors);
    check_positive(r.slope_factor_high, "recharge.slope_factor_high", &mut errors);
    check_positive(r.slope_factor_low, "recharge.slope_factor_low", &mut errors);
    check_positive(r.min_annual_rainfall_mm, "recharge.min_annual_rainfall_mm", &mut errors);
    check_positive(r.bedrock_depth_min_m, "recharge.bedrock_depth_min_m", &mut errors);
    check_positive(r.infiltration_rate_min, "recharge.infiltration_rate_min", &mut errors);
    check_positive(r.max_threshold_mm, "recharge.max_threshold_mm", &mut errors);
    check_positive(r.threshold_std_multiplier, "recharge.threshold_std_multiplier", &mut errors);
    check_fraction(r.max_rainfall_fraction, "recharge.max_rainfall_fraction", &mut errors);
    check_fraction(r.fallback_top_fraction, "recharge.fallback_top_fraction", &mut errors);
    check_fraction(r.fallback_efficiency, "recharge.fallback_efficiency", &mut errors);

    let c = &config.cache;
    if c.geology_ttl_ms == Some(0) {
        errors.push("cache.geology_ttl_ms must be > 0 when set (omit for no expiry)".to_string());
    }
    for (value, name) in [
        (c.geospatial_ttl_ms, "cache.geospatial_ttl_ms"),
        (c.flood_ttl_ms, "cache.flood_ttl_ms"),
        (c.roads_ttl_ms, "cache.roads_ttl_ms"),
        (c.country_ttl_ms, "cache.country_ttl_ms"),
        (c.cleanup_interval_ms, "cache.cleanup_interval_ms"),
    ] {
        if value == 0 {
            errors.push(format!("{name} must be > 0"));
        }
    }

    let pr = &config.providers;
    if pr.timeout_ms == 0 || pr.lithology_timeout_ms == 0 {
        errors.push("providers timeouts must be > 0".to_string());
    }
    check_positive(pr.formation_radius_km, "providers.formation_radius_km", &mut errors);
    check_positive(pr.feature_radius_m, "providers.feature_radius_m", &mut errors);
    if !(1..=64).contains(&pr.raster_grid_size) {
        errors.push(format!(
            "providers.raster_grid_size = {} must be within 1-64",
            pr.raster_grid_size
        ));
    }

    let w = &config.water_budget;
    if !w.runoff_coefficient.is_finite() || !(0.0..=1.0).contains(&w.runoff_coefficient) {
        errors.push(format!(
            "water_budget.runoff_coefficient = {} must be within 0-1",
            w.runoff_coefficient
        ));
    }
    check_positive(w.aquifer_thickness_m, "water_budget.aquifer_thickness_m", &mut errors);
    check_fraction(w.specific_yield, "water_budget.specific_yield", &mut errors);
    check_positive(w.soil_depth_m, "water_budget.soil_depth_m", &mut errors);
    check_fraction(w.soil_porosity, "water_budget.soil_porosity", &mut errors);

    errors
}
