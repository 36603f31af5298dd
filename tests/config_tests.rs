//! Config Loading Tests
//!
//! Exercises TOML loading from disk, typo detection and range validation
//! independently from the rest of the engine.

use borehole_siting::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use borehole_siting::config::{ConfigError, EngineConfig, Environment};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_toml(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn load_from_file_applies_overrides_and_keeps_defaults() {
    let file = write_toml(
        r#"
environment = "development"

[precipitation]
years_back = 5
max_retries = 2

[recharge]
soil_moisture_threshold = 0.25

[water_budget]
runoff_coefficient = 0.4
"#,
    );

    let config = EngineConfig::load_from_file(file.path()).unwrap();
    let defaults = EngineConfig::default();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.precipitation.years_back, 5);
    assert_eq!(config.precipitation.max_retries, 2);
    assert_eq!(config.precipitation.timeout_ms, defaults.precipitation.timeout_ms);
    assert_eq!(config.recharge.soil_moisture_threshold, 0.25);
    assert_eq!(config.recharge.slope_threshold_deg, defaults.recharge.slope_threshold_deg);
    assert_eq!(config.water_budget.runoff_coefficient, 0.4);
    assert_eq!(config.cache.geology_ttl_ms, None);
}

#[test]
fn empty_file_is_reference_config() {
    let file = write_toml("");
    let config = EngineConfig::load_from_file(file.path()).unwrap();
    let defaults = EngineConfig::default();

    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.precipitation.years_back, 10);
    assert_eq!(config.precipitation.timeout_ms, 20_000);
    assert_eq!(config.precipitation.max_retries, 3);
    assert_eq!(config.recharge.min_annual_rainfall_mm, 200.0);
    assert_eq!(config.water_budget.runoff_coefficient, defaults.water_budget.runoff_coefficient);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_toml_reports_path() {
    let file = write_toml("[precipitation\nyears_back = ");
    let err = EngineConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn impossible_values_fail_validation() {
    let file = write_toml(
        r#"
[precipitation]
max_retries = 0

[water_budget]
specific_yield = 1.5
"#,
    );
    let err = EngineConfig::load_from_file(file.path()).unwrap_err();
    let ConfigError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.contains("max_retries")));
    assert!(errors.iter().any(|e| e.contains("specific_yield")));
}

#[test]
fn rendered_config_loads_back() {
    let mut config = EngineConfig::default();
    config.precipitation.years_back = 7;
    config.cache.geology_ttl_ms = Some(60_000);

    let file = write_toml(&config.to_toml().unwrap());
    let loaded = EngineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(loaded.precipitation.years_back, 7);
    assert_eq!(loaded.cache.geology_ttl_ms, Some(60_000));
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_recharge_section_warns_with_suggestion() {
    let warnings = validate_unknown_keys(
        r#"
[recharge]
soil_moisture_treshold = 0.3
"#,
    );
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].field.contains("soil_moisture_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("recharge.soil_moisture_threshold")
    );
}

#[test]
fn unknown_section_is_only_a_warning() {
    let file = write_toml(
        r#"
[dashboard]
theme = "dark"
"#,
    );
    assert!(EngineConfig::load_from_file(file.path()).is_ok());
    assert!(!validate_unknown_keys("[dashboard]\ntheme = \"dark\"\n").is_empty());
}

#[test]
fn far_off_keys_get_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely.unrelated.key", &known).is_none());
    assert_eq!(
        suggest_correction("precipitation.year_back", &known).as_deref(),
        Some("precipitation.years_back")
    );
}
