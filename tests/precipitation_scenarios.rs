//! Precipitation Scenario Tests
//!
//! Reference rainfall regimes run through the full precipitation pipeline,
//! plus the universal invariants over seeded synthetic series.

use borehole_siting::config::{EngineConfig, Environment, RechargeConfig};
use borehole_siting::precipitation::{
    analyze_records, drought_severity, synthesize_daily, variability_coefficient, PrecipitationAnalyzer,
};
use borehole_siting::providers::{Capability, RainfallPattern, SyntheticProvider};
use borehole_siting::types::{PrecipitationMetrics, PrecipitationRecord};
use chrono::{NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn daily(years: std::ops::RangeInclusive<i32>, rain: impl Fn(NaiveDate) -> f64) -> Vec<PrecipitationRecord> {
    let start = NaiveDate::from_ymd_opt(*years.start(), 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(*years.end(), 12, 31).unwrap();
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| {
            let ts = Utc
                .from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap())
                .timestamp_millis();
            PrecipitationRecord::new(ts, rain(d), None)
        })
        .collect()
}

fn assert_invariants(m: &PrecipitationMetrics) {
    let s = &m.seasonal_patterns;
    let union: BTreeSet<usize> = s
        .wet_season
        .iter()
        .chain(&s.dry_season)
        .chain(&s.transition_periods)
        .copied()
        .collect();
    assert_eq!(union, (0..12).collect::<BTreeSet<_>>());
    assert!(s.wet_season.is_disjoint(&s.dry_season));
    assert!(s.wet_season.is_disjoint(&s.transition_periods));
    assert!(s.dry_season.is_disjoint(&s.transition_periods));
    assert!((0.0..=1.0).contains(&s.seasonality_index));

    let r = &m.reliability_scores;
    for score in [r.overall, r.seasonal, r.trend, r.recharge] {
        assert!((0.0..=1.0).contains(&score), "reliability component {score} out of range");
    }
    assert!((0.01..=1.0).contains(&m.recharge_patterns.efficiency));
}

fn single_attempt(environment: Environment) -> Arc<EngineConfig> {
    let mut config = EngineConfig::default();
    config.environment = environment;
    config.precipitation.max_retries = 1;
    config.precipitation.retry_delay_ms = 1;
    Arc::new(config)
}

// ============================================================================
// Reference Regimes
// ============================================================================

#[tokio::test]
async fn zero_rainfall_in_production_uses_recharge_fallback() {
    let provider = Arc::new(SyntheticProvider::new(1).with_rainfall(RainfallPattern::Zero));
    let analyzer = PrecipitationAnalyzer::new(provider, single_attempt(Environment::Production)).with_seed(1);

    let metrics = analyzer.analyze(-17.8, 31.0, 2.0).await.unwrap();

    assert!(metrics.years_analyzed >= 10);
    assert!(!metrics.is_fallback);
    assert!(metrics.note.is_none(), "production must not perturb zero rainfall");
    let recharge = &metrics.recharge_patterns;
    assert!(recharge.is_fallback);
    assert!(recharge.events.is_empty());
    assert!((recharge.efficiency - 0.2).abs() < 1e-12);
    assert!(recharge.note.is_some());
    assert_invariants(&metrics);
}

#[tokio::test]
async fn zero_rainfall_in_development_is_perturbed() {
    let provider = Arc::new(SyntheticProvider::new(1).with_rainfall(RainfallPattern::Zero));
    let analyzer = PrecipitationAnalyzer::new(provider, single_attempt(Environment::Development)).with_seed(1);

    let metrics = analyzer.analyze(-17.8, 31.0, 2.0).await.unwrap();

    assert!(metrics.note.as_deref().unwrap_or_default().contains("perturbed"));
    assert!(metrics.average_annual_rainfall_mm > 0.0);
    assert_invariants(&metrics);
}

#[test]
fn equal_monthly_totals_have_no_seasonality() {
    let records: Vec<PrecipitationRecord> = (2015..=2024)
        .flat_map(|year| (1..=12).map(move |month| (year, month)))
        .map(|(year, month)| {
            let ts = Utc.with_ymd_and_hms(year, month, 10, 0, 0, 0).unwrap().timestamp_millis();
            PrecipitationRecord::new(ts, 10.0, None)
        })
        .collect();

    let metrics = analyze_records(&records, 0.0, &RechargeConfig::default()).unwrap();

    let s = &metrics.seasonal_patterns;
    assert_eq!(s.seasonality_index, 0.0);
    assert_eq!(metrics.reliability_scores.seasonal, 1.0);
    assert!(s.wet_season.is_empty() && s.dry_season.is_empty());
    assert_eq!(s.transition_periods, (0..12).collect::<BTreeSet<_>>());
    assert_invariants(&metrics);
}

#[test]
fn daily_constant_rain_is_nearly_aseasonal() {
    let records = daily(2015..=2024, |_| 10.0);
    let metrics = analyze_records(&records, 0.0, &RechargeConfig::default()).unwrap();

    // Month lengths alone spread the monthly totals between 280 and 310 mm
    assert!(metrics.seasonal_patterns.seasonality_index < 0.06);
    assert!(metrics.reliability_scores.seasonal > 0.94);
    assert!(metrics.extremes.heavy_rainfall_events.is_empty());
    assert_invariants(&metrics);
}

#[test]
fn single_january_storm_each_year() {
    let records = daily(2015..=2024, |d| {
        if d.format("%m-%d").to_string() == "01-15" {
            300.0
        } else {
            0.0
        }
    });

    let metrics = analyze_records(&records, 0.0, &RechargeConfig::default()).unwrap();

    let s = &metrics.seasonal_patterns;
    assert_eq!(s.wet_season, BTreeSet::from([0]));
    assert_eq!(s.dry_season, BTreeSet::from([6]));
    assert_eq!(metrics.years_analyzed, 10);
    assert!(metrics.extremes.max_heavy_intensity() >= 10.0);
    assert_eq!(metrics.extremes.heavy_rainfall_events.len(), 10);
    assert_invariants(&metrics);
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn synthetic_series_respect_invariants() {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
    for seed in 0..8 {
        let records = synthesize_daily(start, end, &mut StdRng::seed_from_u64(seed));
        for slope in [0.0, 8.0, 25.0] {
            let metrics = analyze_records(&records, slope, &RechargeConfig::default()).unwrap();
            assert_invariants(&metrics);
        }
    }
}

#[tokio::test]
async fn outage_falls_back_to_five_synthetic_years() {
    let provider = Arc::new(SyntheticProvider::new(2).with_failure(Capability::HistoricalPrecipitation));
    let analyzer = PrecipitationAnalyzer::new(provider, single_attempt(Environment::Production)).with_seed(9);

    let metrics = analyzer.analyze(-17.8, 31.0, 2.0).await.unwrap();

    assert!(metrics.is_fallback);
    assert!((5..=6).contains(&metrics.years_analyzed));
    assert_invariants(&metrics);
}

#[test]
fn variability_of_zero_mean_is_zero() {
    assert_eq!(variability_coefficient(&[0.0; 12]), 0.0);
    assert_eq!(variability_coefficient(&[]), 0.0);
}

#[test]
fn drought_severity_decreases_with_ratio() {
    let ratios = [0.0, 0.05, 0.2, 0.4, 0.6, 1.0];
    let severities: Vec<f64> = ratios.iter().map(|r| drought_severity(r * 100.0, 100.0)).collect();
    assert!(severities.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(severities[0], 1.0);
    assert_eq!(severities[5], 0.0);
    assert_eq!(drought_severity(5.0, 0.0), 1.0);
}
