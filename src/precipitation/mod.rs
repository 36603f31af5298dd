//! Precipitation Analyzer
//!
//! Turns an hourly rainfall + soil-moisture series into the metrics every
//! downstream score depends on.
//!
//! ## Pipeline
//!
//! ```text
//! fetch (10 years, or 5 synthetic years on failure)
//!   → sanitize → group by UTC year / month
//!   → { annual ∥ seasonal ∥ trends }        (rayon::join)
//!   → { extremes ∥ recharge }               (rayon::join)
//!   → reliability
//! ```
//!
//! The statistics run on the blocking pool so the async caller never stalls
//! a runtime worker. Mean terrain slope is an explicit argument; it feeds
//! recharge detection only.

mod annual;
mod baseline;
mod extremes;
mod recharge;
mod reliability;
mod seasonal;
mod synthetic;
mod trends;

pub use annual::{annual_metrics, variability_coefficient};
pub use baseline::MonthlyBaseline;
pub use extremes::{drought_severity, extreme_events};
pub use recharge::{
    recharge_efficiency, recharge_patterns, recharge_threshold, slope_factor, soil_factor, MIN_EFFICIENCY,
    UNMEASURED_SOIL_MOISTURE,
};
pub use reliability::reliability_scores;
pub use seasonal::{monthly_averages, seasonal_patterns, seasonal_patterns_from_averages, seasonality_index};
pub use synthetic::{jitter_zero_rainfall, synthesize_daily};
pub use trends::{annual_totals, cycle_analysis, least_squares_slope, trend_analysis};

use crate::config::{EngineConfig, Environment, RechargeConfig};
use crate::error::{EngineError, EngineResult};
use crate::providers::DataProvider;
use crate::types::{Coordinate, GroupedPrecipitation, PrecipitationMetrics, PrecipitationRecord};
use chrono::{Months, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A series ready for analysis and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipitationSeries {
    pub records: Vec<PrecipitationRecord>,
    pub is_fallback: bool,
    pub note: Option<String>,
}

/// Fetches and analyzes rainfall for a point.
pub struct PrecipitationAnalyzer {
    provider: Arc<dyn DataProvider>,
    config: Arc<EngineConfig>,
    seed: Option<u64>,
}

impl PrecipitationAnalyzer {
    pub fn new(provider: Arc<dyn DataProvider>, config: Arc<EngineConfig>) -> Self {
        Self {
            provider,
            config,
            seed: None,
        }
    }

    /// Fix the RNG used for fallback synthesis and development jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Fetch `years_back` years ending today. Any provider failure or an
    /// empty/invalid response yields a synthetic series instead.
    pub async fn fetch_series(&self, lat: f64, lon: f64) -> PrecipitationSeries {
        let today = Utc::now().date_naive();
        let years_back = self.config.precipitation.years_back;
        let start = years_before(today, years_back);

        let fetched = self
            .provider
            .fetch_historical_hourly(lat, lon, start, today)
            .await
            .map(sanitize_records);

        match fetched {
            Ok(mut records) if !records.is_empty() => {
                let mut note = None;
                if records.iter().all(|r| r.rain_mm == 0.0) {
                    if self.config.environment == Environment::Development {
                        warn!(lat, lon, records = records.len(), "All rainfall values are zero, applying development jitter");
                        jitter_zero_rainfall(&mut records, &mut self.rng());
                        note = Some("All-zero rainfall perturbed (development environment)".to_string());
                    } else {
                        warn!(lat, lon, records = records.len(), "All rainfall values are zero");
                    }
                }
                info!(lat, lon, records = records.len(), years_back, "Precipitation series fetched");
                PrecipitationSeries {
                    records,
                    is_fallback: false,
                    note,
                }
            }
            Ok(_) => self.fallback_series(lat, lon, today, "archive returned no usable records"),
            Err(e) => self.fallback_series(lat, lon, today, &e.to_string()),
        }
    }

    fn fallback_series(&self, lat: f64, lon: f64, today: NaiveDate, reason: &str) -> PrecipitationSeries {
        let years = self.config.precipitation.fallback_years;
        warn!(lat, lon, reason, fallback_years = years, "Precipitation fetch failed, synthesizing fallback data");
        let records = synthesize_daily(years_before(today, years), today, &mut self.rng());
        PrecipitationSeries {
            records,
            is_fallback: true,
            note: Some(format!(
                "Historical precipitation unavailable ({reason}); using {years} years of synthetic data"
            )),
        }
    }

    /// Fetch then analyze. Only invalid coordinates or a failed stage error out.
    pub async fn analyze(&self, lat: f64, lon: f64, mean_slope_deg: f64) -> EngineResult<PrecipitationMetrics> {
        if !Coordinate::new(lon, lat).is_valid() {
            return Err(EngineError::InvalidGeometry(format!(
                "coordinates out of range: ({lat}, {lon})"
            )));
        }

        let series = self.fetch_series(lat, lon).await;
        let recharge = self.config.recharge.clone();
        let PrecipitationSeries {
            records,
            is_fallback,
            note,
        } = series;

        let mut metrics = tokio::task::spawn_blocking(move || {
            analyze_records(&records, mean_slope_deg, &recharge)
        })
        .await
        .map_err(|e| EngineError::computation("precipitation", e.to_string()))??;

        metrics.is_fallback = is_fallback;
        metrics.note = note;
        info!(
            lat,
            lon,
            reliability = metrics.reliability_scores.overall,
            efficiency = metrics.recharge_patterns.efficiency,
            is_fallback,
            "Precipitation analysis complete"
        );
        Ok(metrics)
    }
}

fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN)
}

/// Drop records with non-finite or negative rain or an unrepresentable
/// timestamp, and order the rest by time.
pub fn sanitize_records(mut records: Vec<PrecipitationRecord>) -> Vec<PrecipitationRecord> {
    let before = records.len();
    records.retain(|r| r.rain_mm.is_finite() && r.rain_mm >= 0.0 && r.datetime().is_some());
    let dropped = before - records.len();
    if dropped > 0 {
        warn!(dropped, kept = records.len(), "Dropped invalid precipitation records");
    }
    for r in &mut records {
        if !(r.soil_moisture.is_finite() && (0.0..=1.0).contains(&r.soil_moisture)) {
            r.soil_moisture = crate::types::DEFAULT_SOIL_MOISTURE;
            r.soil_moisture_measured = false;
        }
    }
    records.sort_by_key(|r| r.timestamp);
    records
}

/// Run every analysis stage over a time-ordered series.
pub fn analyze_records(
    records: &[PrecipitationRecord],
    mean_slope_deg: f64,
    config: &RechargeConfig,
) -> EngineResult<PrecipitationMetrics> {
    if records.is_empty() {
        return Err(EngineError::computation("precipitation", "no records to analyze"));
    }

    let grouped = GroupedPrecipitation::from_records(records);
    if grouped.is_empty() {
        return Err(EngineError::computation("precipitation", "no records with valid timestamps"));
    }

    let (annual, (seasonal, trends)) = rayon::join(
        || annual_metrics(&grouped),
        || rayon::join(|| seasonal_patterns(&grouped), || trend_analysis(&grouped)),
    );

    let baseline = MonthlyBaseline::from_records(records);
    let (extremes, recharge) = rayon::join(
        || extreme_events(records, &baseline),
        || recharge_patterns(records, &seasonal.monthly_averages, mean_slope_deg, config),
    );

    let reliability = reliability_scores(&seasonal, &trends, &recharge);

    let average_annual_rainfall_mm = if annual.is_empty() {
        0.0
    } else {
        annual.iter().map(|a| a.total_rainfall).sum::<f64>() / annual.len() as f64
    };
    debug!(
        records = records.len(),
        years = grouped.year_count(),
        seasonality = seasonal.seasonality_index,
        recharge_events = recharge.events.len(),
        droughts = extremes.droughts.len(),
        "Precipitation stages complete"
    );

    Ok(PrecipitationMetrics {
        average_annual_rainfall_mm,
        record_count: records.len(),
        years_analyzed: grouped.year_count(),
        annual_metrics: annual,
        seasonal_patterns: seasonal,
        trends,
        extremes,
        recharge_patterns: recharge,
        reliability_scores: reliability,
        is_fallback: false,
        note: None,
    })
}
