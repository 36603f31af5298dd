//! Precipitation time-series and the metrics derived from it

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Soil moisture stored when a record carries none. Recharge detection
/// ignores it and applies its own default (see `measured_soil_moisture`).
pub const DEFAULT_SOIL_MOISTURE: f64 = 0.4;

/// A single rainfall observation (hourly from the archive API, daily when synthesized).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationRecord {
    /// Milliseconds since the Unix epoch, UTC
    pub timestamp: i64,
    /// Rainfall in mm, never negative
    pub rain_mm: f64,
    /// Volumetric soil moisture in [0, 1]
    pub soil_moisture: f64,
    /// False when `soil_moisture` is the stored default
    #[serde(default = "measured")]
    pub soil_moisture_measured: bool,
}

fn measured() -> bool {
    true
}

impl PrecipitationRecord {
    /// Build a record, clamping rain at zero and defaulting missing or
    /// out-of-range soil moisture.
    pub fn new(timestamp: i64, rain_mm: f64, soil_moisture: Option<f64>) -> Self {
        let measured = soil_moisture.filter(|m| m.is_finite() && (0.0..=1.0).contains(m));
        Self {
            timestamp,
            rain_mm: if rain_mm.is_finite() { rain_mm.max(0.0) } else { 0.0 },
            soil_moisture: measured.unwrap_or(DEFAULT_SOIL_MOISTURE),
            soil_moisture_measured: measured.is_some(),
        }
    }

    pub fn measured_soil_moisture(&self) -> Option<f64> {
        self.soil_moisture_measured.then_some(self.soil_moisture)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Calendar year and 0-indexed month in UTC.
    pub fn year_month(&self) -> Option<(i32, usize)> {
        self.datetime().map(|dt| (dt.year(), dt.month0() as usize))
    }
}

/// year → month (0..11) → rain values in record order.
///
/// Built once from a record sequence and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedPrecipitation {
    years: BTreeMap<i32, BTreeMap<usize, Vec<f64>>>,
}

impl GroupedPrecipitation {
    pub fn from_records(records: &[PrecipitationRecord]) -> Self {
        let mut years: BTreeMap<i32, BTreeMap<usize, Vec<f64>>> = BTreeMap::new();
        for record in records {
            if let Some((year, month)) = record.year_month() {
                years
                    .entry(year)
                    .or_default()
                    .entry(month)
                    .or_default()
                    .push(record.rain_mm);
            }
        }
        Self { years }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    pub fn year_count(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn months(&self, year: i32) -> Option<&BTreeMap<usize, Vec<f64>>> {
        self.years.get(&year)
    }

    /// Summed rainfall for one month of one year; 0 when absent.
    pub fn month_total(&self, year: i32, month: usize) -> f64 {
        self.years
            .get(&year)
            .and_then(|m| m.get(&month))
            .map_or(0.0, |v| v.iter().sum())
    }

    /// Twelve monthly totals for a year (absent months are 0).
    pub fn monthly_totals(&self, year: i32) -> [f64; 12] {
        let mut totals = [0.0; 12];
        for (month, total) in totals.iter_mut().enumerate() {
            *total = self.month_total(year, month);
        }
        totals
    }
}

/// Per-year rainfall summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualMetric {
    pub year: i32,
    pub total_rainfall: f64,
    pub average_monthly: f64,
    pub variability_coefficient: f64,
    pub dry_month_count: usize,
}

/// Month-of-year rainfall regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalPatterns {
    pub monthly_averages: [f64; 12],
    pub wet_season: BTreeSet<usize>,
    pub dry_season: BTreeSet<usize>,
    pub transition_periods: BTreeSet<usize>,
    pub seasonality_index: f64,
}

/// Change between two consecutive years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverYearChange {
    pub from_year: i32,
    pub to_year: i32,
    pub absolute_change: f64,
    /// `None` when the earlier year had no rainfall
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremeKind {
    Peak,
    Trough,
}

/// A year that is a strict local maximum or minimum of annual totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleExtreme {
    pub year: i32,
    pub kind: ExtremeKind,
    pub total_rainfall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleAnalysis {
    pub peaks: Vec<i32>,
    pub troughs: Vec<i32>,
    pub extremes: Vec<CycleExtreme>,
    /// Mean interval in years between alternating extremes
    pub average_cycle_length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    /// Least-squares slope of annual totals (mm / year)
    pub long_term_slope: f64,
    pub year_over_year_changes: Vec<YearOverYearChange>,
    /// `None` with fewer than three years of data
    pub cycle_analysis: Option<CycleAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroughtEvent {
    pub timestamp: i64,
    /// Consecutive dry records at the time of emission
    pub duration_records: usize,
    pub rainfall: f64,
    pub monthly_average: f64,
    pub severity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeavyRainfallEvent {
    pub timestamp: i64,
    pub rainfall: f64,
    pub monthly_average: f64,
    /// rainfall / monthly_average (rainfall itself when the average is 0)
    pub intensity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremeEvents {
    pub droughts: Vec<DroughtEvent>,
    pub heavy_rainfall_events: Vec<HeavyRainfallEvent>,
}

impl ExtremeEvents {
    pub fn max_heavy_intensity(&self) -> f64 {
        self.heavy_rainfall_events
            .iter()
            .map(|e| e.intensity)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeEvent {
    pub timestamp: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargePatterns {
    pub events: Vec<RechargeEvent>,
    pub annual_recharge: BTreeMap<i32, f64>,
    /// Fraction of rainfall attributed to recharge, in [0.01, 1]
    pub efficiency: f64,
    pub threshold: f64,
    pub is_fallback: bool,
    pub note: Option<String>,
}

impl RechargePatterns {
    pub fn total_recharge_mm(&self) -> f64 {
        self.events.iter().map(|e| e.amount).sum()
    }
}

/// Composite confidence, each component in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityScores {
    pub overall: f64,
    pub seasonal: f64,
    pub trend: f64,
    pub recharge: f64,
}

impl Default for ReliabilityScores {
    fn default() -> Self {
        Self {
            overall: 0.5,
            seasonal: 0.5,
            trend: 0.5,
            recharge: 0.5,
        }
    }
}

/// Everything the precipitation analyzer produces for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecipitationMetrics {
    pub annual_metrics: Vec<AnnualMetric>,
    pub seasonal_patterns: SeasonalPatterns,
    pub trends: TrendAnalysis,
    pub extremes: ExtremeEvents,
    pub recharge_patterns: RechargePatterns,
    pub reliability_scores: ReliabilityScores,
    pub average_annual_rainfall_mm: f64,
    pub record_count: usize,
    pub years_analyzed: usize,
    /// Set when the series was synthesized instead of fetched
    pub is_fallback: bool,
    pub note: Option<String>,
}

impl PrecipitationMetrics {
    /// Neutral metrics used when no series could be analyzed at all.
    /// Reliability components sit at 0.5.
    pub fn unavailable(note: impl Into<String>) -> Self {
        let defaults = ReliabilityScores::default();
        Self {
            annual_metrics: Vec::new(),
            seasonal_patterns: SeasonalPatterns {
                monthly_averages: [0.0; 12],
                wet_season: BTreeSet::new(),
                dry_season: BTreeSet::new(),
                transition_periods: (0..12).collect(),
                seasonality_index: 0.0,
            },
            trends: TrendAnalysis {
                long_term_slope: 0.0,
                year_over_year_changes: Vec::new(),
                cycle_analysis: None,
            },
            extremes: ExtremeEvents::default(),
            recharge_patterns: RechargePatterns {
                events: Vec::new(),
                annual_recharge: BTreeMap::new(),
                efficiency: defaults.recharge,
                threshold: 0.0,
                is_fallback: true,
                note: None,
            },
            reliability_scores: defaults,
            average_annual_rainfall_mm: 0.0,
            record_count: 0,
            years_analyzed: 0,
            is_fallback: true,
            note: Some(note.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap().timestamp_millis()
    }

    #[test]
    fn test_record_defaults_soil_moisture() {
        let r = PrecipitationRecord::new(0, 3.0, None);
        assert_eq!(r.soil_moisture, DEFAULT_SOIL_MOISTURE);
        assert_eq!(r.measured_soil_moisture(), None);
        let r = PrecipitationRecord::new(0, 3.0, Some(1.7));
        assert_eq!(r.soil_moisture, DEFAULT_SOIL_MOISTURE);
        assert_eq!(r.measured_soil_moisture(), None);
        let r = PrecipitationRecord::new(0, -2.0, Some(0.2));
        assert_eq!(r.rain_mm, 0.0);
        assert_eq!(r.measured_soil_moisture(), Some(0.2));
    }

    #[test]
    fn test_grouping_by_utc_year_and_month() {
        let records = vec![
            PrecipitationRecord::new(ts(2020, 1, 1), 2.0, None),
            PrecipitationRecord::new(ts(2020, 1, 2), 3.0, None),
            PrecipitationRecord::new(ts(2020, 12, 31), 4.0, None),
            PrecipitationRecord::new(ts(2021, 6, 15), 5.0, None),
        ];
        let grouped = GroupedPrecipitation::from_records(&records);
        assert_eq!(grouped.years().collect::<Vec<_>>(), vec![2020, 2021]);
        assert_eq!(grouped.month_total(2020, 0), 5.0);
        assert_eq!(grouped.month_total(2020, 11), 4.0);
        assert_eq!(grouped.month_total(2021, 5), 5.0);
        assert_eq!(grouped.month_total(2021, 0), 0.0);
        assert_eq!(grouped.months(2020).unwrap()[&0], vec![2.0, 3.0]);
    }
}
