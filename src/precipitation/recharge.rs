//! Recharge-event detection and recharge efficiency
//!
//! Both compare records against the monthly totals from the seasonal stage
//! (mean across years of each calendar month's total), not per-record means.

use crate::config::RechargeConfig;
use crate::types::{PrecipitationRecord, RechargeEvent, RechargePatterns};
use chrono::{Datelike, TimeZone, Utc};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::warn;

/// Lower bound of the reported recharge efficiency.
pub const MIN_EFFICIENCY: f64 = 0.01;

/// Soil moisture used for the soil factor when a record has no measurement.
pub const UNMEASURED_SOIL_MOISTURE: f64 = 0.3;

/// `min(mean + k × σ, cap)` over the twelve monthly totals.
pub fn recharge_threshold(monthly_averages: &[f64; 12], config: &RechargeConfig) -> f64 {
    let mean = monthly_averages.iter().mean();
    let sd = monthly_averages.iter().population_std_dev();
    let threshold = (mean + config.threshold_std_multiplier * sd).min(config.max_threshold_mm);
    if threshold.is_finite() {
        threshold
    } else {
        config.max_threshold_mm
    }
}

/// Soil-moisture multiplier applied to the recharge threshold.
pub fn soil_factor(soil_moisture: f64, config: &RechargeConfig) -> f64 {
    if soil_moisture > config.soil_moisture_threshold {
        config.soil_factor_high
    } else {
        config.soil_factor_low
    }
}

/// Soil factor for one record; unmeasured records use the dry-side default.
fn record_soil_factor(record: &PrecipitationRecord, config: &RechargeConfig) -> f64 {
    soil_factor(record.measured_soil_moisture().unwrap_or(UNMEASURED_SOIL_MOISTURE), config)
}

/// Terrain multiplier applied to the recharge threshold.
pub fn slope_factor(mean_slope_deg: f64, config: &RechargeConfig) -> f64 {
    if mean_slope_deg < config.slope_threshold_deg {
        config.slope_factor_low
    } else {
        config.slope_factor_high
    }
}

/// Recharge events, annual recharge and efficiency for a time-ordered series.
///
/// A record is an event when `rain > min(threshold × soil × slope, 0.7 × max_rain)`.
/// With no events the result is flagged: the wettest 20% of rainy records
/// stand in as events and efficiency is fixed at 0.2.
pub fn recharge_patterns(
    records: &[PrecipitationRecord],
    monthly_averages: &[f64; 12],
    mean_slope_deg: f64,
    config: &RechargeConfig,
) -> RechargePatterns {
    let threshold = recharge_threshold(monthly_averages, config);
    let slope = slope_factor(mean_slope_deg, config);
    let max_rain = records.iter().map(|r| r.rain_mm).fold(0.0, f64::max);
    let ceiling = config.max_rainfall_fraction * max_rain;

    let events: Vec<RechargeEvent> = records
        .iter()
        .filter(|r| {
            let adjusted = threshold * record_soil_factor(r, config) * slope;
            r.rain_mm > adjusted.min(ceiling)
        })
        .map(|r| RechargeEvent {
            timestamp: r.timestamp,
            amount: r.rain_mm,
        })
        .collect();

    if events.is_empty() {
        return fallback_patterns(records, threshold, config);
    }

    RechargePatterns {
        annual_recharge: annual_recharge(&events),
        efficiency: recharge_efficiency(records, monthly_averages, threshold, slope, config),
        events,
        threshold,
        is_fallback: false,
        note: None,
    }
}

fn annual_recharge(events: &[RechargeEvent]) -> BTreeMap<i32, f64> {
    let mut annual = BTreeMap::new();
    for event in events {
        if let Some(dt) = Utc.timestamp_millis_opt(event.timestamp).single() {
            *annual.entry(dt.year()).or_insert(0.0) += event.amount;
        }
    }
    annual
}

fn fallback_patterns(
    records: &[PrecipitationRecord],
    threshold: f64,
    config: &RechargeConfig,
) -> RechargePatterns {
    let mut rainy: Vec<&PrecipitationRecord> = records.iter().filter(|r| r.rain_mm > 0.0).collect();
    rainy.sort_by(|a, b| b.rain_mm.total_cmp(&a.rain_mm).then(a.timestamp.cmp(&b.timestamp)));
    let take = (rainy.len() as f64 * config.fallback_top_fraction).ceil() as usize;

    let mut events: Vec<RechargeEvent> = rainy
        .into_iter()
        .take(take)
        .map(|r| RechargeEvent {
            timestamp: r.timestamp,
            amount: r.rain_mm,
        })
        .collect();
    events.sort_by_key(|e| e.timestamp);

    let note = if events.is_empty() {
        "No rainfall recorded; recharge efficiency set to the fallback estimate".to_string()
    } else {
        format!(
            "No records exceeded the recharge threshold; using the wettest {:.0}% of rainy records",
            config.fallback_top_fraction * 100.0
        )
    };
    warn!(
        records = records.len(),
        fallback_events = events.len(),
        threshold_mm = threshold,
        "Recharge detection found no events, using fallback"
    );

    RechargePatterns {
        annual_recharge: annual_recharge(&events),
        events,
        efficiency: config.fallback_efficiency,
        threshold,
        is_fallback: true,
        note: Some(note),
    }
}

/// `0.7 × overall + 0.3 × mean monthly efficiency`, clamped to `[0.01, 1]`.
///
/// A record contributes only when its rain exceeds both the adjusted
/// threshold and half the month's average total. Its weight is
/// `w = min(rain / adjusted, rain / (0.5 × monthly_avg))` and it is credited
/// with `rain × (1 - 1/w)`, the share above the binding threshold.
pub fn recharge_efficiency(
    records: &[PrecipitationRecord],
    monthly_averages: &[f64; 12],
    threshold: f64,
    slope: f64,
    config: &RechargeConfig,
) -> f64 {
    let mut total_rain = 0.0;
    let mut total_recharge = 0.0;
    let mut per_month: BTreeMap<(i32, usize), (f64, f64)> = BTreeMap::new();

    for record in records {
        let Some(key) = record.year_month() else {
            continue;
        };
        let rain = record.rain_mm;
        let adjusted = threshold * record_soil_factor(record, config) * slope;
        let half_monthly = 0.5 * monthly_averages.get(key.1).copied().unwrap_or(0.0);

        let credited = if rain > adjusted && rain > half_monthly && adjusted > 0.0 && half_monthly > 0.0 {
            let weight = (rain / adjusted).min(rain / half_monthly);
            rain * (1.0 - 1.0 / weight)
        } else {
            0.0
        };

        total_rain += rain;
        total_recharge += credited;
        let month = per_month.entry(key).or_insert((0.0, 0.0));
        month.0 += rain;
        month.1 += credited;
    }

    let overall = if total_rain > 0.0 {
        total_recharge / total_rain
    } else {
        0.0
    };
    let monthly: Vec<f64> = per_month
        .values()
        .filter(|(rain, _)| *rain > 0.0)
        .map(|(rain, credited)| credited / rain)
        .collect();
    let monthly_avg = if monthly.is_empty() {
        0.0
    } else {
        monthly.iter().sum::<f64>() / monthly.len() as f64
    };

    let efficiency = 0.7 * overall + 0.3 * monthly_avg;
    if efficiency.is_finite() {
        efficiency.clamp(MIN_EFFICIENCY, 1.0)
    } else {
        MIN_EFFICIENCY
    }
}

#[cfg(test)]
mod tests {
    use super::super::seasonal::monthly_averages;
    use super::*;
    use crate::types::GroupedPrecipitation;
    use chrono::Duration;

    fn daily(rains: &[f64], soil: f64) -> Vec<PrecipitationRecord> {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        rains
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let ts = (t0 + Duration::days(i as i64)).timestamp_millis();
                PrecipitationRecord::new(ts, *r, Some(soil))
            })
            .collect()
    }

    #[test]
    fn test_factors() {
        let config = RechargeConfig::default();
        assert_eq!(soil_factor(0.31, &config), 1.5);
        assert_eq!(soil_factor(0.30, &config), 0.7);
        assert_eq!(slope_factor(3.0, &config), 1.2);
        assert_eq!(slope_factor(15.0, &config), 0.5);
    }

    fn monthly(records: &[PrecipitationRecord]) -> [f64; 12] {
        monthly_averages(&GroupedPrecipitation::from_records(records))
    }

    #[test]
    fn test_all_zero_series_uses_fallback() {
        let records = daily(&vec![0.0; 365], 0.4);
        let patterns = recharge_patterns(&records, &monthly(&records), 2.0, &RechargeConfig::default());
        assert!(patterns.is_fallback);
        assert!(patterns.events.is_empty());
        assert_eq!(patterns.efficiency, 0.2);
        assert!(patterns.note.is_some());
    }

    #[test]
    fn test_storm_records_are_events() {
        let mut rains = vec![1.0; 60];
        rains[5] = 40.0;
        rains[35] = 30.0;
        let records = daily(&rains, 0.4);
        let patterns = recharge_patterns(&records, &monthly(&records), 2.0, &RechargeConfig::default());
        assert!(!patterns.is_fallback);
        assert_eq!(patterns.events.len(), 2);
        assert_eq!(patterns.total_recharge_mm(), 70.0);
        assert_eq!(patterns.annual_recharge.get(&2020), Some(&70.0));
        assert!(patterns.efficiency > MIN_EFFICIENCY && patterns.efficiency <= 1.0);
    }

    #[test]
    fn test_threshold_uses_monthly_totals() {
        let config = RechargeConfig::default();
        assert_eq!(recharge_threshold(&[100.0; 12], &config), 20.0);
        assert!((recharge_threshold(&[2.0; 12], &config) - 2.0).abs() < 1e-12);
        assert_eq!(recharge_threshold(&[0.0; 12], &config), 0.0);
    }

    #[test]
    fn test_hourly_series_threshold_is_not_diluted() {
        // every 20th hour of 2021 rains, cycling 0.5, 1.0, ..., 10.0 mm
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let records: Vec<PrecipitationRecord> = (0..8_760)
            .map(|h| {
                let rain = if h % 20 == 0 { 0.5 + ((h / 20) % 20) as f64 * 0.5 } else { 0.0 };
                PrecipitationRecord::new((t0 + Duration::hours(h)).timestamp_millis(), rain, None)
            })
            .collect();
        let config = RechargeConfig::default();
        let totals = monthly(&records);
        assert!(totals.iter().all(|t| *t > 150.0));

        let patterns = recharge_patterns(&records, &totals, 2.0, &config);

        // threshold capped at 20 mm; 20 × 0.7 × 1.2 = 16.8 loses to 0.7 × 10 = 7
        assert_eq!(patterns.threshold, 20.0);
        let rainy = records.iter().filter(|r| r.rain_mm > 0.0).count();
        let expected = records.iter().filter(|r| r.rain_mm > 7.0).count();
        assert_eq!(rainy, 438);
        assert_eq!(expected, 130);
        assert_eq!(patterns.events.len(), expected);
        assert!(!patterns.is_fallback);
    }

    #[test]
    fn test_unmeasured_soil_uses_dry_factor() {
        let config = RechargeConfig::default();
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap().timestamp_millis();
        let unmeasured = PrecipitationRecord::new(t0, 20.0, None);
        let wet = PrecipitationRecord::new(t0, 20.0, Some(0.4));
        assert_eq!(record_soil_factor(&unmeasured, &config), config.soil_factor_low);
        assert_eq!(record_soil_factor(&wet, &config), config.soil_factor_high);

        // threshold 10 mm, slope factor 1.2: 15 mm clears 10 × 0.7 × 1.2 but not 10 × 1.5 × 1.2
        let mut records = vec![PrecipitationRecord::new(t0, 0.0, None); 3];
        records.push(PrecipitationRecord::new(t0, 15.0, None));
        records.push(PrecipitationRecord::new(t0, 40.0, None));
        let totals = [10.0; 12];
        let patterns = recharge_patterns(&records, &totals, 2.0, &config);
        assert_eq!(patterns.events.len(), 2);

        let measured: Vec<_> = records
            .iter()
            .map(|r| PrecipitationRecord::new(r.timestamp, r.rain_mm, Some(0.4)))
            .collect();
        let patterns = recharge_patterns(&measured, &totals, 2.0, &config);
        assert_eq!(patterns.events.len(), 1);
    }

    #[test]
    fn test_efficiency_floor() {
        let records = daily(&[10.0; 31], 0.4);
        let config = RechargeConfig::default();
        // adjusted threshold 20 × 1.5 × 1.2 = 36 mm is never exceeded
        let eff = recharge_efficiency(&records, &monthly(&records), 20.0, 1.2, &config);
        assert_eq!(eff, MIN_EFFICIENCY);
    }
}
