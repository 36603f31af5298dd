//! Drought and heavy-rainfall detection

use super::baseline::MonthlyBaseline;
use crate::config::defaults::{DROUGHT_MIN_CONSECUTIVE, DROUGHT_RAIN_FRACTION, HEAVY_RAIN_MULTIPLIER};
use crate::types::{DroughtEvent, ExtremeEvents, HeavyRainfallEvent, PrecipitationRecord};

/// Severity of a dry spell from `rainfall / monthly_average`.
///
/// | ratio       | severity |
/// |-------------|----------|
/// | >= 0.5      | 0        |
/// | [0.3, 0.5)  | 0.3      |
/// | [0.1, 0.3)  | 0.7      |
/// | < 0.1       | 1.0      |
///
/// A zero or missing monthly average is treated as maximally severe.
pub fn drought_severity(rainfall: f64, monthly_average: f64) -> f64 {
    if monthly_average <= 0.0 || !monthly_average.is_finite() {
        return 1.0;
    }
    let ratio = rainfall / monthly_average;
    if ratio >= 0.5 {
        0.0
    } else if ratio >= 0.3 {
        0.3
    } else if ratio >= 0.1 {
        0.7
    } else {
        1.0
    }
}

/// In-progress run of below-normal records.
struct DrySpell {
    start: i64,
    start_month: usize,
    count: usize,
    rain_sum: f64,
}

impl DrySpell {
    fn into_event(self, baseline: &MonthlyBaseline) -> Option<DroughtEvent> {
        if self.count < DROUGHT_MIN_CONSECUTIVE {
            return None;
        }
        let rainfall = self.rain_sum / self.count as f64;
        let monthly_average = baseline.for_month(self.start_month);
        Some(DroughtEvent {
            timestamp: self.start,
            duration_records: self.count,
            rainfall,
            monthly_average,
            severity: drought_severity(rainfall, monthly_average),
        })
    }
}

/// Scan records in time order.
///
/// A record is below normal when `rain < 0.3 × baseline[month]`; a run of at
/// least 30 such records is one drought, reported at its first record with
/// the run's mean rainfall. A record with `rain > 2 × baseline[month]` is a
/// heavy-rainfall event.
pub fn extreme_events(records: &[PrecipitationRecord], baseline: &MonthlyBaseline) -> ExtremeEvents {
    let mut events = ExtremeEvents::default();
    let mut spell: Option<DrySpell> = None;

    for record in records {
        let Some((_, month)) = record.year_month() else {
            continue;
        };
        let monthly_average = baseline.for_month(month);
        let rain = record.rain_mm;

        if rain < DROUGHT_RAIN_FRACTION * monthly_average {
            let s = spell.get_or_insert(DrySpell {
                start: record.timestamp,
                start_month: month,
                count: 0,
                rain_sum: 0.0,
            });
            s.count += 1;
            s.rain_sum += rain;
        } else if let Some(ended) = spell.take() {
            events.droughts.extend(ended.into_event(baseline));
        }

        if rain > HEAVY_RAIN_MULTIPLIER * monthly_average {
            events.heavy_rainfall_events.push(HeavyRainfallEvent {
                timestamp: record.timestamp,
                rainfall: rain,
                monthly_average,
                intensity: if monthly_average > 0.0 {
                    rain / monthly_average
                } else {
                    rain
                },
            });
        }
    }

    if let Some(ended) = spell {
        events.droughts.extend(ended.into_event(baseline));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Hourly records starting at midnight on 1 January 2021.
    fn hourly(rains: &[f64]) -> Vec<PrecipitationRecord> {
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        rains
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let ts = (t0 + Duration::hours(i as i64)).timestamp_millis();
                PrecipitationRecord::new(ts, *r, None)
            })
            .collect()
    }

    #[test]
    fn test_severity_strictly_decreasing_across_bands() {
        let ratios = [0.05, 0.2, 0.4, 0.6];
        let severities: Vec<f64> = ratios.iter().map(|r| drought_severity(*r * 10.0, 10.0)).collect();
        assert_eq!(severities, vec![1.0, 0.7, 0.3, 0.0]);
        for w in severities.windows(2) {
            assert!(w[0] > w[1]);
        }
        assert_eq!(drought_severity(5.0, 0.0), 1.0);
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(drought_severity(5.0, 10.0), 0.0);
        assert_eq!(drought_severity(3.0, 10.0), 0.3);
        assert_eq!(drought_severity(1.0, 10.0), 0.7);
        assert_eq!(drought_severity(0.99, 10.0), 1.0);
    }

    #[test]
    fn test_long_dry_run_is_one_drought() {
        let mut rains = vec![10.0; 20];
        rains.extend(vec![0.0; 40]);
        rains.extend(vec![10.0; 10]);
        let records = hourly(&rains);
        let baseline = MonthlyBaseline::from_records(&records);
        let events = extreme_events(&records, &baseline);
        assert_eq!(events.droughts.len(), 1);
        let d = &events.droughts[0];
        assert_eq!(d.duration_records, 40);
        assert_eq!(d.severity, 1.0);
    }

    #[test]
    fn test_short_dry_run_is_not_a_drought() {
        let mut rains = vec![10.0; 10];
        rains.extend(vec![0.0; 29]);
        rains.push(10.0);
        let records = hourly(&rains);
        let baseline = MonthlyBaseline::from_records(&records);
        assert!(extreme_events(&records, &baseline).droughts.is_empty());
    }

    #[test]
    fn test_heavy_rainfall_intensity() {
        let mut rains = vec![1.0; 30];
        rains[10] = 100.0;
        let records = hourly(&rains);
        let baseline = MonthlyBaseline::from_records(&records);
        let events = extreme_events(&records, &baseline);
        assert_eq!(events.heavy_rainfall_events.len(), 1);
        let mean = (29.0 + 100.0) / 30.0;
        assert!((events.max_heavy_intensity() - 100.0 / mean).abs() < 1e-9);
    }
}
