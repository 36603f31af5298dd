//! Per-year totals and variability

use crate::config::defaults::DRY_MONTH_THRESHOLD_MM;
use crate::types::{AnnualMetric, GroupedPrecipitation};
use statrs::statistics::Statistics;

/// One `AnnualMetric` per observed year, oldest first.
///
/// Only months with at least one record count towards the monthly mean,
/// the variability coefficient and the dry-month tally.
pub fn annual_metrics(grouped: &GroupedPrecipitation) -> Vec<AnnualMetric> {
    grouped
        .years()
        .map(|year| {
            let totals: Vec<f64> = grouped
                .months(year)
                .map(|months| months.values().map(|v| v.iter().sum()).collect())
                .unwrap_or_default();

            let total_rainfall: f64 = totals.iter().sum();
            let average_monthly = if totals.is_empty() {
                0.0
            } else {
                total_rainfall / totals.len() as f64
            };

            AnnualMetric {
                year,
                total_rainfall,
                average_monthly,
                variability_coefficient: variability_coefficient(&totals),
                dry_month_count: totals.iter().filter(|t| **t < DRY_MONTH_THRESHOLD_MM).count(),
            }
        })
        .collect()
}

/// Population standard deviation over mean; 0 when the mean is 0.
pub fn variability_coefficient(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().mean();
    if mean == 0.0 || !mean.is_finite() {
        return 0.0;
    }
    values.iter().population_std_dev() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrecipitationRecord;
    use chrono::{TimeZone, Utc};

    fn record(y: i32, m: u32, rain: f64) -> PrecipitationRecord {
        let ts = Utc.with_ymd_and_hms(y, m, 10, 0, 0, 0).unwrap().timestamp_millis();
        PrecipitationRecord::new(ts, rain, None)
    }

    #[test]
    fn test_zero_mean_has_zero_variability() {
        assert_eq!(variability_coefficient(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(variability_coefficient(&[]), 0.0);
    }

    #[test]
    fn test_annual_totals_and_dry_months() {
        let records: Vec<_> = (1..=12)
            .map(|m| record(2021, m, if m <= 6 { 100.0 } else { 10.0 }))
            .collect();
        let metrics = annual_metrics(&GroupedPrecipitation::from_records(&records));
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.year, 2021);
        assert_eq!(m.total_rainfall, 660.0);
        assert_eq!(m.average_monthly, 55.0);
        assert_eq!(m.dry_month_count, 6);
        // σ = 45, mean = 55
        assert!((m.variability_coefficient - 45.0 / 55.0).abs() < 1e-12);
    }
}
