//! Record-level monthly baseline
//!
//! Extreme-event detection compares individual records against what a
//! typical record of the same calendar month looks like, so the baseline is
//! the mean rain per record (not the monthly total).

use crate::types::PrecipitationRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBaseline {
    /// Mean rain per record for each calendar month; 0 when unobserved
    means: [f64; 12],
}

impl MonthlyBaseline {
    pub fn from_records(records: &[PrecipitationRecord]) -> Self {
        let mut sums = [0.0; 12];
        let mut counts = [0usize; 12];
        for record in records {
            if let Some((_, month)) = record.year_month() {
                sums[month] += record.rain_mm;
                counts[month] += 1;
            }
        }
        let mut means = [0.0; 12];
        for month in 0..12 {
            if counts[month] > 0 {
                means[month] = sums[month] / counts[month] as f64;
            }
        }
        Self { means }
    }

    pub fn for_month(&self, month: usize) -> f64 {
        self.means.get(month).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_mean_rain_per_record() {
        let jan = |d: u32| Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap().timestamp_millis();
        let records = vec![
            PrecipitationRecord::new(jan(1), 2.0, None),
            PrecipitationRecord::new(jan(2), 4.0, None),
        ];
        let baseline = MonthlyBaseline::from_records(&records);
        assert_eq!(baseline.for_month(0), 3.0);
        assert_eq!(baseline.for_month(6), 0.0);
    }
}
