//! Month-of-year rainfall regime: wet, dry and transition months

use crate::types::{GroupedPrecipitation, SeasonalPatterns};
use std::collections::BTreeSet;

/// Mean across years of each calendar month's total. Months never observed are 0.
pub fn monthly_averages(grouped: &GroupedPrecipitation) -> [f64; 12] {
    let mut sums = [0.0; 12];
    let mut counts = [0usize; 12];
    for year in grouped.years() {
        if let Some(months) = grouped.months(year) {
            for (month, values) in months {
                if *month < 12 {
                    sums[*month] += values.iter().sum::<f64>();
                    counts[*month] += 1;
                }
            }
        }
    }
    let mut averages = [0.0; 12];
    for month in 0..12 {
        if counts[month] > 0 {
            averages[month] = sums[month] / counts[month] as f64;
        }
    }
    averages
}

/// `(max - min) / (max + min)`; 0 when both are 0.
pub fn seasonality_index(averages: &[f64; 12]) -> f64 {
    let (min, max) = min_max(averages);
    if max + min <= 0.0 {
        0.0
    } else {
        ((max - min) / (max + min)).clamp(0.0, 1.0)
    }
}

fn min_max(averages: &[f64; 12]) -> (f64, f64) {
    averages
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

fn cyclic_distance(a: usize, b: usize) -> usize {
    let d = a.abs_diff(b) % 12;
    d.min(12 - d)
}

/// Grow a contiguous run of months outward from `seed` (both directions,
/// modulo 12) while `accept` holds and the month is not in `exclude`.
///
/// This deliberately widens "neighbouring months" past the two adjacent
/// ones: a qualifying month two or more steps away joins the season as long
/// as every month between it and the seed qualifies too. A five-month rainy
/// season is therefore one wet season, not a peak flanked by transitions.
fn grow_season(
    seed: usize,
    exclude: &BTreeSet<usize>,
    accept: impl Fn(usize) -> bool,
) -> BTreeSet<usize> {
    let mut season = BTreeSet::from([seed]);
    for step in [1, 11] {
        let mut month = (seed + step) % 12;
        while month != seed
            && !season.contains(&month)
            && !exclude.contains(&month)
            && accept(month)
        {
            season.insert(month);
            month = (month + step) % 12;
        }
    }
    season
}

/// Classify months into wet, dry and transition sets.
///
/// Wet season: the wettest month plus contiguous neighbours above half the
/// maximum. Dry season: the driest month (ties resolved towards the month
/// furthest from the wet peak) plus contiguous neighbours below twice the
/// minimum, never overlapping the wet season. A flat regime (max == min)
/// has no wet or dry season and every month is transitional.
pub fn seasonal_patterns(grouped: &GroupedPrecipitation) -> SeasonalPatterns {
    let monthly_averages = monthly_averages(grouped);
    seasonal_patterns_from_averages(monthly_averages)
}

pub fn seasonal_patterns_from_averages(monthly_averages: [f64; 12]) -> SeasonalPatterns {
    let (min, max) = min_max(&monthly_averages);
    let all: BTreeSet<usize> = (0..12).collect();

    if max <= min {
        return SeasonalPatterns {
            monthly_averages,
            wet_season: BTreeSet::new(),
            dry_season: BTreeSet::new(),
            transition_periods: all,
            seasonality_index: 0.0,
        };
    }

    let wet_peak = (0..12)
        .find(|m| monthly_averages[*m] == max)
        .unwrap_or(0);
    let wet_season = grow_season(wet_peak, &BTreeSet::new(), |m| {
        monthly_averages[m] > max / 2.0
    });

    let dry_trough = (0..12)
        .filter(|m| monthly_averages[*m] == min && !wet_season.contains(m))
        .max_by_key(|m| (cyclic_distance(*m, wet_peak), std::cmp::Reverse(*m)));
    let dry_season = match dry_trough {
        Some(trough) => grow_season(trough, &wet_season, |m| monthly_averages[m] < 2.0 * min),
        None => BTreeSet::new(),
    };

    let transition_periods = all
        .difference(&wet_season)
        .filter(|m| !dry_season.contains(m))
        .copied()
        .collect();

    SeasonalPatterns {
        monthly_averages,
        wet_season,
        dry_season,
        transition_periods,
        seasonality_index: seasonality_index(&monthly_averages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(p: &SeasonalPatterns) {
        let union: BTreeSet<usize> = p
            .wet_season
            .iter()
            .chain(&p.dry_season)
            .chain(&p.transition_periods)
            .copied()
            .collect();
        assert_eq!(union, (0..12).collect());
        assert!(p.wet_season.is_disjoint(&p.dry_season));
        assert!(p.wet_season.is_disjoint(&p.transition_periods));
        assert!(p.dry_season.is_disjoint(&p.transition_periods));
    }

    #[test]
    fn test_single_wet_month() {
        let mut avgs = [0.0; 12];
        avgs[0] = 300.0;
        let p = seasonal_patterns_from_averages(avgs);
        assert_eq!(p.wet_season, BTreeSet::from([0]));
        assert_eq!(p.dry_season, BTreeSet::from([6]));
        assert_eq!(p.seasonality_index, 1.0);
        assert_partition(&p);
    }

    #[test]
    fn test_southern_summer_regime() {
        // Nov-Mar wet, Jun-Aug very dry; Mar and Nov sit two steps from the peak
        let avgs = [180.0, 160.0, 100.0, 40.0, 10.0, 1.5, 1.0, 1.5, 8.0, 30.0, 95.0, 170.0];
        let p = seasonal_patterns_from_averages(avgs);
        assert_eq!(p.wet_season, BTreeSet::from([0, 1, 2, 10, 11]));
        assert_eq!(p.dry_season, BTreeSet::from([5, 6, 7]));
        assert_eq!(p.transition_periods, BTreeSet::from([3, 4, 8, 9]));
        assert_partition(&p);
    }

    #[test]
    fn test_flat_regime_collapses_to_transition() {
        let p = seasonal_patterns_from_averages([280.0; 12]);
        assert_eq!(p.seasonality_index, 0.0);
        assert!(p.wet_season.is_empty());
        assert!(p.dry_season.is_empty());
        assert_eq!(p.transition_periods.len(), 12);
    }

    #[test]
    fn test_near_flat_regime_stays_disjoint() {
        let avgs = [10.0, 11.0, 12.0, 11.5, 10.5, 10.2, 10.1, 10.3, 10.9, 11.1, 11.7, 10.0];
        let p = seasonal_patterns_from_averages(avgs);
        assert_partition(&p);
        assert_eq!(p.wet_season.len(), 12);
    }

    #[test]
    fn test_all_zero_index() {
        assert_eq!(seasonality_index(&[0.0; 12]), 0.0);
    }
}
