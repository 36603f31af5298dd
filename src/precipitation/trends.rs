//! Long-term trend, year-over-year change and multi-year cycles

use crate::types::{
    CycleAnalysis, CycleExtreme, ExtremeKind, GroupedPrecipitation, TrendAnalysis,
    YearOverYearChange,
};

/// Annual totals in year order.
pub fn annual_totals(grouped: &GroupedPrecipitation) -> Vec<(i32, f64)> {
    grouped
        .years()
        .map(|year| (year, grouped.monthly_totals(year).iter().sum()))
        .collect()
}

pub fn trend_analysis(grouped: &GroupedPrecipitation) -> TrendAnalysis {
    let totals = annual_totals(grouped);
    TrendAnalysis {
        long_term_slope: least_squares_slope(&totals),
        year_over_year_changes: year_over_year(&totals),
        cycle_analysis: cycle_analysis(&totals),
    }
}

/// Ordinary least-squares slope of `(year, total)`; 0 with fewer than two
/// points or no spread in years.
pub fn least_squares_slope(points: &[(i32, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|(x, _)| f64::from(*x)).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| *y).sum::<f64>() / n;
    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = f64::from(*x) - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn year_over_year(totals: &[(i32, f64)]) -> Vec<YearOverYearChange> {
    totals
        .windows(2)
        .map(|w| {
            let (from_year, prev) = w[0];
            let (to_year, curr) = w[1];
            let absolute_change = curr - prev;
            YearOverYearChange {
                from_year,
                to_year,
                absolute_change,
                percent_change: (prev > 0.0).then(|| absolute_change / prev * 100.0),
            }
        })
        .collect()
}

/// Strict local extrema of annual totals. `None` below three years.
pub fn cycle_analysis(totals: &[(i32, f64)]) -> Option<CycleAnalysis> {
    if totals.len() < 3 {
        return None;
    }

    let extremes: Vec<CycleExtreme> = totals
        .windows(3)
        .filter_map(|w| {
            let (prev, (year, curr), next) = (w[0].1, w[1], w[2].1);
            let kind = if curr > prev && curr > next {
                ExtremeKind::Peak
            } else if curr < prev && curr < next {
                ExtremeKind::Trough
            } else {
                return None;
            };
            Some(CycleExtreme {
                year,
                kind,
                total_rainfall: curr,
            })
        })
        .collect();

    let peaks = extremes
        .iter()
        .filter(|e| e.kind == ExtremeKind::Peak)
        .map(|e| e.year)
        .collect();
    let troughs = extremes
        .iter()
        .filter(|e| e.kind == ExtremeKind::Trough)
        .map(|e| e.year)
        .collect();

    // Keep the first of any run of same-kind extremes so the sequence alternates
    let mut alternating: Vec<&CycleExtreme> = Vec::new();
    for e in &extremes {
        if alternating.last().map_or(true, |last| last.kind != e.kind) {
            alternating.push(e);
        }
    }
    let intervals: Vec<f64> = alternating
        .windows(2)
        .map(|w| f64::from(w[1].year - w[0].year))
        .collect();
    let average_cycle_length =
        (!intervals.is_empty()).then(|| intervals.iter().sum::<f64>() / intervals.len() as f64);

    Some(CycleAnalysis {
        peaks,
        troughs,
        extremes,
        average_cycle_length,
    })
}
