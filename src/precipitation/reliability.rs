//! Reliability scores derived from seasonality, trend and recharge

use crate::types::{RechargePatterns, ReliabilityScores, SeasonalPatterns, TrendAnalysis};

pub fn reliability_scores(
    seasonal: &SeasonalPatterns,
    trends: &TrendAnalysis,
    recharge: &RechargePatterns,
) -> ReliabilityScores {
    let seasonal_score = unit(1.0 - seasonal.seasonality_index);
    let trend_score = unit(1.0 - trends.long_term_slope.abs());
    let recharge_score = unit(recharge.efficiency);
    ReliabilityScores {
        overall: (seasonal_score + trend_score + recharge_score) / 3.0,
        seasonal: seasonal_score,
        trend: trend_score,
        recharge: recharge_score,
    }
}

fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
