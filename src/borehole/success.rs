//! Drilling success probability
//!
//! Weighted sum of normalized site statistics, the geology score and the
//! overall precipitation reliability, scaled to 0-100. When an input stage
//! failed the model returns a calibrated default for that cause instead.

use crate::error::EngineError;
use crate::types::{Coordinate, ProbabilityFallback, ReliabilityScores, SuccessAnalysis};
use tracing::{debug, warn};

/// Neutral score substituted for a failed input in the reported breakdown.
const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessWeights {
    pub elevation: f64,
    pub soil: f64,
    pub temp: f64,
    pub geology: f64,
    pub precipitation: f64,
}

impl Default for SuccessWeights {
    fn default() -> Self {
        Self {
            elevation: 0.15,
            soil: 0.20,
            temp: 0.15,
            geology: 0.25,
            precipitation: 0.25,
        }
    }
}

/// Site statistics in [0, 1]; absent values are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SiteStatistics {
    /// Elevation score, 1 at sea level
    pub elevation: Option<f64>,
    /// Soil moisture fraction
    pub soil: Option<f64>,
    /// Normalized temperature
    pub temp: Option<f64>,
}

/// Which upstream stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStage {
    Geology,
    Precipitation,
}

/// Map a failed input to its calibrated fallback. Transport failures take
/// precedence over the stage they occurred in.
pub fn classify_failure(error: &EngineError, stage: InputStage) -> ProbabilityFallback {
    match (error, stage) {
        (EngineError::InvalidGeometry(_), _) => ProbabilityFallback::InvalidCoordinates,
        (e, _) if e.is_network() => ProbabilityFallback::Network,
        (EngineError::ComputationError { .. } | EngineError::DataUnavailable { .. }, InputStage::Geology) => {
            ProbabilityFallback::Geology
        }
        (EngineError::ComputationError { .. } | EngineError::DataUnavailable { .. }, InputStage::Precipitation) => {
            ProbabilityFallback::Precipitation
        }
        _ => ProbabilityFallback::Other,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuccessProbabilityModel {
    weights: SuccessWeights,
}

impl SuccessProbabilityModel {
    pub fn new(weights: SuccessWeights) -> Self {
        Self { weights }
    }

    pub fn estimate(
        &self,
        point: Coordinate,
        stats: &SiteStatistics,
        geology: &Result<f64, EngineError>,
        precipitation: &Result<ReliabilityScores, EngineError>,
    ) -> SuccessAnalysis {
        let geology_score = geology.as_ref().copied().unwrap_or(NEUTRAL_SCORE);
        let reliability = precipitation.as_ref().map_or(NEUTRAL_SCORE, |r| r.overall);

        if !point.is_valid() {
            return Self::fallback(
                ProbabilityFallback::InvalidCoordinates,
                geology_score,
                reliability,
                format!("Coordinates out of range: ({}, {})", point.lat, point.lon),
            );
        }
        if let Err(e) = geology {
            return Self::fallback(classify_failure(e, InputStage::Geology), geology_score, reliability, e.to_string());
        }
        if let Err(e) = precipitation {
            return Self::fallback(
                classify_failure(e, InputStage::Precipitation),
                geology_score,
                reliability,
                e.to_string(),
            );
        }

        let w = &self.weights;
        let mut contributions: Vec<(String, f64)> = [
            ("elevation", stats.elevation, w.elevation),
            ("soil", stats.soil, w.soil),
            ("temp", stats.temp, w.temp),
        ]
        .into_iter()
        .filter_map(|(name, value, weight)| {
            value
                .filter(|v| v.is_finite())
                .map(|v| (name.to_string(), v * weight))
        })
        .collect();
        contributions.push(("geology".to_string(), geology_score * w.geology));
        contributions.push(("precipitation".to_string(), reliability * w.precipitation));

        let probability = 100.0 * contributions.iter().map(|(_, c)| c).sum::<f64>();
        if !probability.is_finite() {
            return Self::fallback(
                ProbabilityFallback::Other,
                geology_score,
                reliability,
                "non-finite success probability".to_string(),
            );
        }

        let probability = probability.clamp(0.0, 100.0);
        debug!(lat = point.lat, lon = point.lon, probability, geology_score, reliability, "Success probability estimated");
        SuccessAnalysis {
            probability,
            geology_score,
            precipitation_reliability: reliability,
            contributions,
            fallback: None,
            note: None,
        }
    }

    fn fallback(cause: ProbabilityFallback, geology_score: f64, reliability: f64, reason: String) -> SuccessAnalysis {
        let probability = cause.default_probability();
        warn!(?cause, probability, reason = %reason, "Success probability using calibrated default");
        SuccessAnalysis {
            probability,
            geology_score,
            precipitation_reliability: reliability,
            contributions: Vec::new(),
            fallback: Some(cause),
            note: Some(format!("Default success probability used: {reason}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reliability(overall: f64) -> ReliabilityScores {
        ReliabilityScores { overall, ..ReliabilityScores::default() }
    }

    fn origin() -> Coordinate {
        Coordinate::new(0.0, 0.0)
    }

    #[test]
    fn test_weighted_sum() {
        let stats = SiteStatistics {
            elevation: Some(1.0),
            soil: Some(0.5),
            temp: Some(0.4),
        };
        let a = SuccessProbabilityModel::default().estimate(origin(), &stats, &Ok(0.5), &Ok(reliability(0.6)));
        let expected = 100.0 * (0.15 + 0.10 + 0.06 + 0.125 + 0.15);
        assert!((a.probability - expected).abs() < 1e-9);
        assert_eq!(a.contributions.len(), 5);
        assert!(a.fallback.is_none());
    }

    #[test]
    fn test_missing_stats_are_skipped() {
        let a = SuccessProbabilityModel::default().estimate(
            origin(),
            &SiteStatistics::default(),
            &Ok(1.0),
            &Ok(reliability(1.0)),
        );
        assert!((a.probability - 50.0).abs() < 1e-9);
        assert_eq!(a.contributions.len(), 2);
    }

    #[test]
    fn test_invalid_coordinates_default_to_fifty() {
        let a = SuccessProbabilityModel::default().estimate(
            Coordinate::new(500.0, 0.0),
            &SiteStatistics::default(),
            &Ok(0.9),
            &Ok(reliability(0.9)),
        );
        assert_eq!(a.probability, 50.0);
        assert_eq!(a.fallback, Some(ProbabilityFallback::InvalidCoordinates));
    }

    #[test]
    fn test_failure_causes() {
        let model = SuccessProbabilityModel::default();
        let stats = SiteStatistics::default();

        let network = EngineError::Timeout { provider: "archive".into(), after_ms: 20_000 };
        let a = model.estimate(origin(), &stats, &Ok(0.5), &Err(network));
        assert_eq!(a.probability, 45.0);

        let geology = EngineError::computation("geology", "bad table");
        let a = model.estimate(origin(), &stats, &Err(geology), &Ok(reliability(0.5)));
        assert_eq!(a.probability, 40.0);

        let precip = EngineError::computation("precipitation", "no records");
        let a = model.estimate(origin(), &stats, &Ok(0.5), &Err(precip));
        assert_eq!(a.probability, 42.0);
        assert_eq!(a.fallback, Some(ProbabilityFallback::Precipitation));

        let cache = EngineError::CacheError("poisoned".into());
        assert_eq!(classify_failure(&cache, InputStage::Geology), ProbabilityFallback::Other);
    }

    #[test]
    fn test_probability_clamped() {
        let stats = SiteStatistics {
            elevation: Some(5.0),
            soil: Some(5.0),
            temp: Some(5.0),
        };
        let a = SuccessProbabilityModel::default().estimate(origin(), &stats, &Ok(5.0), &Ok(reliability(5.0)));
        assert_eq!(a.probability, 100.0);
    }
}
