//! Geology suitability score
//!
//! Five sub-scores in [0, 1], combined with fixed weights:
//!
//! | Sub-score | Weight | Source |
//! |---|---|---|
//! | aquifer presence | 0.4 | formations |
//! | rock hardness | 0.2 | formations + feature tags |
//! | fracture zones | 0.2 | features |
//! | elevation | 0.1 | point elevation |
//! | slope | 0.1 | mean slope |
//!
//! Scores are cached by coordinates rounded to 4 decimals. Failed lookups
//! yield 0.5 and are not cached.

use super::hardness::{classify_rock, hardness_of, is_aquifer_rock, UNKNOWN_HARDNESS};
use crate::cache::{CoordKey, GeologyScoreCache, KeyValueCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::providers::DataProvider;
use crate::types::{GeologicalFeature, GeologicalFormation, GeologySubScores};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Score used when geology inputs cannot be fetched.
pub const FALLBACK_GEOLOGY_SCORE: f64 = 0.5;

const AQUIFER_WEIGHT: f64 = 0.4;
const HARDNESS_WEIGHT: f64 = 0.2;
const FRACTURE_WEIGHT: f64 = 0.2;
const ELEVATION_WEIGHT: f64 = 0.1;
const SLOPE_WEIGHT: f64 = 0.1;

pub fn aquifer_presence(formations: &[GeologicalFormation]) -> f64 {
    if formations.is_empty() {
        return 0.0;
    }
    let aquifers = formations
        .iter()
        .filter(|f| is_aquifer_rock(&f.formation_type))
        .count();
    aquifers as f64 / formations.len() as f64
}

/// Hardness composite for one formation: table lookup, then a geology tag
/// on a nearby feature, then the unknown default.
fn formation_hardness(formation: &GeologicalFormation, features: &[GeologicalFeature]) -> f64 {
    let direct = classify_rock(&formation.formation_type).and_then(hardness_of);
    let secondary = || {
        features
            .iter()
            .filter_map(GeologicalFeature::rock_type)
            .filter_map(classify_rock)
            .find_map(hardness_of)
    };
    direct
        .or_else(secondary)
        .map_or(UNKNOWN_HARDNESS, |h| h.composite())
}

/// `1 − coverage-weighted hardness`, so softer rock scores higher.
pub fn rock_hardness(formations: &[GeologicalFormation], features: &[GeologicalFeature]) -> f64 {
    let total_coverage: f64 = formations.iter().map(GeologicalFormation::coverage).sum();
    if total_coverage <= 0.0 {
        return 1.0 - UNKNOWN_HARDNESS;
    }
    let weighted: f64 = formations
        .iter()
        .map(|f| formation_hardness(f, features) * f.coverage())
        .sum();
    (1.0 - weighted / total_coverage).clamp(0.0, 1.0)
}

pub fn fracture_zones(features: &[GeologicalFeature]) -> f64 {
    if features.is_empty() {
        return 0.0;
    }
    let fractures = features.iter().filter(|f| f.tag == "fracture").count();
    fractures as f64 / features.len() as f64
}

pub fn elevation_score(elevation_m: f64) -> f64 {
    (1.0 - elevation_m / 1_000.0).clamp(0.0, 1.0)
}

pub fn slope_score(mean_slope_deg: f64) -> f64 {
    (1.0 - mean_slope_deg / 45.0).clamp(0.0, 1.0)
}

pub fn sub_scores(
    formations: &[GeologicalFormation],
    features: &[GeologicalFeature],
    elevation_m: f64,
    mean_slope_deg: f64,
) -> GeologySubScores {
    GeologySubScores {
        aquifer_presence: aquifer_presence(formations),
        rock_hardness: rock_hardness(formations, features),
        fracture_zones: fracture_zones(features),
        elevation: elevation_score(elevation_m),
        slope: slope_score(mean_slope_deg),
    }
}

pub fn composite_score(s: &GeologySubScores) -> f64 {
    let score = AQUIFER_WEIGHT * s.aquifer_presence
        + HARDNESS_WEIGHT * s.rock_hardness
        + FRACTURE_WEIGHT * s.fracture_zones
        + ELEVATION_WEIGHT * s.elevation
        + SLOPE_WEIGHT * s.slope;
    score.clamp(0.0, 1.0)
}

/// Outcome of a scoring request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeologyAssessment {
    pub score: f64,
    /// Absent on cache hits and fallbacks
    pub sub_scores: Option<GeologySubScores>,
    pub cached: bool,
    pub is_fallback: bool,
    pub note: Option<String>,
}

pub struct GeologyScorer {
    provider: Arc<dyn DataProvider>,
    cache: Arc<GeologyScoreCache>,
    formation_radius_km: f64,
    feature_radius_m: f64,
}

impl GeologyScorer {
    pub fn new(provider: Arc<dyn DataProvider>, cache: Arc<GeologyScoreCache>, config: &EngineConfig) -> Self {
        Self {
            provider,
            cache,
            formation_radius_km: config.providers.formation_radius_km,
            feature_radius_m: config.providers.feature_radius_m,
        }
    }

    /// Fetch inputs and compute the score, bypassing the cache.
    pub async fn compute(&self, lat: f64, lon: f64, mean_slope_deg: f64) -> EngineResult<GeologySubScores> {
        let (formations, features, elevation) = tokio::join!(
            self.provider.fetch_geological_formations(lat, lon, self.formation_radius_km),
            self.provider.fetch_geological_features(lat, lon, self.feature_radius_m),
            self.provider.fetch_point_elevation(lat, lon),
        );
        let formations = formations?;
        let elevation = elevation?;
        // Features only refine the score
        let features = features.unwrap_or_else(|e| {
            warn!(lat, lon, error = %e, "Geological features unavailable, scoring without them");
            Vec::new()
        });

        let scores = sub_scores(&formations, &features, elevation.elevation_m, mean_slope_deg);
        if !composite_score(&scores).is_finite() {
            return Err(EngineError::computation("geology", "non-finite geology score"));
        }
        Ok(scores)
    }

    /// Cached score for a point; never fails.
    pub async fn score(&self, lat: f64, lon: f64, mean_slope_deg: f64) -> GeologyAssessment {
        let key = CoordKey::new(lat, lon);
        if let Some(score) = self.cache.get(&key).await {
            debug!(key = %key, score, "Geology score cache hit");
            return GeologyAssessment {
                score,
                sub_scores: None,
                cached: true,
                is_fallback: false,
                note: None,
            };
        }

        match self.compute(lat, lon, mean_slope_deg).await {
            Ok(sub) => {
                let score = composite_score(&sub);
                self.cache.set(key, score, None).await;
                info!(
                    key = %key,
                    score,
                    aquifer = sub.aquifer_presence,
                    hardness = sub.rock_hardness,
                    fractures = sub.fracture_zones,
                    "Geology score computed"
                );
                GeologyAssessment {
                    score,
                    sub_scores: Some(sub),
                    cached: false,
                    is_fallback: false,
                    note: None,
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, fallback = FALLBACK_GEOLOGY_SCORE, "Geology scoring failed, using fallback");
                GeologyAssessment {
                    score: FALLBACK_GEOLOGY_SCORE,
                    sub_scores: None,
                    cached: false,
                    is_fallback: true,
                    note: Some(format!("Geology data unavailable ({e}); default score used")),
                }
            }
        }
    }
}
