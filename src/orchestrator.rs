//! Borehole Site Analyzer - request orchestration
//!
//! One request turns a field polygon into a `SiteReport`:
//!
//! ```text
//! polygon ─► terrain statistics (shared)
//!              │
//!   ┌──────────┼──────────────────┬───────────────────┐
//!   ▼          ▼                  ▼                   ▼
//! hydrogeology terrain        accessibility    precipitation → potential map
//! + geology
//!   └──────────┴────────┬─────────┴───────────────────┘
//!                       ▼
//!          { depth window ∥ success probability }
//!                       ▼
//!            water budget → viability → report
//! ```
//!
//! Stage failures degrade the report (`is_fallback` / `note`); only invalid
//! geometry and unrecoverable computation errors fail the request, always as
//! `BoreholeSiteFailure`.

use crate::accessibility::{AccessibilityAnalyzer, UnavailableAccessibility};
use crate::borehole::{estimate_depth, DepthInputs, SiteStatistics, SuccessProbabilityModel};
use crate::cache::GeologyScoreCache;
use crate::config::{EngineConfig, RechargeConfig};
use crate::error::{BoreholeSiteFailure, EngineError};
use crate::geology::{elevation_score, GeologyAssessment, GeologyScorer, HydrogeologyLookup};
use crate::potential::PotentialAggregator;
use crate::precipitation::PrecipitationAnalyzer;
use crate::providers::{DataProvider, RetryPolicies, RetryingProvider};
use crate::terrain::{ProviderTerrainAnalyzer, TerrainAnalyzer};
use crate::types::{
    AccessibilityAnalysis, AccessibilitySection, EnvironmentSection, FieldPotentialAnalysis,
    HydroGeologicalFeatures, Polygon, PotentialMapSummary, PrecipitationMetrics, RasterKind,
    ReportMetadata, SiteReport, SlopeStatistics, SuccessAnalysis, ViabilityRating,
    ViabilitySection, WaterSection,
};
use crate::water_budget::WaterBudgetEstimator;
use chrono::Utc;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Terrain result shared by every branch of the first fan-out.
#[derive(Debug, Clone)]
struct TerrainOutcome {
    stats: SlopeStatistics,
    available: bool,
    note: Option<String>,
}

/// `0.5 × success + 30 × potential_mean + 20 × reliability`, within 0-100.
pub fn viability_score(success_probability: f64, potential_mean: f64, reliability_overall: f64) -> f64 {
    let score = 0.5 * success_probability + 30.0 * potential_mean + 20.0 * reliability_overall;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub struct BoreholeSiteAnalyzer {
    provider: Arc<dyn DataProvider>,
    config: Arc<EngineConfig>,
    precipitation: PrecipitationAnalyzer,
    potential: PotentialAggregator,
    geology: GeologyScorer,
    hydrogeology: HydrogeologyLookup,
    terrain: Arc<dyn TerrainAnalyzer>,
    accessibility: Arc<dyn AccessibilityAnalyzer>,
    water_budget: WaterBudgetEstimator,
    success: SuccessProbabilityModel,
}

impl BoreholeSiteAnalyzer {
    /// Wire every component to `provider`, adding per-call timeouts and
    /// retries from `config`. Uses the process-wide geology cache.
    pub fn new(provider: Arc<dyn DataProvider>, config: EngineConfig) -> Self {
        let provider: Arc<dyn DataProvider> =
            Arc::new(RetryingProvider::new(provider, RetryPolicies::from_config(&config)));
        let config = Arc::new(config);

        Self {
            precipitation: PrecipitationAnalyzer::new(Arc::clone(&provider), Arc::clone(&config)),
            potential: PotentialAggregator::new(Arc::clone(&provider), &config),
            geology: GeologyScorer::new(Arc::clone(&provider), GeologyScoreCache::global(), &config),
            hydrogeology: HydrogeologyLookup::new(Arc::clone(&provider), &config),
            terrain: Arc::new(ProviderTerrainAnalyzer::new(Arc::clone(&provider), &config)),
            accessibility: Arc::new(UnavailableAccessibility),
            water_budget: WaterBudgetEstimator::new(config.water_budget.clone()),
            success: SuccessProbabilityModel::default(),
            provider,
            config,
        }
    }

    pub fn with_geology_cache(mut self, cache: Arc<GeologyScoreCache>) -> Self {
        self.geology = GeologyScorer::new(Arc::clone(&self.provider), cache, &self.config);
        self
    }

    /// Seed the RNG behind synthetic precipitation fallbacks.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.precipitation =
            PrecipitationAnalyzer::new(Arc::clone(&self.provider), Arc::clone(&self.config)).with_seed(seed);
        self
    }

    pub fn with_terrain(mut self, terrain: Arc<dyn TerrainAnalyzer>) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Arc<dyn AccessibilityAnalyzer>) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Parse a GeoJSON polygon (Feature or bare geometry) and analyze it.
    pub async fn analyze_geojson(&self, value: &serde_json::Value) -> Result<SiteReport, BoreholeSiteFailure> {
        let polygon = Polygon::from_geojson(value)
            .map_err(|e| BoreholeSiteFailure::new("invalid field polygon", e))?;
        self.analyze(&polygon).await
    }

    pub async fn analyze(&self, polygon: &Polygon) -> Result<SiteReport, BoreholeSiteFailure> {
        let centroid = polygon.centroid();
        if !centroid.is_valid() {
            return Err(BoreholeSiteFailure::new(
                "invalid field polygon",
                EngineError::InvalidGeometry(format!("centroid out of range: ({}, {})", centroid.lat, centroid.lon)),
            ));
        }
        let (lat, lon) = (centroid.lat, centroid.lon);
        let bbox = polygon.bounding_box();
        let area_m2 = polygon.area_m2();
        info!(lat, lon, area_hectares = area_m2 / 10_000.0, provider = self.provider.name(), "Site analysis started");

        // ====================================================================
        // First fan-out
        // ====================================================================
        let terrain = self.terrain_outcome(polygon).boxed().shared();

        let geology_branch = {
            let terrain = terrain.clone();
            async move {
                tokio::join!(self.hydrogeology.lookup(centroid), async move {
                    let slope = terrain.await.stats.mean_slope_deg;
                    self.geology.score(lat, lon, slope).await
                })
            }
        };
        let potential_branch = {
            let terrain = terrain.clone();
            async move {
                let slope = terrain.await.stats.mean_slope_deg;
                let precipitation = self.precipitation.analyze(lat, lon, slope).await;
                let reliability = precipitation
                    .as_ref()
                    .map(|m| m.reliability_scores)
                    .unwrap_or_default();
                let potential = self.potential.aggregate(&bbox, &reliability).await;
                (precipitation, potential)
            }
        };
        let accessibility_branch = async {
            self.accessibility.analyze(polygon).await.unwrap_or_else(|e| {
                warn!(error = %e, "Accessibility analysis failed");
                AccessibilityAnalysis::unavailable(format!("Accessibility analysis failed ({e})"))
            })
        };

        let ((mut hydro, geology), terrain, accessibility, (precipitation, potential)) =
            tokio::join!(geology_branch, terrain, accessibility_branch, potential_branch);
        hydro.geology_score = Some(geology.score);

        // ====================================================================
        // Second fan-out
        // ====================================================================
        let reliability = precipitation.as_ref().map(|m| m.reliability_scores).map_err(Clone::clone);
        let precipitation = precipitation.unwrap_or_else(|e| {
            warn!(lat, lon, error = %e, "Precipitation analysis failed, reporting neutral metrics");
            PrecipitationMetrics::unavailable(format!("Precipitation analysis failed ({e})"))
        });

        let depth_inputs = DepthInputs {
            elevation_m: terrain.stats.mean_elevation_m,
            slope_deg: terrain.stats.mean_slope_deg,
            recharge_efficiency: precipitation.recharge_patterns.efficiency,
        };
        let stats = site_statistics(&terrain, &potential);
        let (depth, success) = tokio::join!(
            async { estimate_depth(&depth_inputs) },
            async { self.success.estimate(centroid, &stats, &Ok(geology.score), &reliability) },
        );

        let water = self
            .water_budget
            .estimate(
                precipitation.average_annual_rainfall_mm,
                area_m2,
                precipitation.recharge_patterns.events.len(),
            )
            .map_err(|e| BoreholeSiteFailure::new("water budget could not be computed", e))?;

        let score = viability_score(success.probability, potential.mean, precipitation.reliability_scores.overall);
        let rating = ViabilityRating::from_score(score);
        let mut factors = viability_factors(&success, &geology, &precipitation, &potential, &hydro, &terrain);
        factors.extend(recharge_limitations(&precipitation, depth.recommended_m, &self.config.recharge));

        info!(
            lat,
            lon,
            score,
            rating = %rating,
            success = success.probability,
            recommended_depth = depth.recommended_m,
            "Site analysis complete"
        );

        Ok(SiteReport {
            viability: ViabilitySection {
                field_potential_analysis: FieldPotentialAnalysis {
                    score,
                    rating,
                    success_probability: success.probability,
                    groundwater_potential_mean: potential.mean,
                    recommended_depth_m: depth.recommended_m,
                    area_hectares: polygon.area_hectares(),
                    factors,
                },
            },
            environment: EnvironmentSection {
                precipitation,
                water: WaterSection {
                    water_availability: water,
                    borehole_depth_analysis: depth,
                    borehole_success_analysis: success,
                },
                hydro_geological_features: hydro,
                potential_map: potential,
            },
            accessibility: AccessibilitySection {
                accessibility_analysis: accessibility,
            },
            metadata: ReportMetadata {
                generated_at: Utc::now().timestamp_millis(),
                centroid,
                area_hectares: polygon.area_hectares(),
                provider: self.provider.name().to_string(),
            },
        })
    }

    async fn terrain_outcome(&self, polygon: &Polygon) -> TerrainOutcome {
        match self.terrain.slope_statistics(polygon).await {
            Ok(stats) => TerrainOutcome {
                stats,
                available: true,
                note: None,
            },
            Err(e) => {
                warn!(error = %e, "Terrain statistics unavailable, assuming flat terrain");
                TerrainOutcome {
                    stats: SlopeStatistics::flat(0.0),
                    available: false,
                    note: Some(format!("Terrain statistics unavailable ({e}); flat terrain assumed")),
                }
            }
        }
    }
}

/// Normalized statistics for the success model. Terrain elevation is only
/// used when terrain data was available; soil and temperature come from the
/// potential-map layers that were actually fetched.
fn site_statistics(terrain: &TerrainOutcome, potential: &PotentialMapSummary) -> SiteStatistics {
    SiteStatistics {
        elevation: terrain
            .available
            .then(|| elevation_score(terrain.stats.mean_elevation_m)),
        soil: potential.layer_means.get(&RasterKind::SoilMoisture).copied(),
        temp: potential.layer_means.get(&RasterKind::Temperature).copied(),
    }
}

fn viability_factors(
    success: &SuccessAnalysis,
    geology: &GeologyAssessment,
    precipitation: &PrecipitationMetrics,
    potential: &PotentialMapSummary,
    hydro: &HydroGeologicalFeatures,
    terrain: &TerrainOutcome,
) -> Vec<String> {
    let mut factors = vec![
        format!("Drilling success probability {:.0}%", success.probability),
        format!("Geology score {:.2}", geology.score),
        format!(
            "Precipitation reliability {:.2} (recharge efficiency {:.2})",
            precipitation.reliability_scores.overall, precipitation.recharge_patterns.efficiency
        ),
        format!("Average annual rainfall {:.0} mm", precipitation.average_annual_rainfall_mm),
        format!("Groundwater potential mean {:.2}", potential.mean),
    ];
    if let Some(rock) = &hydro.dominant_rock_type {
        factors.push(format!(
            "Dominant rock type {rock}; {} aquifer formation(s), {} fracture feature(s) nearby",
            hydro.aquifer_formations, hydro.fracture_count
        ));
    }

    let notes = [
        precipitation.note.as_deref(),
        precipitation.recharge_patterns.note.as_deref(),
        geology.note.as_deref(),
        success.note.as_deref(),
        potential.note.as_deref(),
        hydro.note.as_deref(),
        terrain.note.as_deref(),
    ];
    factors.extend(notes.into_iter().flatten().map(str::to_string));
    factors
}

/// Notes for a site that falls short of the recharge minimums.
///
/// Skipped for checks whose input is missing (no annual metrics, no events).
fn recharge_limitations(
    precipitation: &PrecipitationMetrics,
    recommended_depth_m: f64,
    config: &RechargeConfig,
) -> Vec<String> {
    let mut notes = Vec::new();
    if !precipitation.annual_metrics.is_empty()
        && precipitation.average_annual_rainfall_mm < config.min_annual_rainfall_mm
    {
        notes.push(format!(
            "Average annual rainfall {:.0} mm is below the {:.0} mm needed for sustained recharge",
            precipitation.average_annual_rainfall_mm, config.min_annual_rainfall_mm
        ));
    }

    let largest_event = precipitation
        .recharge_patterns
        .events
        .iter()
        .map(|e| e.amount)
        .fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))));
    if let Some(largest) = largest_event {
        if largest < config.infiltration_rate_min {
            notes.push(format!(
                "Largest recharge event {largest:.1} mm is below the {:.0} mm infiltration minimum",
                config.infiltration_rate_min
            ));
        }
    }

    if recommended_depth_m < config.bedrock_depth_min_m {
        notes.push(format!(
            "Recommended depth {recommended_depth_m:.0} m is shallower than the {:.0} m bedrock minimum; yield may be seasonal",
            config.bedrock_depth_min_m
        ));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnnualMetric, RechargeEvent};

    fn metrics_with(avg_annual_mm: f64, event_amounts: &[f64]) -> PrecipitationMetrics {
        let mut m = PrecipitationMetrics::unavailable("test");
        m.annual_metrics = vec![AnnualMetric {
            year: 2020,
            total_rainfall: avg_annual_mm,
            average_monthly: avg_annual_mm / 12.0,
            variability_coefficient: 0.0,
            dry_month_count: 0,
        }];
        m.average_annual_rainfall_mm = avg_annual_mm;
        m.recharge_patterns.events = event_amounts
            .iter()
            .enumerate()
            .map(|(i, a)| RechargeEvent {
                timestamp: i as i64,
                amount: *a,
            })
            .collect();
        m
    }

    #[test]
    fn test_recharge_limitations() {
        let config = RechargeConfig::default();

        let ok = metrics_with(800.0, &[12.0, 25.0]);
        assert!(recharge_limitations(&ok, 60.0, &config).is_empty());

        let dry = metrics_with(150.0, &[4.0, 6.0]);
        let notes = recharge_limitations(&dry, 25.0, &config);
        assert_eq!(notes.len(), 3);
        assert!(notes[0].contains("below the 200 mm"));
        assert!(notes[1].contains("6.0 mm"));
        assert!(notes[2].contains("30 m bedrock minimum"));

        // no annual metrics and no events: nothing to judge
        let unavailable = PrecipitationMetrics::unavailable("down");
        assert!(recharge_limitations(&unavailable, 60.0, &config).is_empty());
    }

    #[test]
    fn test_viability_score_formula() {
        assert!((viability_score(60.0, 0.5, 0.5) - (30.0 + 15.0 + 10.0)).abs() < 1e-12);
        assert_eq!(viability_score(100.0, 1.0, 1.0), 100.0);
        assert_eq!(viability_score(0.0, 0.0, 0.0), 0.0);
        assert_eq!(viability_score(f64::NAN, 0.5, 0.5), 0.0);
    }
}
