//! Groundwater Potential Aggregator
//!
//! Normalizes terrain and climate layers over the field's bounding box,
//! adds a constant precipitation layer equal to the overall reliability,
//! and publishes their weighted sum through the provider's raster service.
//!
//! | Layer | Normalized from |
//! |---|---|
//! | elevation | 0-3000 m |
//! | slope | 0-45° |
//! | soil moisture | 0-1 |
//! | temperature | 250-350 K |
//! | landcover, geology | 0-1 (zero when unavailable) |
//! | precipitation | reliability overall |

use crate::config::EngineConfig;
use crate::providers::DataProvider;
use crate::providers::PotentialSurface;
use crate::types::{
    BoundingBox, PotentialMapSummary, PotentialWeights, RasterKind, RasterLayer, ReliabilityScores,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Reliability above which precipitation gains weight.
const HIGH_RELIABILITY: f64 = 0.8;

/// Reliability below which precipitation loses weight.
const LOW_RELIABILITY: f64 = 0.4;

const WEIGHT_SHIFT: f64 = 0.05;

/// Layers fetched from the provider; precipitation is synthesized locally.
const FETCHED_LAYERS: [RasterKind; 6] = [
    RasterKind::Elevation,
    RasterKind::Slope,
    RasterKind::SoilMoisture,
    RasterKind::Temperature,
    RasterKind::Landcover,
    RasterKind::Geology,
];

/// Raw value range mapped onto [0, 1].
pub fn normalization_range(kind: RasterKind) -> (f64, f64) {
    match kind {
        RasterKind::Elevation => (0.0, 3_000.0),
        RasterKind::Slope => (0.0, 45.0),
        RasterKind::Temperature => (250.0, 350.0),
        RasterKind::SoilMoisture | RasterKind::Landcover | RasterKind::Geology | RasterKind::Precipitation => {
            (0.0, 1.0)
        }
    }
}

/// Default weights, shifted 0.05 towards (reliability > 0.8) or away from
/// (reliability < 0.4) precipitation; the difference is spread evenly over
/// the other layers so the total stays 1.
pub fn dynamic_weights(overall_reliability: f64) -> PotentialWeights {
    let mut weights = PotentialWeights::default();
    let shift = if overall_reliability > HIGH_RELIABILITY {
        WEIGHT_SHIFT
    } else if overall_reliability < LOW_RELIABILITY {
        -WEIGHT_SHIFT
    } else {
        return weights;
    };

    let others = RasterKind::ALL.len() - 1;
    for kind in RasterKind::ALL {
        let w = weights.get_mut(kind);
        if kind == RasterKind::Precipitation {
            *w += shift;
        } else {
            *w -= shift / others as f64;
        }
    }
    weights
}

pub struct PotentialAggregator {
    provider: Arc<dyn DataProvider>,
    grid: usize,
}

impl PotentialAggregator {
    pub fn new(provider: Arc<dyn DataProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            grid: config.providers.raster_grid_size.max(1),
        }
    }

    /// Normalized input layers. Unavailable or malformed layers become zero
    /// layers; their kinds are returned alongside.
    pub async fn normalized_layers(
        &self,
        bbox: &BoundingBox,
        reliability: &ReliabilityScores,
    ) -> (Vec<RasterLayer>, Vec<RasterKind>) {
        let grid = self.grid;
        let fetched = join_all(
            FETCHED_LAYERS
                .iter()
                .map(|kind| self.provider.fetch_raster_layer(*kind, bbox, grid)),
        )
        .await;

        let mut missing = Vec::new();
        let mut layers: Vec<RasterLayer> = FETCHED_LAYERS
            .iter()
            .zip(fetched)
            .map(|(kind, result)| match result {
                Ok(layer) if layer.is_well_formed() && layer.rows == grid && layer.cols == grid => {
                    let (lo, hi) = normalization_range(*kind);
                    layer.normalized(lo, hi)
                }
                Ok(layer) => {
                    warn!(layer = %kind, rows = layer.rows, cols = layer.cols, "Raster layer has wrong shape, using zero layer");
                    missing.push(*kind);
                    RasterLayer::constant(*kind, *bbox, grid, grid, 0.0)
                }
                Err(e) => {
                    if !matches!(kind, RasterKind::Landcover | RasterKind::Geology) {
                        warn!(layer = %kind, error = %e, "Raster layer unavailable, using zero layer");
                    }
                    missing.push(*kind);
                    RasterLayer::constant(*kind, *bbox, grid, grid, 0.0)
                }
            })
            .collect();

        layers.push(RasterLayer::constant(
            RasterKind::Precipitation,
            *bbox,
            grid,
            grid,
            reliability.overall.clamp(0.0, 1.0),
        ));
        (layers, missing)
    }

    pub async fn aggregate(&self, bbox: &BoundingBox, reliability: &ReliabilityScores) -> PotentialMapSummary {
        let weights = dynamic_weights(reliability.overall);
        let (layers, missing) = self.normalized_layers(bbox, reliability).await;
        let layer_means: BTreeMap<RasterKind, f64> = layers
            .iter()
            .filter(|l| !missing.contains(&l.kind))
            .map(|l| (l.kind, l.mean()))
            .collect();

        let mut notes = Vec::new();
        let core_missing: Vec<String> = missing
            .iter()
            .filter(|k| !matches!(k, RasterKind::Landcover | RasterKind::Geology))
            .map(ToString::to_string)
            .collect();
        if !core_missing.is_empty() {
            notes.push(format!("Layers unavailable, treated as zero: {}", core_missing.join(", ")));
        }

        let (mean, min, max) = match PotentialSurface::compose(&layers, &weights, bbox) {
            Ok(surface) => (surface.mean(), surface.min(), surface.max()),
            Err(e) => {
                warn!(error = %e, "Potential surface could not be composed");
                notes.push(format!("Potential surface unavailable ({e})"));
                (0.0, 0.0, 0.0)
            }
        };

        let handle = match self.provider.produce_potential_raster(&layers, &weights, bbox).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Raster service failed to publish potential surface");
                notes.push(format!("Potential map not published ({e})"));
                None
            }
        };

        let is_fallback = handle.is_none() || !core_missing.is_empty();
        info!(
            mean,
            min,
            max,
            precipitation_weight = weights.precipitation,
            handle = handle.as_ref().map_or("none", |h| h.0.as_str()),
            is_fallback,
            "Groundwater potential aggregated"
        );

        PotentialMapSummary {
            handle,
            weights,
            mean,
            min,
            max,
            layer_means,
            is_fallback,
            note: (!notes.is_empty()).then(|| notes.join("; ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Capability, SyntheticProvider};

    fn bbox() -> BoundingBox {
        BoundingBox { min_lon: 31.0, min_lat: -17.81, max_lon: 31.01, max_lat: -17.8 }
    }

    fn reliability(overall: f64) -> ReliabilityScores {
        ReliabilityScores { overall, ..ReliabilityScores::default() }
    }

    #[test]
    fn test_weights_unchanged_in_mid_band() {
        assert_eq!(dynamic_weights(0.6), PotentialWeights::default());
        assert_eq!(dynamic_weights(0.8), PotentialWeights::default());
        assert_eq!(dynamic_weights(0.4), PotentialWeights::default());
    }

    #[test]
    fn test_high_reliability_favours_precipitation() {
        let w = dynamic_weights(0.9);
        assert!((w.precipitation - 0.25).abs() < 1e-12);
        assert!((w.elevation - (0.15 - 0.05 / 6.0)).abs() < 1e-12);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_low_reliability_redistributes() {
        let w = dynamic_weights(0.1);
        assert!((w.precipitation - 0.15).abs() < 1e-12);
        assert!((w.geology - (0.20 + 0.05 / 6.0)).abs() < 1e-12);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_aggregate_publishes_surface() {
        let provider = Arc::new(SyntheticProvider::new(1).with_terrain(1_500.0, 9.0).with_climate(0.5, 300.0));
        let store = provider.raster_store();
        let aggregator = PotentialAggregator::new(provider, &EngineConfig::default());
        let summary = aggregator.aggregate(&bbox(), &reliability(0.6)).await;

        let handle = summary.handle.clone().unwrap();
        assert!(handle.0.starts_with("potential-"));
        assert!(store.get(&handle).is_some());
        // landcover and geology rasters are absent, which is not a degradation
        assert!(!summary.is_fallback);
        assert!(!summary.layer_means.contains_key(&RasterKind::Landcover));
        assert!((summary.layer_means[&RasterKind::Temperature] - 0.5).abs() < 1e-9);
        assert!((summary.layer_means[&RasterKind::Slope] - 0.2).abs() < 1e-9);
        assert!((summary.layer_means[&RasterKind::Precipitation] - 0.6).abs() < 1e-12);
        assert!(summary.min <= summary.mean && summary.mean <= summary.max);
        assert!((0.0..=1.0).contains(&summary.mean));
    }

    #[tokio::test]
    async fn test_raster_service_failure_flags_fallback() {
        let provider = Arc::new(SyntheticProvider::new(1).with_failure(Capability::PotentialRaster));
        let aggregator = PotentialAggregator::new(provider, &EngineConfig::default());
        let summary = aggregator.aggregate(&bbox(), &reliability(0.5)).await;
        assert!(summary.handle.is_none());
        assert!(summary.is_fallback);
        assert!(summary.note.unwrap().contains("not published"));
        assert!(summary.mean > 0.0);
    }
}
