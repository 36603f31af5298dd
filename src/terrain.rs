//! Terrain analysis
//!
//! Slope statistics over the field. The engine only depends on the
//! `TerrainAnalyzer` trait; `ProviderTerrainAnalyzer` derives the numbers
//! from the data provider's elevation grid and mean-slope service.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::providers::DataProvider;
use crate::types::{Polygon, RasterKind, SlopeStatistics};
use async_trait::async_trait;
use statrs::statistics::Statistics;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait TerrainAnalyzer: Send + Sync {
    async fn slope_statistics(&self, polygon: &Polygon) -> EngineResult<SlopeStatistics>;
}

pub struct ProviderTerrainAnalyzer {
    provider: Arc<dyn DataProvider>,
    grid: usize,
}

impl ProviderTerrainAnalyzer {
    pub fn new(provider: Arc<dyn DataProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            grid: config.providers.raster_grid_size.max(1),
        }
    }
}

#[async_trait]
impl TerrainAnalyzer for ProviderTerrainAnalyzer {
    /// The provider's mean slope is authoritative; the elevation grid adds
    /// spread and mean elevation. Either source alone is enough.
    async fn slope_statistics(&self, polygon: &Polygon) -> EngineResult<SlopeStatistics> {
        let bbox = polygon.bounding_box();
        let centroid = polygon.centroid();
        let (elevation, mean_slope) = tokio::join!(
            self.provider.fetch_raster_layer(RasterKind::Elevation, &bbox, self.grid),
            self.provider.mean_slope(polygon),
        );

        let elevation = elevation.ok().filter(|l| l.is_well_formed());
        let mean_slope = mean_slope
            .map_err(|e| warn!(error = %e, "Mean slope unavailable, deriving from elevation grid"))
            .ok();

        let stats = match (elevation, mean_slope) {
            (Some(grid), mean) => {
                let slopes = grid.slope_degrees().values;
                let mean_slope_deg = mean.unwrap_or_else(|| slopes.iter().mean());
                SlopeStatistics {
                    mean_slope_deg,
                    min_slope_deg: slopes.iter().copied().fold(f64::INFINITY, f64::min).min(mean_slope_deg),
                    max_slope_deg: slopes.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(mean_slope_deg),
                    std_dev_deg: if slopes.len() > 1 { slopes.iter().population_std_dev() } else { 0.0 },
                    mean_elevation_m: grid.mean(),
                }
            }
            (None, Some(mean)) => {
                let elevation = self
                    .provider
                    .fetch_point_elevation(centroid.lat, centroid.lon)
                    .await?;
                SlopeStatistics {
                    mean_slope_deg: mean,
                    min_slope_deg: mean,
                    max_slope_deg: mean,
                    std_dev_deg: 0.0,
                    mean_elevation_m: elevation.elevation_m,
                }
            }
            (None, None) => {
                return Err(EngineError::data_unavailable(
                    self.provider.name(),
                    "neither an elevation grid nor a mean slope could be fetched",
                ));
            }
        };

        info!(
            mean_slope = stats.mean_slope_deg,
            max_slope = stats.max_slope_deg,
            mean_elevation = stats.mean_elevation_m,
            "Terrain statistics computed"
        );
        Ok(stats)
    }
}
