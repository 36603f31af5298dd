//! Deterministic offline provider
//!
//! Backs the CLI `--offline` mode and doubles as the test provider: terrain,
//! geology and rainfall are configurable, failures can be injected per
//! capability, and every call is counted.

use super::raster_store::{InMemoryRasterStore, PotentialSurface};
use super::{Capability, DataProvider};
use crate::error::{EngineError, EngineResult};
use crate::precipitation::synthesize_daily;
use crate::types::{
    BoundingBox, ElevationPoint, GeologicalFeature, GeologicalFormation, LithologyResponse, METERS_PER_DEGREE,
    LithologyUnit, Polygon, PotentialWeights, PrecipitationRecord, RasterHandle, RasterKind,
    RasterLayer,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Rainfall the provider serves for historical requests.
#[derive(Debug, Clone, PartialEq)]
pub enum RainfallPattern {
    /// Wet April-September, dry otherwise (seeded)
    Seasonal,
    /// The same amount every day
    Constant(f64),
    /// Every record is zero
    Zero,
    /// A fixed series, returned as-is
    Custom(Vec<PrecipitationRecord>),
}

pub struct SyntheticProvider {
    name: String,
    seed: u64,
    elevation_m: f64,
    slope_deg: f64,
    soil_moisture: f64,
    temperature_k: f64,
    formations: Vec<GeologicalFormation>,
    lithology: Vec<LithologyUnit>,
    features: Vec<GeologicalFeature>,
    rainfall: RainfallPattern,
    failures: HashSet<Capability>,
    latency: Option<Duration>,
    calls: DashMap<Capability, usize>,
    rasters: Arc<InMemoryRasterStore>,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "synthetic".to_string(),
            seed,
            elevation_m: 1_200.0,
            slope_deg: 3.0,
            soil_moisture: 0.35,
            temperature_k: 295.0,
            formations: vec![
                GeologicalFormation::new("sandstone").with_magnitude(2.0),
                GeologicalFormation::new("granite"),
            ],
            lithology: vec![LithologyUnit {
                lith_type: "sandstone".to_string(),
                age: "Permian".to_string(),
                name: "Synthetic sandstone unit".to_string(),
                description: "Medium-grained sandstone".to_string(),
                coords: None,
            }],
            features: vec![GeologicalFeature::new("fracture"), GeologicalFeature::new("spring")],
            rainfall: RainfallPattern::Seasonal,
            failures: HashSet::new(),
            latency: None,
            calls: DashMap::new(),
            rasters: Arc::new(InMemoryRasterStore::new()),
        }
    }

    pub fn with_terrain(mut self, elevation_m: f64, slope_deg: f64) -> Self {
        self.elevation_m = elevation_m;
        self.slope_deg = slope_deg;
        self
    }

    pub fn with_climate(mut self, soil_moisture: f64, temperature_k: f64) -> Self {
        self.soil_moisture = soil_moisture;
        self.temperature_k = temperature_k;
        self
    }

    pub fn with_formations(mut self, formations: Vec<GeologicalFormation>) -> Self {
        self.formations = formations;
        self
    }

    pub fn with_lithology(mut self, lithology: Vec<LithologyUnit>) -> Self {
        self.lithology = lithology;
        self
    }

    pub fn with_features(mut self, features: Vec<GeologicalFeature>) -> Self {
        self.features = features;
        self
    }

    pub fn with_rainfall(mut self, rainfall: RainfallPattern) -> Self {
        self.rainfall = rainfall;
        self
    }

    /// Make every call of `capability` fail with a network error.
    pub fn with_failure(mut self, capability: Capability) -> Self {
        self.failures.insert(capability);
        self
    }

    /// Delay every call, for exercising timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made for `capability`, failed ones included.
    pub fn calls(&self, capability: Capability) -> usize {
        self.calls.get(&capability).map_or(0, |c| *c)
    }

    pub fn raster_store(&self) -> Arc<InMemoryRasterStore> {
        Arc::clone(&self.rasters)
    }

    async fn enter(&self, capability: Capability) -> EngineResult<()> {
        *self.calls.entry(capability).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failures.contains(&capability) {
            return Err(EngineError::data_unavailable(
                &self.name,
                format!("network connect failure (simulated {capability} outage)"),
            ));
        }
        Ok(())
    }

    fn daily_constant(start: NaiveDate, end: NaiveDate, rain_mm: f64) -> Vec<PrecipitationRecord> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter_map(|d| d.and_hms_opt(12, 0, 0))
            .map(|dt| PrecipitationRecord::new(dt.and_utc().timestamp_millis(), rain_mm, Some(0.4)))
            .collect()
    }

    fn sample_layer(&self, kind: RasterKind, bbox: &BoundingBox, grid: usize) -> EngineResult<RasterLayer> {
        let grid = grid.max(1);
        let values = match kind {
            // Elevation falls off towards the south edge at the configured slope
            RasterKind::Elevation => {
                let cell_m = bbox.height_deg() * METERS_PER_DEGREE / grid as f64;
                let drop_per_row = cell_m * self.slope_deg.to_radians().tan();
                (0..grid * grid)
                    .map(|i| (self.elevation_m - (i / grid) as f64 * drop_per_row).max(0.0))
                    .collect()
            }
            RasterKind::Slope => vec![self.slope_deg; grid * grid],
            RasterKind::SoilMoisture => vec![self.soil_moisture; grid * grid],
            RasterKind::Temperature => vec![self.temperature_k; grid * grid],
            RasterKind::Landcover | RasterKind::Geology | RasterKind::Precipitation => {
                return Err(EngineError::data_unavailable(
                    &self.name,
                    format!("no {kind} raster available"),
                ));
            }
        };
        Ok(RasterLayer {
            kind,
            bbox: *bbox,
            rows: grid,
            cols: grid,
            values,
        })
    }
}

#[async_trait]
impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.to_vec()
    }

    async fn fetch_historical_hourly(
        &self,
        _lat: f64,
        _lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<PrecipitationRecord>> {
        self.enter(Capability::HistoricalPrecipitation).await?;
        Ok(match &self.rainfall {
            RainfallPattern::Seasonal => {
                synthesize_daily(start, end, &mut StdRng::seed_from_u64(self.seed))
            }
            RainfallPattern::Constant(mm) => Self::daily_constant(start, end, *mm),
            RainfallPattern::Zero => Self::daily_constant(start, end, 0.0),
            RainfallPattern::Custom(records) => records.clone(),
        })
    }

    async fn fetch_point_elevation(&self, _lat: f64, _lon: f64) -> EngineResult<ElevationPoint> {
        self.enter(Capability::PointElevation).await?;
        Ok(ElevationPoint {
            elevation_m: self.elevation_m,
            slope_deg: Some(self.slope_deg),
        })
    }

    async fn fetch_geological_formations(
        &self,
        _lat: f64,
        _lon: f64,
        _radius_km: f64,
    ) -> EngineResult<Vec<GeologicalFormation>> {
        self.enter(Capability::GeologicalFormations).await?;
        Ok(self.formations.clone())
    }

    async fn fetch_lithology(&self, _lat: f64, _lon: f64) -> EngineResult<LithologyResponse> {
        self.enter(Capability::Lithology).await?;
        Ok(LithologyResponse {
            success: !self.lithology.is_empty(),
            data: self.lithology.clone(),
        })
    }

    async fn fetch_geological_features(
        &self,
        _lat: f64,
        _lon: f64,
        _radius_m: f64,
    ) -> EngineResult<Vec<GeologicalFeature>> {
        self.enter(Capability::GeologicalFeatures).await?;
        Ok(self.features.clone())
    }

    async fn fetch_raster_layer(
        &self,
        kind: RasterKind,
        bbox: &BoundingBox,
        grid: usize,
    ) -> EngineResult<RasterLayer> {
        self.enter(Capability::RasterLayers).await?;
        self.sample_layer(kind, bbox, grid)
    }

    async fn produce_potential_raster(
        &self,
        layers: &[RasterLayer],
        weights: &PotentialWeights,
        bbox: &BoundingBox,
    ) -> EngineResult<RasterHandle> {
        self.enter(Capability::PotentialRaster).await?;
        let surface = PotentialSurface::compose(layers, weights, bbox)?;
        Ok(self.rasters.publish(surface))
    }

    async fn mean_slope(&self, _polygon: &Polygon) -> EngineResult<f64> {
        self.enter(Capability::MeanSlope).await?;
        Ok(self.slope_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox { min_lon: 31.0, min_lat: -17.01, max_lon: 31.01, max_lat: -17.0 }
    }

    #[tokio::test]
    async fn test_counts_calls_and_injects_failures() {
        let provider = SyntheticProvider::new(1).with_failure(Capability::Lithology);
        assert!(provider.fetch_lithology(0.0, 0.0).await.is_err());
        assert!(provider.fetch_point_elevation(0.0, 0.0).await.is_ok());
        assert!(provider.fetch_point_elevation(0.0, 0.0).await.is_ok());
        assert_eq!(provider.calls(Capability::Lithology), 1);
        assert_eq!(provider.calls(Capability::PointElevation), 2);
        assert_eq!(provider.calls(Capability::MeanSlope), 0);
    }

    #[tokio::test]
    async fn test_seasonal_series_is_reproducible() {
        let provider = SyntheticProvider::new(5);
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
        let a = provider.fetch_historical_hourly(0.0, 0.0, start, end).await.unwrap();
        let b = provider.fetch_historical_hourly(0.0, 0.0, start, end).await.unwrap();
        assert_eq!(a.len(), 365);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_raster_layers() {
        let provider = SyntheticProvider::new(1).with_terrain(900.0, 0.0);
        let elevation = provider.fetch_raster_layer(RasterKind::Elevation, &bbox(), 4).await.unwrap();
        assert!(elevation.is_well_formed());
        assert!(elevation.values.iter().all(|v| (*v - 900.0).abs() < 1e-9));
        assert!(provider.fetch_raster_layer(RasterKind::Landcover, &bbox(), 4).await.is_err());
    }

    #[tokio::test]
    async fn test_potential_raster_published() {
        let provider = SyntheticProvider::new(1);
        let layer = provider.fetch_raster_layer(RasterKind::Slope, &bbox(), 2).await.unwrap();
        let handle = provider
            .produce_potential_raster(&[layer], &PotentialWeights::default(), &bbox())
            .await
            .unwrap();
        assert!(provider.raster_store().get(&handle).is_some());
    }
}
