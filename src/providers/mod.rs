//! Data Providers - remote capabilities the engine depends on
//!
//! The engine never talks to a specific service. It depends on the
//! `DataProvider` capability interface:
//!
//! - `HttpDataProvider`: archive/elevation/geologic-map/feature HTTP APIs
//! - `SyntheticProvider`: deterministic offline data (CLI `--offline`, tests)
//! - `RetryingProvider`: decorator adding per-call timeouts and backoff
//!
//! Every operation returns a typed result or a well-formed `EngineError`;
//! components decide their own fallback.

mod http;
mod raster_store;
mod retry;
mod synthetic;

pub use http::HttpDataProvider;
pub use raster_store::{InMemoryRasterStore, PotentialSurface};
pub use retry::{with_retry, RetryPolicy};
pub use synthetic::{RainfallPattern, SyntheticProvider};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::types::{
    BoundingBox, ElevationPoint, GeologicalFeature, GeologicalFormation, LithologyResponse,
    Polygon, PotentialWeights, PrecipitationRecord, RasterHandle, RasterKind, RasterLayer,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Named operations a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    HistoricalPrecipitation,
    PointElevation,
    GeologicalFormations,
    Lithology,
    GeologicalFeatures,
    RasterLayers,
    PotentialRaster,
    MeanSlope,
}

impl Capability {
    pub const ALL: [Self; 8] = [
        Self::HistoricalPrecipitation,
        Self::PointElevation,
        Self::GeologicalFormations,
        Self::Lithology,
        Self::GeologicalFeatures,
        Self::RasterLayers,
        Self::PotentialRaster,
        Self::MeanSlope,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HistoricalPrecipitation => "precipitation",
            Self::PointElevation => "elevation",
            Self::GeologicalFormations => "formations",
            Self::Lithology => "lithology",
            Self::GeologicalFeatures => "features",
            Self::RasterLayers => "raster-layers",
            Self::PotentialRaster => "potential-raster",
            Self::MeanSlope => "mean-slope",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface for remote geospatial and weather data.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider name for logs and report metadata
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<Capability>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Hourly rainfall and soil moisture between two dates (inclusive).
    async fn fetch_historical_hourly(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<PrecipitationRecord>>;

    async fn fetch_point_elevation(&self, lat: f64, lon: f64) -> EngineResult<ElevationPoint>;

    async fn fetch_geological_formations(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
    ) -> EngineResult<Vec<GeologicalFormation>>;

    async fn fetch_lithology(&self, lat: f64, lon: f64) -> EngineResult<LithologyResponse>;

    async fn fetch_geological_features(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> EngineResult<Vec<GeologicalFeature>>;

    /// Raw (un-normalized) layer sampled on a `grid × grid` lattice over `bbox`.
    async fn fetch_raster_layer(
        &self,
        kind: RasterKind,
        bbox: &BoundingBox,
        grid: usize,
    ) -> EngineResult<RasterLayer>;

    /// Publish a weighted potential surface and return its opaque handle.
    async fn produce_potential_raster(
        &self,
        layers: &[RasterLayer],
        weights: &PotentialWeights,
        bbox: &BoundingBox,
    ) -> EngineResult<RasterHandle>;

    /// Mean terrain slope over the polygon in degrees.
    async fn mean_slope(&self, polygon: &Polygon) -> EngineResult<f64>;
}

/// Timeouts per operation family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicies {
    pub precipitation: RetryPolicy,
    pub lithology: RetryPolicy,
    pub default: RetryPolicy,
}

impl RetryPolicies {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            precipitation: config.precipitation.retry_policy(),
            lithology: config.providers.lithology_retry_policy(&config.precipitation),
            default: config.providers.retry_policy(&config.precipitation),
        }
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Wraps a provider so every call gets a bounded timeout and backoff.
pub struct RetryingProvider {
    inner: Arc<dyn DataProvider>,
    policies: RetryPolicies,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn DataProvider>, policies: RetryPolicies) -> Self {
        Self { inner, policies }
    }
}

#[async_trait]
impl DataProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.inner.capabilities()
    }

    async fn fetch_historical_hourly(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<PrecipitationRecord>> {
        with_retry("precipitation", &self.policies.precipitation, || {
            self.inner.fetch_historical_hourly(lat, lon, start, end)
        })
        .await
    }

    async fn fetch_point_elevation(&self, lat: f64, lon: f64) -> EngineResult<ElevationPoint> {
        with_retry("elevation", &self.policies.default, || {
            self.inner.fetch_point_elevation(lat, lon)
        })
        .await
    }

    async fn fetch_geological_formations(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
    ) -> EngineResult<Vec<GeologicalFormation>> {
        with_retry("formations", &self.policies.default, || {
            self.inner.fetch_geological_formations(lat, lon, radius_km)
        })
        .await
    }

    async fn fetch_lithology(&self, lat: f64, lon: f64) -> EngineResult<LithologyResponse> {
        with_retry("lithology", &self.policies.lithology, || {
            self.inner.fetch_lithology(lat, lon)
        })
        .await
    }

    async fn fetch_geological_features(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> EngineResult<Vec<GeologicalFeature>> {
        with_retry("features", &self.policies.default, || {
            self.inner.fetch_geological_features(lat, lon, radius_m)
        })
        .await
    }

    async fn fetch_raster_layer(
        &self,
        kind: RasterKind,
        bbox: &BoundingBox,
        grid: usize,
    ) -> EngineResult<RasterLayer> {
        with_retry(kind.as_str(), &self.policies.default, || {
            self.inner.fetch_raster_layer(kind, bbox, grid)
        })
        .await
    }

    async fn produce_potential_raster(
        &self,
        layers: &[RasterLayer],
        weights: &PotentialWeights,
        bbox: &BoundingBox,
    ) -> EngineResult<RasterHandle> {
        with_retry("potential-raster", &self.policies.default, || {
            self.inner.produce_potential_raster(layers, weights, bbox)
        })
        .await
    }

    async fn mean_slope(&self, polygon: &Polygon) -> EngineResult<f64> {
        with_retry("mean-slope", &self.policies.default, || {
            self.inner.mean_slope(polygon)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::time::Duration;

    fn fast_policies() -> RetryPolicies {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            backoff: 1.5,
            timeout: Duration::from_millis(200),
        };
        RetryPolicies {
            precipitation: policy,
            lithology: policy.with_timeout(Duration::from_millis(50)),
            default: policy,
        }
    }

    #[test]
    fn test_policies_from_config() {
        let policies = RetryPolicies::default();
        assert_eq!(policies.precipitation.timeout, Duration::from_secs(20));
        assert_eq!(policies.lithology.timeout, Duration::from_secs(8));
        assert_eq!(policies.default.timeout, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_provider_retries_failures() {
        let inner = Arc::new(SyntheticProvider::new(1).with_failure(Capability::GeologicalFormations));
        let provider = RetryingProvider::new(inner.clone(), fast_policies());
        assert!(provider.fetch_geological_formations(0.0, 0.0, 5.0).await.is_err());
        assert_eq!(inner.calls(Capability::GeologicalFormations), 3);
        assert!(provider.fetch_point_elevation(0.0, 0.0).await.is_ok());
        assert_eq!(inner.calls(Capability::PointElevation), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lithology_uses_shorter_timeout() {
        let inner = Arc::new(SyntheticProvider::new(1).with_latency(Duration::from_millis(100)));
        let provider = RetryingProvider::new(inner.clone(), fast_policies());
        let err = provider.fetch_lithology(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout { after_ms: 50, .. }));
        assert!(provider.fetch_point_elevation(0.0, 0.0).await.is_ok());
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::Lithology.to_string(), "lithology");
        assert!(SyntheticProvider::new(0).supports(Capability::MeanSlope));
    }
}
