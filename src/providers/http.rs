//! HTTP Data Provider
//!
//! Talks to the public services behind each capability:
//!
//! | Capability | Service |
//! |---|---|
//! | historical precipitation | Open-Meteo archive (hourly) |
//! | soil moisture / temperature layers | Open-Meteo forecast (current) |
//! | elevation, slope | Open-Elevation batch lookup |
//! | lithology, formations | Macrostrat geologic units |
//! | features | Overpass |
//!
//! Successful response bodies are cached in the `GeospatialCache` under
//! URL + params. The potential surface is composed locally and kept in an
//! `InMemoryRasterStore`.

use super::raster_store::{InMemoryRasterStore, PotentialSurface};
use super::{Capability, DataProvider};
use crate::cache::{cache_key, CacheCategory, GeospatialCache, KeyValueCache};
use crate::config::{CacheConfig, EngineConfig, ProviderConfig};
use crate::error::{EngineError, EngineResult};
use crate::geology::classify_rock;
use crate::types::{
    BoundingBox, Coordinate, ElevationPoint, GeologicalFeature, GeologicalFormation,
    LithologyResponse, LithologyUnit, Polygon, PotentialWeights, PrecipitationRecord,
    RasterHandle, RasterKind, RasterLayer, METERS_PER_DEGREE,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Half-width of the elevation stencil used for point slope (m).
const SLOPE_STENCIL_M: f64 = 100.0;

const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

const KELVIN_OFFSET: f64 = 273.15;

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<ArchiveHourly>,
}

#[derive(Debug, Deserialize)]
struct ArchiveHourly {
    time: Vec<String>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    soil_moisture_0_to_7cm: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<ForecastCurrent>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    soil_moisture_0_to_1cm: Option<f64>,
    temperature_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    results: Vec<ElevationResult>,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    elevation: f64,
}

#[derive(Debug, Deserialize)]
struct MacrostratResponse {
    success: Option<MacrostratPayload>,
}

#[derive(Debug, Deserialize)]
struct MacrostratPayload {
    #[serde(default)]
    data: Vec<MacrostratUnit>,
}

#[derive(Debug, Deserialize)]
struct MacrostratUnit {
    #[serde(default)]
    name: String,
    #[serde(default)]
    lith: String,
    #[serde(default)]
    descrip: String,
    #[serde(default)]
    b_int_name: String,
    #[serde(default)]
    t_int_name: String,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

// ============================================================================
// Provider
// ============================================================================

pub struct HttpDataProvider {
    http: reqwest::Client,
    config: ProviderConfig,
    precipitation_timeout: Duration,
    cache_config: CacheConfig,
    cache: Arc<GeospatialCache>,
    rasters: Arc<InMemoryRasterStore>,
}

impl HttpDataProvider {
    /// Build a client with the configured provider timeout, sharing the
    /// process-wide geospatial cache.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.precipitation.timeout_ms.max(config.providers.timeout_ms)))
            .user_agent(concat!("borehole-siting/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::data_unavailable("http", format!("client construction failed: {e}")))?;

        Ok(Self {
            http,
            config: config.providers.clone(),
            precipitation_timeout: Duration::from_millis(config.precipitation.timeout_ms),
            cache_config: config.cache.clone(),
            cache: GeospatialCache::global(),
            rasters: Arc::new(InMemoryRasterStore::new()),
        })
    }

    pub fn with_cache(mut self, cache: Arc<GeospatialCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn raster_store(&self) -> Arc<InMemoryRasterStore> {
        Arc::clone(&self.rasters)
    }

    async fn cached(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.cache.get(&key.to_string()).await;
        if hit.is_some() {
            debug!(key, "Geospatial cache hit");
        }
        hit
    }

    async fn store(&self, key: String, body: serde_json::Value) {
        self.cache
            .set_in(CacheCategory::Default, &self.cache_config, key, body)
            .await;
    }

    async fn read_body(source: &str, resp: reqwest::Response) -> EngineResult<serde_json::Value> {
        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::data_unavailable(source, format!("bad status {status}")));
        }
        Ok(resp.json::<serde_json::Value>().await?)
    }

    fn decode<T: DeserializeOwned>(source: &str, body: serde_json::Value) -> EngineResult<T> {
        serde_json::from_value(body)
            .map_err(|e| EngineError::data_unavailable(source, format!("malformed response: {e}")))
    }

    /// GET `url` with query `params`, served from cache when fresh.
    async fn get_json<T: DeserializeOwned>(
        &self,
        source: &str,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> EngineResult<T> {
        let key = cache_key(url, params);
        if let Some(body) = self.cached(&key).await {
            return Self::decode(source, body);
        }

        let resp = self
            .http
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await?;
        let body = Self::read_body(source, resp).await?;
        self.store(key, body.clone()).await;
        Self::decode(source, body)
    }

    /// POST a form body, cached under the form fields like a GET.
    async fn post_form_json<T: DeserializeOwned>(
        &self,
        source: &str,
        url: &str,
        form: &[(&str, String)],
    ) -> EngineResult<T> {
        let key = cache_key(url, form);
        if let Some(body) = self.cached(&key).await {
            return Self::decode(source, body);
        }

        let resp = self
            .http
            .post(url)
            .form(form)
            .timeout(self.default_timeout())
            .send()
            .await?;
        let body = Self::read_body(source, resp).await?;
        self.store(key, body.clone()).await;
        Self::decode(source, body)
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Elevations for a batch of points, in input order.
    async fn lookup_elevations(&self, points: &[Coordinate]) -> EngineResult<Vec<f64>> {
        let locations = points
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.lat, p.lon))
            .collect::<Vec<_>>()
            .join("|");
        let resp: ElevationResponse = self
            .get_json(
                "elevation",
                &self.config.elevation_url,
                &[("locations", locations)],
                self.default_timeout(),
            )
            .await?;
        if resp.results.len() != points.len() {
            return Err(EngineError::data_unavailable(
                "elevation",
                format!("malformed response: {} results for {} points", resp.results.len(), points.len()),
            ));
        }
        Ok(resp.results.into_iter().map(|r| r.elevation).collect())
    }

    async fn elevation_grid(&self, bbox: &BoundingBox, grid: usize) -> EngineResult<RasterLayer> {
        let grid = grid.max(1);
        let points: Vec<Coordinate> = (0..grid * grid)
            .map(|i| bbox.cell_center(i / grid, i % grid, grid, grid))
            .collect();
        let values = self.lookup_elevations(&points).await?;
        Ok(RasterLayer {
            kind: RasterKind::Elevation,
            bbox: *bbox,
            rows: grid,
            cols: grid,
            values,
        })
    }

    async fn current_conditions(&self, lat: f64, lon: f64) -> EngineResult<ForecastCurrent> {
        let resp: ForecastResponse = self
            .get_json(
                "forecast",
                &self.config.forecast_url,
                &[
                    ("latitude", format!("{lat:.4}")),
                    ("longitude", format!("{lon:.4}")),
                    ("current", "soil_moisture_0_to_1cm,temperature_2m".to_string()),
                    ("timezone", "UTC".to_string()),
                ],
                self.default_timeout(),
            )
            .await?;
        resp.current
            .ok_or_else(|| EngineError::data_unavailable("forecast", "malformed response: no current block"))
    }

    async fn macrostrat_units(&self, lat: f64, lon: f64) -> EngineResult<Vec<MacrostratUnit>> {
        let resp: MacrostratResponse = self
            .get_json(
                "lithology",
                &self.config.lithology_url,
                &[("lat", format!("{lat:.5}")), ("lng", format!("{lon:.5}"))],
                Duration::from_millis(self.config.lithology_timeout_ms),
            )
            .await?;
        Ok(resp.success.map(|s| s.data).unwrap_or_default())
    }
}

/// Rock class of a geologic unit, from its lithology string then its name.
fn unit_rock_class(unit: &MacrostratUnit) -> Option<&'static str> {
    classify_rock(&unit.lith)
        .or_else(|| classify_rock(&unit.name))
        .or_else(|| classify_rock(&unit.descrip))
}

fn unit_age(unit: &MacrostratUnit) -> String {
    match (unit.b_int_name.as_str(), unit.t_int_name.as_str()) {
        ("", t) => t.to_string(),
        (b, "") => b.to_string(),
        (b, t) if b == t => b.to_string(),
        (b, t) => format!("{b} - {t}"),
    }
}

/// Point displaced `north_km` / `east_km` from `(lat, lon)`.
fn offset(lat: f64, lon: f64, north_km: f64, east_km: f64) -> Coordinate {
    let dlat = north_km * 1_000.0 / METERS_PER_DEGREE;
    let dlon = east_km * 1_000.0 / (METERS_PER_DEGREE * lat.to_radians().cos().max(1e-6));
    Coordinate::new(lon + dlon, lat + dlat)
}

/// Collapse raw OSM tags into a primary feature tag.
fn feature_tag(tags: &BTreeMap<String, String>) -> Option<String> {
    if let Some(geo) = tags.get("geological") {
        let geo = geo.to_lowercase();
        return Some(match geo.as_str() {
            "fault" | "fracture" | "joint" | "lineament" => "fracture".to_string(),
            _ => geo,
        });
    }
    tags.get("natural").map(|n| n.to_lowercase())
}

fn parse_archive(resp: ArchiveResponse) -> EngineResult<Vec<PrecipitationRecord>> {
    let hourly = resp
        .hourly
        .ok_or_else(|| EngineError::data_unavailable("precipitation", "malformed response: no hourly block"))?;

    let mut skipped = 0usize;
    let records: Vec<PrecipitationRecord> = hourly
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, t)| {
            let rain = hourly.precipitation.get(i).copied().flatten();
            let parsed = NaiveDateTime::parse_from_str(t, ARCHIVE_TIME_FORMAT).ok();
            match (parsed, rain) {
                (Some(dt), Some(rain)) => {
                    let soil = hourly.soil_moisture_0_to_7cm.get(i).copied().flatten();
                    Some(PrecipitationRecord::new(dt.and_utc().timestamp_millis(), rain, soil))
                }
                _ => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, kept = records.len(), "Skipped archive hours without a value");
    }
    Ok(records)
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.to_vec()
    }

    async fn fetch_historical_hourly(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<PrecipitationRecord>> {
        let resp: ArchiveResponse = self
            .get_json(
                "precipitation",
                &self.config.precipitation_url,
                &[
                    ("latitude", format!("{lat:.4}")),
                    ("longitude", format!("{lon:.4}")),
                    ("start_date", start.format("%Y-%m-%d").to_string()),
                    ("end_date", end.format("%Y-%m-%d").to_string()),
                    ("hourly", "precipitation,soil_moisture_0_to_7cm".to_string()),
                    ("timezone", "UTC".to_string()),
                ],
                self.precipitation_timeout,
            )
            .await?;
        let records = parse_archive(resp)?;
        info!(lat, lon, %start, %end, records = records.len(), "Fetched hourly precipitation");
        Ok(records)
    }

    async fn fetch_point_elevation(&self, lat: f64, lon: f64) -> EngineResult<ElevationPoint> {
        let d_km = SLOPE_STENCIL_M / 1_000.0;
        let points = [
            Coordinate::new(lon, lat),
            offset(lat, lon, d_km, 0.0),
            offset(lat, lon, -d_km, 0.0),
            offset(lat, lon, 0.0, d_km),
            offset(lat, lon, 0.0, -d_km),
        ];
        let z = self.lookup_elevations(&points).await?;
        let dzdy = (z[1] - z[2]) / (2.0 * SLOPE_STENCIL_M);
        let dzdx = (z[3] - z[4]) / (2.0 * SLOPE_STENCIL_M);
        Ok(ElevationPoint {
            elevation_m: z[0],
            slope_deg: Some(dzdx.hypot(dzdy).atan().to_degrees()),
        })
    }

    async fn fetch_geological_formations(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
    ) -> EngineResult<Vec<GeologicalFormation>> {
        let samples = [
            Coordinate::new(lon, lat),
            offset(lat, lon, radius_km, 0.0),
            offset(lat, lon, -radius_km, 0.0),
            offset(lat, lon, 0.0, radius_km),
            offset(lat, lon, 0.0, -radius_km),
        ];
        let results = join_all(samples.iter().map(|p| self.macrostrat_units(p.lat, p.lon))).await;

        let mut counts: BTreeMap<&'static str, (f64, Coordinate)> = BTreeMap::new();
        let mut last_error = None;
        let mut answered = 0usize;
        for (sample, result) in samples.iter().zip(results) {
            match result {
                Ok(units) => {
                    answered += 1;
                    for class in units.iter().filter_map(unit_rock_class) {
                        counts.entry(class).or_insert((0.0, *sample)).0 += 1.0;
                    }
                }
                Err(e) => {
                    warn!(lat = sample.lat, lon = sample.lon, error = %e, "Formation sample failed");
                    last_error = Some(e);
                }
            }
        }
        if answered == 0 {
            return Err(last_error
                .unwrap_or_else(|| EngineError::data_unavailable("formations", "no samples answered")));
        }

        Ok(counts
            .into_iter()
            .map(|(class, (count, coords))| GeologicalFormation {
                formation_type: class.to_string(),
                coords: Some(coords),
                magnitude: Some(count),
            })
            .collect())
    }

    async fn fetch_lithology(&self, lat: f64, lon: f64) -> EngineResult<LithologyResponse> {
        let units = self.macrostrat_units(lat, lon).await?;
        let data: Vec<LithologyUnit> = units
            .iter()
            .map(|u| LithologyUnit {
                lith_type: unit_rock_class(u).map_or_else(|| u.lith.clone(), str::to_string),
                age: unit_age(u),
                name: u.name.clone(),
                description: u.descrip.clone(),
                coords: Some(Coordinate::new(lon, lat)),
            })
            .collect();
        Ok(LithologyResponse {
            success: !data.is_empty(),
            data,
        })
    }

    async fn fetch_geological_features(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> EngineResult<Vec<GeologicalFeature>> {
        let around = format!("(around:{radius_m:.0},{lat:.5},{lon:.5})");
        let query = format!(
            "[out:json][timeout:25];(node[\"geological\"]{around};way[\"geological\"]{around};\
             node[\"natural\"~\"^(spring|cave_entrance|rock|bare_rock|sinkhole)$\"]{around};);out center;"
        );
        let resp: OverpassResponse = self
            .post_form_json("features", &self.config.features_url, &[("data", query)])
            .await?;

        Ok(resp
            .elements
            .into_iter()
            .filter_map(|el| {
                let tag = feature_tag(&el.tags)?;
                let coords = match (el.lat, el.lon, el.center) {
                    (Some(lat), Some(lon), _) => Some(Coordinate::new(lon, lat)),
                    (_, _, Some(c)) => Some(Coordinate::new(c.lon, c.lat)),
                    _ => None,
                };
                Some(GeologicalFeature {
                    tag,
                    name: el.tags.get("name").cloned(),
                    coords,
                    tags: el.tags,
                })
            })
            .collect())
    }

    async fn fetch_raster_layer(
        &self,
        kind: RasterKind,
        bbox: &BoundingBox,
        grid: usize,
    ) -> EngineResult<RasterLayer> {
        let grid = grid.max(1);
        let centre = bbox.cell_center(0, 0, 1, 1);
        match kind {
            RasterKind::Elevation => self.elevation_grid(bbox, grid).await,
            RasterKind::Slope => Ok(self.elevation_grid(bbox, grid).await?.slope_degrees()),
            RasterKind::SoilMoisture | RasterKind::Temperature => {
                let current = self.current_conditions(centre.lat, centre.lon).await?;
                let value = if kind == RasterKind::SoilMoisture {
                    current.soil_moisture_0_to_1cm
                } else {
                    current.temperature_2m.map(|c| c + KELVIN_OFFSET)
                };
                let value = value.ok_or_else(|| {
                    EngineError::data_unavailable("forecast", format!("no current {kind} value"))
                })?;
                Ok(RasterLayer::constant(kind, *bbox, grid, grid, value))
            }
            RasterKind::Landcover | RasterKind::Geology | RasterKind::Precipitation => Err(
                EngineError::data_unavailable("http", format!("no {kind} raster service configured")),
            ),
        }
    }

    async fn produce_potential_raster(
        &self,
        layers: &[RasterLayer],
        weights: &PotentialWeights,
        bbox: &BoundingBox,
    ) -> EngineResult<RasterHandle> {
        let surface = PotentialSurface::compose(layers, weights, bbox)?;
        Ok(self.rasters.publish(surface))
    }

    async fn mean_slope(&self, polygon: &Polygon) -> EngineResult<f64> {
        let grid = self.config.raster_grid_size;
        let slope = self
            .elevation_grid(&polygon.bounding_box(), grid)
            .await?
            .slope_degrees();
        Ok(slope.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_parsing_skips_nulls() {
        let body = serde_json::json!({
            "hourly": {
                "time": ["2020-01-01T00:00", "2020-01-01T01:00", "2020-01-01T02:00", "garbage"],
                "precipitation": [0.5, null, 2.0, 1.0],
                "soil_moisture_0_to_7cm": [0.31, 0.3, null, 0.2]
            }
        });
        let resp: ArchiveResponse = serde_json::from_value(body).unwrap();
        let records = parse_archive(resp).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rain_mm, 0.5);
        assert_eq!(records[0].soil_moisture, 0.31);
        assert_eq!(records[1].soil_moisture, crate::types::DEFAULT_SOIL_MOISTURE);
        assert_eq!(records[1].timestamp - records[0].timestamp, 2 * 3_600_000);
    }

    #[test]
    fn test_missing_hourly_block_is_unavailable() {
        let resp: ArchiveResponse = serde_json::from_value(serde_json::json!({"error": true})).unwrap();
        assert!(matches!(parse_archive(resp), Err(EngineError::DataUnavailable { .. })));
    }

    #[test]
    fn test_feature_tags_fold_faults_into_fractures() {
        let tags = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>()
        };
        assert_eq!(feature_tag(&tags(&[("geological", "Fault")])).as_deref(), Some("fracture"));
        assert_eq!(feature_tag(&tags(&[("geological", "outcrop")])).as_deref(), Some("outcrop"));
        assert_eq!(feature_tag(&tags(&[("natural", "spring")])).as_deref(), Some("spring"));
        assert_eq!(feature_tag(&tags(&[("name", "x")])), None);
    }

    #[test]
    fn test_unit_classification_and_age() {
        let unit = MacrostratUnit {
            name: "Bulawayan Group".to_string(),
            lith: "Metamorphic > gneiss".to_string(),
            descrip: String::new(),
            b_int_name: "Archean".to_string(),
            t_int_name: "Archean".to_string(),
        };
        assert_eq!(unit_rock_class(&unit), Some("metamorphic"));
        assert_eq!(unit_age(&unit), "Archean");
    }

    #[test]
    fn test_offset_distance() {
        let p = offset(0.0, 0.0, 5.0, 0.0);
        assert!((p.lat * METERS_PER_DEGREE - 5_000.0).abs() < 1e-6);
        assert_eq!(p.lon, 0.0);
    }

    #[tokio::test]
    async fn test_cached_body_served_without_network() {
        let config = EngineConfig::default();
        let cache = Arc::new(GeospatialCache::from_config(&config.cache));
        let provider = HttpDataProvider::new(&config).unwrap().with_cache(Arc::clone(&cache));

        let point = Coordinate::new(31.0, -17.8);
        let locations = format!("{:.6},{:.6}", point.lat, point.lon);
        let key = cache_key(&config.providers.elevation_url, &[("locations", locations)]);
        cache
            .set(key, serde_json::json!({"results": [{"elevation": 1490.0}]}), None)
            .await;

        let z = provider.lookup_elevations(&[point]).await.unwrap();
        assert_eq!(z, vec![1490.0]);
    }
}
