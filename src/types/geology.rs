//! Geological inputs returned by data providers and the hydrogeology summary

use super::geometry::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapped formation near the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeologicalFormation {
    /// Rock type as reported upstream, e.g. "Sandstone", "granite"
    pub formation_type: String,
    pub coords: Option<Coordinate>,
    /// Areal coverage weight; absent or non-positive means 1.0
    pub magnitude: Option<f64>,
}

impl GeologicalFormation {
    pub fn new(formation_type: impl Into<String>) -> Self {
        Self {
            formation_type: formation_type.into(),
            coords: None,
            magnitude: None,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn coverage(&self) -> f64 {
        self.magnitude
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(1.0)
    }
}

/// A lithology unit from a geologic-map service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LithologyUnit {
    #[serde(rename = "type")]
    pub lith_type: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub coords: Option<Coordinate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LithologyResponse {
    pub success: bool,
    pub data: Vec<LithologyUnit>,
}

/// A tagged map feature (fault, fracture, spring, outcrop ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeologicalFeature {
    /// Primary tag, lowercase, e.g. "fracture", "fault", "spring"
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coords: Option<Coordinate>,
    /// Raw key/value tags from the upstream source
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl GeologicalFeature {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            name: None,
            coords: None,
            tags: BTreeMap::new(),
        }
    }

    /// Rock type named by a `geological`/`rock`/`lithology` tag, if any.
    pub fn rock_type(&self) -> Option<&str> {
        ["rock", "lithology", "geological"]
            .iter()
            .find_map(|k| self.tags.get(*k).map(String::as_str))
    }
}

/// Point elevation sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationPoint {
    pub elevation_m: f64,
    pub slope_deg: Option<f64>,
}

/// Terrain summary returned by the external terrain analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlopeStatistics {
    pub mean_slope_deg: f64,
    pub min_slope_deg: f64,
    pub max_slope_deg: f64,
    pub std_dev_deg: f64,
    pub mean_elevation_m: f64,
}

impl SlopeStatistics {
    /// Flat terrain at the given elevation.
    pub fn flat(elevation_m: f64) -> Self {
        Self {
            mean_slope_deg: 0.0,
            min_slope_deg: 0.0,
            max_slope_deg: 0.0,
            std_dev_deg: 0.0,
            mean_elevation_m: elevation_m,
        }
    }
}

/// The five geology sub-scores and their weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeologySubScores {
    pub aquifer_presence: f64,
    pub rock_hardness: f64,
    pub fracture_zones: f64,
    pub elevation: f64,
    pub slope: f64,
}

/// Hydrogeology lookup output for the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydroGeologicalFeatures {
    pub lithology: Vec<LithologyUnit>,
    pub formations: Vec<GeologicalFormation>,
    pub features: Vec<GeologicalFeature>,
    pub dominant_rock_type: Option<String>,
    pub aquifer_formations: usize,
    pub fracture_count: usize,
    pub geology_score: Option<f64>,
    pub is_fallback: bool,
    pub note: Option<String>,
}
