//! Composite site report returned to callers
//!
//! Serialized field names follow the public report document:
//! `viability.fieldPotentialAnalysis`, `environment.water.boreholeDepthAnalysis`, ...

use super::borehole::{DepthRange, SuccessAnalysis, WaterAvailability};
use super::geology::HydroGeologicalFeatures;
use super::geometry::Coordinate;
use super::precipitation::PrecipitationMetrics;
use super::raster::{PotentialWeights, RasterHandle, RasterKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViabilityRating {
    High,
    Moderate,
    Low,
}

impl ViabilityRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::High
        } else if score >= 45.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ViabilityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPotentialAnalysis {
    /// Composite viability score, 0-100
    pub score: f64,
    pub rating: ViabilityRating,
    pub success_probability: f64,
    pub groundwater_potential_mean: f64,
    pub recommended_depth_m: f64,
    pub area_hectares: f64,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViabilitySection {
    pub field_potential_analysis: FieldPotentialAnalysis,
}

/// Summary of the published groundwater-potential surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialMapSummary {
    pub handle: Option<RasterHandle>,
    pub weights: PotentialWeights,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Mean of each available normalized input layer
    pub layer_means: BTreeMap<RasterKind, f64>,
    pub is_fallback: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterSection {
    pub water_availability: WaterAvailability,
    pub borehole_depth_analysis: DepthRange,
    pub borehole_success_analysis: SuccessAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSection {
    pub precipitation: PrecipitationMetrics,
    pub water: WaterSection,
    pub hydro_geological_features: HydroGeologicalFeatures,
    pub potential_map: PotentialMapSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloodRisk {
    Low,
    Medium,
    High,
    Unknown,
}

/// Site access as reported by the external accessibility subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityAnalysis {
    pub nearest_road_m: Option<f64>,
    pub flood_risk: FloodRisk,
    pub travel_time_minutes: Option<f64>,
    pub nearest_settlement: Option<String>,
    pub note: Option<String>,
}

impl AccessibilityAnalysis {
    pub fn unavailable(note: impl Into<String>) -> Self {
        Self {
            nearest_road_m: None,
            flood_risk: FloodRisk::Unknown,
            travel_time_minutes: None,
            nearest_settlement: None,
            note: Some(note.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySection {
    pub accessibility_analysis: AccessibilityAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Unix milliseconds when the report was assembled
    pub generated_at: i64,
    pub centroid: Coordinate,
    pub area_hectares: f64,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteReport {
    pub viability: ViabilitySection,
    pub environment: EnvironmentSection,
    pub accessibility: AccessibilitySection,
    pub metadata: ReportMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bands() {
        assert_eq!(ViabilityRating::from_score(85.0), ViabilityRating::High);
        assert_eq!(ViabilityRating::from_score(70.0), ViabilityRating::High);
        assert_eq!(ViabilityRating::from_score(50.0), ViabilityRating::Moderate);
        assert_eq!(ViabilityRating::from_score(10.0), ViabilityRating::Low);
    }
}
