//! Borehole depth, success probability and water budget outputs

use serde::{Deserialize, Serialize};

/// Shallowest depth the estimator will ever recommend (m).
pub const MIN_DRILL_DEPTH_M: f64 = 20.0;

/// Deepest depth the estimator will ever recommend (m).
pub const MAX_DRILL_DEPTH_M: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfiningLayerKind {
    Clay,
    Bedrock,
}

impl std::fmt::Display for ConfiningLayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clay => write!(f, "clay"),
            Self::Bedrock => write!(f, "bedrock"),
        }
    }
}

/// A low-permeability layer inferred from terrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiningLayer {
    pub kind: ConfiningLayerKind,
    pub depth_m: f64,
}

/// Recommended drilling window.
///
/// Invariant: `20 <= minimum_m <= recommended_m <= maximum_m <= 250`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthRange {
    pub minimum_m: f64,
    pub maximum_m: f64,
    pub recommended_m: f64,
    pub confidence: f64,
    pub limitations: Vec<String>,
    pub estimated_aquifer_depth_m: f64,
    pub confining_layers: Vec<ConfiningLayer>,
}

impl DepthRange {
    pub fn satisfies_bounds(&self) -> bool {
        MIN_DRILL_DEPTH_M <= self.minimum_m
            && self.minimum_m <= self.recommended_m
            && self.recommended_m <= self.maximum_m
            && self.maximum_m <= MAX_DRILL_DEPTH_M
    }

    pub fn spread_m(&self) -> f64 {
        self.maximum_m - self.minimum_m
    }
}

/// Why a success probability was computed from defaults instead of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityFallback {
    InvalidCoordinates,
    Network,
    Geology,
    Precipitation,
    Other,
}

impl ProbabilityFallback {
    /// Calibrated probability (0-100) returned for this failure cause.
    pub fn default_probability(self) -> f64 {
        match self {
            Self::InvalidCoordinates | Self::Other => 50.0,
            Self::Network => 45.0,
            Self::Geology => 40.0,
            Self::Precipitation => 42.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessAnalysis {
    /// Drilling success probability, 0-100
    pub probability: f64,
    pub geology_score: f64,
    pub precipitation_reliability: f64,
    /// Per-factor weighted contributions (0-1 scale)
    pub contributions: Vec<(String, f64)>,
    pub fallback: Option<ProbabilityFallback>,
    pub note: Option<String>,
}

/// Water volumes over the field, in cubic metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterAvailability {
    pub surface_m3: f64,
    pub groundwater_m3: f64,
    pub soil_moisture_m3: f64,
    pub units: String,
}

impl WaterAvailability {
    pub fn total_m3(&self) -> f64 {
        self.surface_m3 + self.groundwater_m3 + self.soil_moisture_m3
    }
}
