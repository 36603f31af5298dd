//! Borehole Siting: hydrological scoring and recharge analysis
//!
//! Given a field polygon, the engine estimates whether drilling a borehole
//! there is worthwhile and how deep to drill.
//!
//! ## Architecture
//!
//! - **Providers**: pluggable data sources (HTTP services or a seeded synthetic
//!   provider) with per-call timeouts and retry
//! - **Precipitation**: ten-year rainfall analysis, recharge detection and
//!   reliability scoring
//! - **Geology**: cached five-factor geology score and hydrogeology summary
//! - **Potential**: weighted groundwater-potential surface
//! - **Borehole**: drilling depth window and success probability
//! - **Orchestrator**: concurrent fan-out producing one `SiteReport`

pub mod accessibility;
pub mod borehole;
pub mod cache;
pub mod config;
pub mod error;
pub mod geology;
pub mod orchestrator;
pub mod potential;
pub mod precipitation;
pub mod providers;
pub mod terrain;
pub mod types;
pub mod water_budget;

pub use config::EngineConfig;
pub use error::{BoreholeSiteFailure, EngineError, EngineResult};
pub use orchestrator::{viability_score, BoreholeSiteAnalyzer};

pub use types::{
    BoundingBox, Coordinate, DepthRange, PrecipitationMetrics, Polygon, ReliabilityScores,
    SiteReport, SuccessAnalysis, ViabilityRating, WaterAvailability,
};

pub use providers::{DataProvider, HttpDataProvider, SyntheticProvider};
pub use precipitation::PrecipitationAnalyzer;
pub use geology::{GeologyScorer, HydrogeologyLookup};
pub use potential::PotentialAggregator;
pub use borehole::{estimate_depth, SuccessProbabilityModel};
pub use cache::{GeologyScoreCache, GeospatialCache};
