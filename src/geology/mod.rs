//! Geology
//!
//! - `hardness`: rock table and free-text rock classification
//! - `scorer`: cached five-factor geology score
//! - `lookup`: lithology / formation / feature summary for the report

mod hardness;
mod lookup;
mod scorer;

pub use hardness::{classify_rock, hardness_of, is_aquifer_rock, RockHardness, AQUIFER_ROCKS, UNKNOWN_HARDNESS};
pub use lookup::{dominant_rock_type, HydrogeologyLookup};
pub use scorer::{
    aquifer_presence, composite_score, elevation_score, fracture_zones, rock_hardness, slope_score,
    sub_scores, GeologyAssessment, GeologyScorer, FALLBACK_GEOLOGY_SCORE,
};
