//! Shared data structures for borehole site evaluation
//!
//! This module defines the data model used across the engine:
//! - Geometry: field polygon, centroid, bounding box
//! - Precipitation: raw records, grouped series, derived metrics
//! - Geology: formations, lithology, tagged features, slope statistics
//! - Raster: gridded layers and weights for the potential surface
//! - Borehole: depth range, success probability, water availability
//! - Report: the composite document returned per request

mod borehole;
mod geology;
mod geometry;
mod precipitation;
mod raster;
mod report;

pub use borehole::*;
pub use geology::*;
pub use geometry::*;
pub use precipitation::*;
pub use raster::*;
pub use report::*;
