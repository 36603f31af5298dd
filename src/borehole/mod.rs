//! Borehole recommendations: drilling depth window and success probability

mod depth;
mod success;

pub use depth::{confining_layers, estimate_aquifer_depth, estimate_depth, DepthInputs};
pub use success::{
    classify_failure, InputStage, SiteStatistics, SuccessProbabilityModel, SuccessWeights,
};
