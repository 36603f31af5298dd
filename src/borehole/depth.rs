//! Drilling depth window from terrain and recharge
//!
//! ```text
//! aquifer  = max(20, 50 + elevation/100 + 2·slope − (15 if efficiency > 0.6))
//! window   = [max(30, aquifer − 20), min(200, aquifer + 50)]
//! clay (slope < 5°) at 25 m, bedrock (slope > 10°) at 60 m push the top down
//! efficiency > 0.7 lets the top rise 10 m (never above 20 m)
//! ```

use crate::types::{ConfiningLayer, ConfiningLayerKind, DepthRange, MAX_DRILL_DEPTH_M, MIN_DRILL_DEPTH_M};
use tracing::debug;

const DEFAULT_MIN_M: f64 = 30.0;
const DEFAULT_MAX_M: f64 = 200.0;
const CLAY_DEPTH_M: f64 = 25.0;
const BEDROCK_DEPTH_M: f64 = 60.0;

/// Terrain and recharge inputs for one site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthInputs {
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub recharge_efficiency: f64,
}

pub fn estimate_aquifer_depth(inputs: &DepthInputs) -> f64 {
    let mut depth = 50.0 + inputs.elevation_m / 100.0 + inputs.slope_deg * 2.0;
    if inputs.recharge_efficiency > 0.6 {
        depth -= 15.0;
    }
    depth.max(MIN_DRILL_DEPTH_M)
}

pub fn confining_layers(slope_deg: f64) -> Vec<ConfiningLayer> {
    let mut layers = Vec::new();
    if slope_deg < 5.0 {
        layers.push(ConfiningLayer {
            kind: ConfiningLayerKind::Clay,
            depth_m: CLAY_DEPTH_M,
        });
    }
    if slope_deg > 10.0 {
        layers.push(ConfiningLayer {
            kind: ConfiningLayerKind::Bedrock,
            depth_m: BEDROCK_DEPTH_M,
        });
    }
    layers
}

/// 0.5 base, +0.2 for a window under 50 m, −0.2 over 100 m, +0.1 for the
/// recommendation (always present).
fn confidence(minimum: f64, maximum: f64) -> f64 {
    let spread = maximum - minimum;
    let mut c: f64 = 0.5 + 0.1;
    if spread < 50.0 {
        c += 0.2;
    } else if spread > 100.0 {
        c -= 0.2;
    }
    c.clamp(0.0, 1.0)
}

fn limitations(confidence: f64, inputs: &DepthInputs, adjusted: bool) -> Vec<String> {
    let mut notes = vec![
        "Depths are estimated from surface terrain and rainfall; no borehole logs were used".to_string(),
        "A geophysical survey is recommended before drilling".to_string(),
    ];
    if confidence < 0.6 {
        notes.push("Wide depth window: local subsurface data is scarce".to_string());
        notes.push("Consult nearby borehole records to narrow the estimate".to_string());
    }
    if inputs.recharge_efficiency < 0.2 {
        notes.push("Low recharge efficiency: shallow aquifers may be seasonal".to_string());
    }
    if adjusted {
        notes.push(format!(
            "Depths adjusted to stay ordered within the {MIN_DRILL_DEPTH_M:.0}-{MAX_DRILL_DEPTH_M:.0} m drilling range"
        ));
    }
    notes
}

pub fn estimate_depth(inputs: &DepthInputs) -> DepthRange {
    let aquifer = estimate_aquifer_depth(inputs);
    let mut minimum = DEFAULT_MIN_M.max(aquifer - 20.0);
    let mut maximum = DEFAULT_MAX_M.min(aquifer + 50.0);

    let layers = confining_layers(inputs.slope_deg);
    for layer in &layers {
        if layer.depth_m > minimum {
            minimum = layer.depth_m + 10.0;
        }
    }

    if inputs.recharge_efficiency > 0.7 {
        minimum = MIN_DRILL_DEPTH_M.max(minimum - 10.0);
    }

    // Keep the window ordered and inside the drillable range
    let (raw_min, raw_max) = (minimum, maximum);
    maximum = maximum.clamp(MIN_DRILL_DEPTH_M, MAX_DRILL_DEPTH_M);
    minimum = minimum.clamp(MIN_DRILL_DEPTH_M, maximum);
    let recommended_m = aquifer.clamp(minimum, maximum);
    let adjusted = raw_min != minimum || raw_max != maximum || aquifer != recommended_m;

    let confidence = confidence(minimum, maximum);
    debug!(
        aquifer,
        minimum,
        maximum,
        recommended = recommended_m,
        confidence,
        adjusted,
        "Depth window estimated"
    );

    DepthRange {
        minimum_m: minimum,
        maximum_m: maximum,
        recommended_m,
        confidence,
        limitations: limitations(confidence, inputs, adjusted),
        estimated_aquifer_depth_m: aquifer,
        confining_layers: layers,
    }
}
