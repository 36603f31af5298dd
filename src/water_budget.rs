//! Water budget: surface, groundwater and soil-moisture volumes over the
//! field, all in cubic metres.

use crate::config::WaterBudgetConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::WaterAvailability;

const STAGE: &str = "water_budget";

/// Unit label carried by every `WaterAvailability`.
pub const WATER_UNITS: &str = "cubic_meters";

/// `avg_annual_rainfall_m × area × runoff_coefficient`
pub fn surface_water_m3(avg_annual_rainfall_mm: f64, area_m2: f64, runoff_coefficient: f64) -> EngineResult<f64> {
    if !(0.0..=1.0).contains(&runoff_coefficient) {
        return Err(EngineError::computation(
            STAGE,
            format!("runoff coefficient must be within [0, 1], got {runoff_coefficient}"),
        ));
    }
    Ok(avg_annual_rainfall_mm / 1_000.0 * area_m2 * runoff_coefficient)
}

/// `recharge_events × aquifer_thickness × specific_yield × area`
pub fn groundwater_m3(
    recharge_events: usize,
    aquifer_thickness_m: f64,
    specific_yield: f64,
    area_m2: f64,
) -> EngineResult<f64> {
    if aquifer_thickness_m <= 0.0 || !aquifer_thickness_m.is_finite() {
        return Err(EngineError::computation(
            STAGE,
            format!("aquifer thickness must be positive, got {aquifer_thickness_m}"),
        ));
    }
    if !(specific_yield > 0.0 && specific_yield < 1.0) {
        return Err(EngineError::computation(
            STAGE,
            format!("specific yield must be within (0, 1), got {specific_yield}"),
        ));
    }
    Ok(recharge_events as f64 * aquifer_thickness_m * specific_yield * area_m2)
}

/// `area × soil_depth × porosity`
pub fn soil_moisture_m3(area_m2: f64, soil_depth_m: f64, porosity: f64) -> EngineResult<f64> {
    if !(porosity > 0.0 && porosity < 1.0) {
        return Err(EngineError::computation(
            STAGE,
            format!("soil porosity must be within (0, 1), got {porosity}"),
        ));
    }
    Ok(area_m2 * soil_depth_m * porosity)
}

pub struct WaterBudgetEstimator {
    config: WaterBudgetConfig,
}

impl WaterBudgetEstimator {
    pub fn new(config: WaterBudgetConfig) -> Self {
        Self { config }
    }

    pub fn estimate(
        &self,
        avg_annual_rainfall_mm: f64,
        area_m2: f64,
        recharge_events: usize,
    ) -> EngineResult<WaterAvailability> {
        if !(area_m2.is_finite() && area_m2 >= 0.0) {
            return Err(EngineError::computation(STAGE, format!("invalid field area {area_m2}")));
        }
        let c = &self.config;
        Ok(WaterAvailability {
            surface_m3: surface_water_m3(avg_annual_rainfall_mm, area_m2, c.runoff_coefficient)?,
            groundwater_m3: groundwater_m3(recharge_events, c.aquifer_thickness_m, c.specific_yield, area_m2)?,
            soil_moisture_m3: soil_moisture_m3(area_m2, c.soil_depth_m, c.soil_porosity)?,
            units: WATER_UNITS.to_string(),
        })
    }
}

impl Default for WaterBudgetEstimator {
    fn default() -> Self {
        Self::new(WaterBudgetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hectare_budget() {
        let w = WaterBudgetEstimator::default().estimate(800.0, 10_000.0, 4).unwrap();
        assert!((w.surface_m3 - 0.8 * 10_000.0 * 0.3).abs() < 1e-9);
        assert!((w.groundwater_m3 - 4.0 * 30.0 * 0.15 * 10_000.0).abs() < 1e-6);
        assert!((w.soil_moisture_m3 - 10_000.0 * 1.0 * 0.4).abs() < 1e-9);
        assert_eq!(w.units, "cubic_meters");
    }

    #[test]
    fn test_preconditions() {
        assert!(groundwater_m3(1, 0.0, 0.15, 1.0).is_err());
        assert!(groundwater_m3(1, 30.0, 1.0, 1.0).is_err());
        assert!(groundwater_m3(1, 30.0, 0.0, 1.0).is_err());
        assert!(soil_moisture_m3(1.0, 1.0, 1.0).is_err());
        let err = soil_moisture_m3(1.0, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::ComputationError { ref stage, .. } if stage == STAGE));
    }

    #[test]
    fn test_no_recharge_no_groundwater() {
        let w = WaterBudgetEstimator::default().estimate(500.0, 2_000.0, 0).unwrap();
        assert_eq!(w.groundwater_m3, 0.0);
    }
}
