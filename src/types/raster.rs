//! Gridded layers feeding the groundwater-potential surface

use super::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Input layers recognised by the potential aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterKind {
    Elevation,
    Slope,
    Landcover,
    SoilMoisture,
    Temperature,
    Geology,
    Precipitation,
}

impl RasterKind {
    pub const ALL: [Self; 7] = [
        Self::Elevation,
        Self::Slope,
        Self::Landcover,
        Self::SoilMoisture,
        Self::Temperature,
        Self::Geology,
        Self::Precipitation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elevation => "elevation",
            Self::Slope => "slope",
            Self::Landcover => "landcover",
            Self::SoilMoisture => "soil",
            Self::Temperature => "temp",
            Self::Geology => "geology",
            Self::Precipitation => "precipitation",
        }
    }
}

impl std::fmt::Display for RasterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-major grid of cell values laid over a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    pub kind: RasterKind,
    pub bbox: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl RasterLayer {
    /// A layer with every cell equal to `value`.
    pub fn constant(kind: RasterKind, bbox: BoundingBox, rows: usize, cols: usize, value: f64) -> Self {
        Self {
            kind,
            bbox,
            rows,
            cols,
            values: vec![value; rows * cols],
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.rows > 0 && self.cols > 0 && self.values.len() == self.rows * self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols)
            .then(|| self.values[row * self.cols + col])
    }

    /// Linearly rescale `[lo, hi]` onto `[0, 1]`, clipping outside values.
    /// Non-finite cells become 0.
    pub fn normalized(&self, lo: f64, hi: f64) -> Self {
        let span = hi - lo;
        let values = self
            .values
            .iter()
            .map(|v| {
                if !v.is_finite() || span <= 0.0 {
                    0.0
                } else {
                    ((v - lo) / span).clamp(0.0, 1.0)
                }
            })
            .collect();
        Self {
            values,
            ..self.clone()
        }
    }

    /// Slope grid in degrees from an elevation grid in metres.
    ///
    /// Central differences in the interior, one-sided at the edges; cell
    /// spacing comes from the bounding box.
    pub fn slope_degrees(&self) -> Self {
        let mid_lat = (self.bbox.min_lat + self.bbox.max_lat) / 2.0;
        let dx = self.bbox.width_deg() * METERS_PER_DEGREE * mid_lat.to_radians().cos() / self.cols.max(1) as f64;
        let dy = self.bbox.height_deg() * METERS_PER_DEGREE / self.rows.max(1) as f64;

        let z = |r: usize, c: usize| self.values.get(r * self.cols + c).copied().unwrap_or(0.0);
        let derivative = |lo: f64, hi: f64, steps: usize, spacing: f64| {
            if steps == 0 || spacing <= 0.0 {
                0.0
            } else {
                (hi - lo) / (steps as f64 * spacing)
            }
        };

        let mut values = Vec::with_capacity(self.rows * self.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let (c0, c1) = (c.saturating_sub(1), (c + 1).min(self.cols - 1));
                let (r0, r1) = (r.saturating_sub(1), (r + 1).min(self.rows - 1));
                let dzdx = derivative(z(r, c0), z(r, c1), c1 - c0, dx);
                let dzdy = derivative(z(r0, c), z(r1, c), r1 - r0, dy);
                values.push(dzdx.hypot(dzdy).atan().to_degrees());
            }
        }
        Self {
            kind: RasterKind::Slope,
            bbox: self.bbox,
            rows: self.rows,
            cols: self.cols,
            values,
        }
    }

    /// Cell-wise mean; 0 for an empty layer.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }
}

/// Opaque identifier for a surface published to the raster service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RasterHandle(pub String);

impl std::fmt::Display for RasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layer weights for the potential surface, keyed by layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PotentialWeights {
    pub elevation: f64,
    pub slope: f64,
    pub landcover: f64,
    pub soil: f64,
    pub temp: f64,
    pub geology: f64,
    pub precipitation: f64,
}

impl Default for PotentialWeights {
    fn default() -> Self {
        Self {
            elevation: 0.15,
            slope: 0.10,
            landcover: 0.10,
            soil: 0.15,
            temp: 0.10,
            geology: 0.20,
            precipitation: 0.20,
        }
    }
}

impl PotentialWeights {
    pub fn get(&self, kind: RasterKind) -> f64 {
        match kind {
            RasterKind::Elevation => self.elevation,
            RasterKind::Slope => self.slope,
            RasterKind::Landcover => self.landcover,
            RasterKind::SoilMoisture => self.soil,
            RasterKind::Temperature => self.temp,
            RasterKind::Geology => self.geology,
            RasterKind::Precipitation => self.precipitation,
        }
    }

    pub fn get_mut(&mut self, kind: RasterKind) -> &mut f64 {
        match kind {
            RasterKind::Elevation => &mut self.elevation,
            RasterKind::Slope => &mut self.slope,
            RasterKind::Landcover => &mut self.landcover,
            RasterKind::SoilMoisture => &mut self.soil,
            RasterKind::Temperature => &mut self.temp,
            RasterKind::Geology => &mut self.geology,
            RasterKind::Precipitation => &mut self.precipitation,
        }
    }

    pub fn sum(&self) -> f64 {
        RasterKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox { min_lon: 0.0, min_lat: 0.0, max_lon: 1.0, max_lat: 1.0 }
    }

    #[test]
    fn test_normalize_clips() {
        let layer = RasterLayer {
            kind: RasterKind::Elevation,
            bbox: bbox(),
            rows: 1,
            cols: 4,
            values: vec![-100.0, 0.0, 1500.0, 4000.0],
        };
        let n = layer.normalized(0.0, 3000.0);
        assert_eq!(n.values, vec![0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_slope_from_tilted_plane() {
        let bbox = BoundingBox { min_lon: 0.0, min_lat: 0.0, max_lon: 0.01, max_lat: 0.01 };
        let rows = 4;
        let cell_m = 0.01 * METERS_PER_DEGREE / rows as f64;
        // 10 degree north-south tilt
        let drop = cell_m * 10f64.to_radians().tan();
        let values = (0..rows * rows).map(|i| 500.0 - (i / rows) as f64 * drop).collect();
        let layer = RasterLayer { kind: RasterKind::Elevation, bbox, rows, cols: rows, values };
        let slope = layer.slope_degrees();
        assert_eq!(slope.kind, RasterKind::Slope);
        for v in &slope.values {
            assert!((v - 10.0).abs() < 1e-6, "{v}");
        }
    }

    #[test]
    fn test_single_cell_slope_is_flat() {
        let layer = RasterLayer::constant(RasterKind::Elevation, bbox(), 1, 1, 800.0);
        assert_eq!(layer.slope_degrees().values, vec![0.0]);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((PotentialWeights::default().sum() - 1.0).abs() < 1e-12);
    }
}
