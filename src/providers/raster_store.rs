//! In-memory stand-in for the external raster layer service

use crate::error::{EngineError, EngineResult};
use crate::types::{BoundingBox, PotentialWeights, RasterHandle, RasterLayer};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// A published weighted-sum surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialSurface {
    pub bbox: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl PotentialSurface {
    /// Weighted cell-wise sum of `layers`. Every layer must share one grid.
    pub fn compose(
        layers: &[RasterLayer],
        weights: &PotentialWeights,
        bbox: &BoundingBox,
    ) -> EngineResult<Self> {
        let first = layers
            .first()
            .ok_or_else(|| EngineError::computation("potential", "no raster layers to combine"))?;
        let (rows, cols) = (first.rows, first.cols);
        if let Some(bad) = layers
            .iter()
            .find(|l| !l.is_well_formed() || l.rows != rows || l.cols != cols)
        {
            return Err(EngineError::computation(
                "potential",
                format!("layer {} is {}x{}, expected {rows}x{cols}", bad.kind, bad.rows, bad.cols),
            ));
        }

        let mut values = vec![0.0; rows * cols];
        for layer in layers {
            let w = weights.get(layer.kind);
            for (acc, v) in values.iter_mut().zip(&layer.values) {
                *acc += w * v;
            }
        }
        Ok(Self {
            bbox: *bbox,
            rows,
            cols,
            values,
        })
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Concurrent handle → surface map.
#[derive(Debug, Default)]
pub struct InMemoryRasterStore {
    surfaces: DashMap<RasterHandle, PotentialSurface>,
}

impl InMemoryRasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, surface: PotentialSurface) -> RasterHandle {
        let handle = RasterHandle(format!("potential-{}", Uuid::new_v4()));
        debug!(handle = %handle, cells = surface.values.len(), "Published potential surface");
        self.surfaces.insert(handle.clone(), surface);
        handle
    }

    pub fn get(&self, handle: &RasterHandle) -> Option<PotentialSurface> {
        self.surfaces.get(handle).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RasterKind;

    fn bbox() -> BoundingBox {
        BoundingBox { min_lon: 0.0, min_lat: 0.0, max_lon: 0.01, max_lat: 0.01 }
    }

    #[test]
    fn test_compose_weighted_sum() {
        let layers = vec![
            RasterLayer::constant(RasterKind::Elevation, bbox(), 2, 2, 1.0),
            RasterLayer::constant(RasterKind::Precipitation, bbox(), 2, 2, 0.5),
        ];
        let surface = PotentialSurface::compose(&layers, &PotentialWeights::default(), &bbox()).unwrap();
        for v in &surface.values {
            assert!((v - (0.15 + 0.20 * 0.5)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_compose_rejects_mismatched_grids() {
        let layers = vec![
            RasterLayer::constant(RasterKind::Elevation, bbox(), 2, 2, 1.0),
            RasterLayer::constant(RasterKind::Slope, bbox(), 3, 3, 1.0),
        ];
        assert!(PotentialSurface::compose(&layers, &PotentialWeights::default(), &bbox()).is_err());
        assert!(PotentialSurface::compose(&[], &PotentialWeights::default(), &bbox()).is_err());
    }

    #[test]
    fn test_publish_returns_opaque_handle() {
        let store = InMemoryRasterStore::new();
        let layers = vec![RasterLayer::constant(RasterKind::Elevation, bbox(), 1, 1, 0.2)];
        let surface = PotentialSurface::compose(&layers, &PotentialWeights::default(), &bbox()).unwrap();
        let handle = store.publish(surface.clone());
        assert!(handle.0.starts_with("potential-"));
        assert_eq!(store.get(&handle), Some(surface));
        assert_eq!(store.len(), 1);
    }
}
