//! Site accessibility
//!
//! Road distance, flood risk and travel time come from an external
//! subsystem. The engine calls it through `AccessibilityAnalyzer` and never
//! depends on its internals; without one configured the report carries an
//! "unavailable" section. Implementations cache their lookups in
//! `GeospatialCache::global()` under the `Flood`, `Roads` and `Country`
//! categories.

use crate::error::EngineResult;
use crate::types::{AccessibilityAnalysis, Polygon};
use async_trait::async_trait;

#[async_trait]
pub trait AccessibilityAnalyzer: Send + Sync {
    async fn analyze(&self, polygon: &Polygon) -> EngineResult<AccessibilityAnalysis>;
}

/// Placeholder used when no accessibility service is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableAccessibility;

#[async_trait]
impl AccessibilityAnalyzer for UnavailableAccessibility {
    async fn analyze(&self, _polygon: &Polygon) -> EngineResult<AccessibilityAnalysis> {
        Ok(AccessibilityAnalysis::unavailable(
            "Accessibility analysis is not configured for this deployment",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinate, FloodRisk};

    #[tokio::test]
    async fn test_unavailable_section() {
        let polygon = Polygon::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.01, 0.0),
            Coordinate::new(0.01, 0.01),
            Coordinate::new(0.0, 0.0),
        ])
        .unwrap();
        let a = UnavailableAccessibility.analyze(&polygon).await.unwrap();
        assert_eq!(a.flood_risk, FloodRisk::Unknown);
        assert!(a.nearest_road_m.is_none());
        assert!(a.note.is_some());
    }
}
