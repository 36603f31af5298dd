//! Hydrogeology lookup for the report
//!
//! Gathers lithology, nearby formations and tagged features for a point.
//! Each source degrades independently; the summary is flagged as fallback
//! when lithology or formations are missing.

use super::hardness::{classify_rock, is_aquifer_rock};
use crate::config::EngineConfig;
use crate::providers::DataProvider;
use crate::types::{Coordinate, GeologicalFormation, HydroGeologicalFeatures, LithologyUnit};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct HydrogeologyLookup {
    provider: Arc<dyn DataProvider>,
    formation_radius_km: f64,
    feature_radius_m: f64,
}

impl HydrogeologyLookup {
    pub fn new(provider: Arc<dyn DataProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            formation_radius_km: config.providers.formation_radius_km,
            feature_radius_m: config.providers.feature_radius_m,
        }
    }

    pub async fn lookup(&self, point: Coordinate) -> HydroGeologicalFeatures {
        let (lat, lon) = (point.lat, point.lon);
        let (lithology, formations, features) = tokio::join!(
            self.provider.fetch_lithology(lat, lon),
            self.provider.fetch_geological_formations(lat, lon, self.formation_radius_km),
            self.provider.fetch_geological_features(lat, lon, self.feature_radius_m),
        );

        let mut notes = Vec::new();
        let lithology = match lithology {
            Ok(resp) if resp.success => resp.data,
            Ok(_) => {
                notes.push("No lithology units mapped at this location".to_string());
                Vec::new()
            }
            Err(e) => {
                warn!(lat, lon, error = %e, "Lithology lookup failed");
                notes.push(format!("Lithology unavailable ({e})"));
                Vec::new()
            }
        };
        let formations = formations.unwrap_or_else(|e| {
            warn!(lat, lon, error = %e, "Formation lookup failed");
            notes.push(format!("Formations unavailable ({e})"));
            Vec::new()
        });
        let features = features.unwrap_or_else(|e| {
            warn!(lat, lon, error = %e, "Feature lookup failed");
            notes.push(format!("Geological features unavailable ({e})"));
            Vec::new()
        });

        let dominant_rock_type = dominant_rock_type(&formations, &lithology);
        let aquifer_formations = formations
            .iter()
            .filter(|f| is_aquifer_rock(&f.formation_type))
            .count();
        let fracture_count = features.iter().filter(|f| f.tag == "fracture").count();
        let is_fallback = lithology.is_empty() || formations.is_empty();

        info!(
            lat,
            lon,
            lithology = lithology.len(),
            formations = formations.len(),
            features = features.len(),
            dominant = dominant_rock_type.as_deref().unwrap_or("unknown"),
            is_fallback,
            "Hydrogeology lookup complete"
        );

        HydroGeologicalFeatures {
            lithology,
            formations,
            features,
            dominant_rock_type,
            aquifer_formations,
            fracture_count,
            geology_score: None,
            is_fallback,
            note: (!notes.is_empty()).then(|| notes.join("; ")),
        }
    }
}

/// Rock class with the largest total coverage, else the first classifiable
/// lithology unit.
pub fn dominant_rock_type(formations: &[GeologicalFormation], lithology: &[LithologyUnit]) -> Option<String> {
    let mut coverage: BTreeMap<&str, f64> = BTreeMap::new();
    for f in formations {
        let class = classify_rock(&f.formation_type).unwrap_or(f.formation_type.as_str());
        *coverage.entry(class).or_insert(0.0) += f.coverage();
    }
    coverage
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(class, _)| class.to_lowercase())
        .or_else(|| {
            lithology
                .iter()
                .find_map(|u| classify_rock(&u.lith_type).or_else(|| classify_rock(&u.description)))
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Capability, SyntheticProvider};

    #[test]
    fn test_dominant_by_coverage() {
        let formations = vec![
            GeologicalFormation::new("granite"),
            GeologicalFormation::new("Sandstone").with_magnitude(3.0),
        ];
        assert_eq!(dominant_rock_type(&formations, &[]).as_deref(), Some("sandstone"));
    }

    #[test]
    fn test_dominant_from_lithology_when_no_formations() {
        let unit = LithologyUnit {
            lith_type: "Metamorphic".to_string(),
            age: String::new(),
            name: String::new(),
            description: String::new(),
            coords: None,
        };
        assert_eq!(dominant_rock_type(&[], &[unit]).as_deref(), Some("metamorphic"));
        assert_eq!(dominant_rock_type(&[], &[]), None);
    }

    #[tokio::test]
    async fn test_lookup_summarizes_sources() {
        let provider = Arc::new(SyntheticProvider::new(1));
        let lookup = HydrogeologyLookup::new(provider, &EngineConfig::default());
        let hydro = lookup.lookup(Coordinate::new(31.0, -17.8)).await;
        assert_eq!(hydro.aquifer_formations, 1);
        assert_eq!(hydro.fracture_count, 1);
        assert_eq!(hydro.dominant_rock_type.as_deref(), Some("sandstone"));
        assert!(!hydro.is_fallback);
    }

    #[tokio::test]
    async fn test_lithology_failure_degrades() {
        let provider = Arc::new(SyntheticProvider::new(1).with_failure(Capability::Lithology));
        let lookup = HydrogeologyLookup::new(provider, &EngineConfig::default());
        let hydro = lookup.lookup(Coordinate::new(31.0, -17.8)).await;
        assert!(hydro.lithology.is_empty());
        assert!(hydro.is_fallback);
        assert!(hydro.note.unwrap().contains("Lithology unavailable"));
        assert_eq!(hydro.formations.len(), 2);
    }
}
