//! Field polygon geometry: parsing, validation, centroid, bounding box, area

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for the local equirectangular projection (m).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Vertices closer than this (degrees) are treated as the same point.
const VERTEX_EPSILON: f64 = 1e-12;

/// A (lon, lat) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    fn same_as(&self, other: &Self) -> bool {
        (self.lon - other.lon).abs() < VERTEX_EPSILON && (self.lat - other.lat).abs() < VERTEX_EPSILON
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn width_deg(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height_deg(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        (self.min_lon..=self.max_lon).contains(&c.lon) && (self.min_lat..=self.max_lat).contains(&c.lat)
    }

    /// Cell-centre coordinate for a `rows × cols` grid laid over the box.
    pub fn cell_center(&self, row: usize, col: usize, rows: usize, cols: usize) -> Coordinate {
        let rows = rows.max(1) as f64;
        let cols = cols.max(1) as f64;
        Coordinate {
            lon: self.min_lon + self.width_deg() * (col as f64 + 0.5) / cols,
            lat: self.max_lat - self.height_deg() * (row as f64 + 0.5) / rows,
        }
    }
}

/// Closed, simple polygon ring. The first vertex is repeated at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    ring: Vec<Coordinate>,
}

impl Polygon {
    /// Build and validate a ring from `[lon, lat]` pairs.
    ///
    /// Fails with `InvalidGeometry` when the ring has fewer than four points,
    /// is not closed, has fewer than three distinct vertices, carries
    /// out-of-range coordinates, or self-intersects.
    pub fn new(points: Vec<Coordinate>) -> EngineResult<Self> {
        if points.len() < 4 {
            return Err(EngineError::InvalidGeometry(format!(
                "ring needs at least 4 points (first = last), got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|c| !c.is_valid()) {
            return Err(EngineError::InvalidGeometry(format!(
                "coordinate out of range: lon={}, lat={}",
                bad.lon, bad.lat
            )));
        }
        let (first, last) = (points[0], points[points.len() - 1]);
        if !first.same_as(&last) {
            return Err(EngineError::InvalidGeometry(
                "ring is not closed (first vertex must equal last)".to_string(),
            ));
        }

        let mut distinct: Vec<Coordinate> = Vec::with_capacity(points.len());
        for p in &points[..points.len() - 1] {
            if !distinct.iter().any(|d| d.same_as(p)) {
                distinct.push(*p);
            }
        }
        if distinct.len() < 3 {
            return Err(EngineError::InvalidGeometry(format!(
                "ring needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }

        let polygon = Self { ring: points };
        if polygon.is_self_intersecting() {
            return Err(EngineError::InvalidGeometry("ring self-intersects".to_string()));
        }
        Ok(polygon)
    }

    /// Parse a GeoJSON-like object: either a Feature with `geometry.coordinates`
    /// or a bare Polygon geometry. Only the outer ring is used.
    pub fn from_geojson(value: &serde_json::Value) -> EngineResult<Self> {
        let coordinates = value
            .get("geometry")
            .and_then(|g| g.get("coordinates"))
            .or_else(|| value.get("coordinates"))
            .ok_or_else(|| EngineError::InvalidGeometry("missing coordinates".to_string()))?;

        let outer = coordinates
            .as_array()
            .and_then(|rings| rings.first())
            .and_then(|ring| ring.as_array())
            .ok_or_else(|| EngineError::InvalidGeometry("coordinates must be [[[lon, lat], ...]]".to_string()))?;

        let points = outer
            .iter()
            .map(|pair| {
                let pair = pair.as_array().filter(|p| p.len() >= 2).ok_or_else(|| {
                    EngineError::InvalidGeometry(format!("malformed position: {pair}"))
                })?;
                match (pair[0].as_f64(), pair[1].as_f64()) {
                    (Some(lon), Some(lat)) => Ok(Coordinate::new(lon, lat)),
                    _ => Err(EngineError::InvalidGeometry(format!(
                        "non-numeric position: {pair:?}"
                    ))),
                }
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Self::new(points)
    }

    /// Ring including the closing vertex.
    pub fn ring(&self) -> &[Coordinate] {
        &self.ring
    }

    /// Distinct vertices (closing vertex dropped).
    pub fn vertices(&self) -> &[Coordinate] {
        &self.ring[..self.ring.len() - 1]
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for c in &self.ring {
            bbox.min_lon = bbox.min_lon.min(c.lon);
            bbox.min_lat = bbox.min_lat.min(c.lat);
            bbox.max_lon = bbox.max_lon.max(c.lon);
            bbox.max_lat = bbox.max_lat.max(c.lat);
        }
        bbox
    }

    /// Signed shoelace area in square degrees (positive = counter-clockwise).
    fn signed_area_deg(&self) -> f64 {
        self.ring
            .windows(2)
            .map(|w| w[0].lon * w[1].lat - w[1].lon * w[0].lat)
            .sum::<f64>()
            / 2.0
    }

    /// Area-weighted centroid; falls back to the vertex mean for
    /// near-degenerate rings.
    pub fn centroid(&self) -> Coordinate {
        let a = self.signed_area_deg();
        if a.abs() < 1e-15 {
            let verts = self.vertices();
            let n = verts.len() as f64;
            return Coordinate {
                lon: verts.iter().map(|c| c.lon).sum::<f64>() / n,
                lat: verts.iter().map(|c| c.lat).sum::<f64>() / n,
            };
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for w in self.ring.windows(2) {
            let cross = w[0].lon * w[1].lat - w[1].lon * w[0].lat;
            cx += (w[0].lon + w[1].lon) * cross;
            cy += (w[0].lat + w[1].lat) * cross;
        }
        Coordinate {
            lon: cx / (6.0 * a),
            lat: cy / (6.0 * a),
        }
    }

    /// Planar area in square metres using an equirectangular projection
    /// about the centroid latitude. Accurate for field-sized polygons.
    pub fn area_m2(&self) -> f64 {
        let lat0 = self.centroid().lat.to_radians();
        let project = |c: &Coordinate| {
            (
                EARTH_RADIUS_M * c.lon.to_radians() * lat0.cos(),
                EARTH_RADIUS_M * c.lat.to_radians(),
            )
        };
        let projected: Vec<(f64, f64)> = self.ring.iter().map(project).collect();
        (projected
            .windows(2)
            .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
            .sum::<f64>()
            / 2.0)
            .abs()
    }

    pub fn area_hectares(&self) -> f64 {
        self.area_m2() / 10_000.0
    }

    /// Pairwise check of non-adjacent edges for proper or touching intersections.
    pub fn is_self_intersecting(&self) -> bool {
        let edges: Vec<(Coordinate, Coordinate)> =
            self.ring.windows(2).map(|w| (w[0], w[1])).collect();
        let n = edges.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                if adjacent {
                    continue;
                }
                if segments_intersect(edges[i].0, edges[i].1, edges[j].0, edges[j].1) {
                    return true;
                }
            }
        }
        false
    }
}

fn orientation(a: Coordinate, b: Coordinate, c: Coordinate) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn on_segment(a: Coordinate, b: Coordinate, p: Coordinate) -> bool {
    p.lon >= a.lon.min(b.lon) - VERTEX_EPSILON
        && p.lon <= a.lon.max(b.lon) + VERTEX_EPSILON
        && p.lat >= a.lat.min(b.lat) - VERTEX_EPSILON
        && p.lat <= a.lat.max(b.lat) + VERTEX_EPSILON
}

fn segments_intersect(p1: Coordinate, p2: Coordinate, q1: Coordinate, q2: Coordinate) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1.abs() < VERTEX_EPSILON && on_segment(q1, q2, p1))
        || (d2.abs() < VERTEX_EPSILON && on_segment(q1, q2, p2))
        || (d3.abs() < VERTEX_EPSILON && on_segment(p1, p2, q1))
        || (d4.abs() < VERTEX_EPSILON && on_segment(p1, p2, q2))
}
