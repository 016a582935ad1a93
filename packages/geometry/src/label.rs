//! Label anchor placement.
//!
//! A boundary's label goes at the area-weighted centroid of its largest
//! exterior ring, so multi-part states (islands, peninsulas) are labeled
//! on their main body.

use geo::{Area as _, Centroid as _, LineString, Polygon};
use region_map_geometry_models::{Geometry, Position, Ring};

/// Rings with less planar area than this fall back to the vertex mean.
const MIN_CENTROID_AREA: f64 = 1e-10;

/// Returns the label anchor for a geometry, or `None` if no exterior ring
/// has at least three points.
#[must_use]
pub fn label_point(geometry: &Geometry) -> Option<Position> {
    let (ring, polygon, area) = geometry
        .exterior_rings()
        .into_iter()
        .filter(|ring| ring.len() >= 3)
        .map(|ring| {
            let polygon = exterior_polygon(ring);
            let area = polygon.unsigned_area();
            (ring, polygon, area)
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))?;

    if area < MIN_CENTROID_AREA {
        return vertex_mean(ring);
    }

    polygon
        .centroid()
        .map(|p| [p.x(), p.y()])
        .or_else(|| vertex_mean(ring))
}

fn exterior_polygon(ring: &Ring) -> Polygon<f64> {
    Polygon::new(LineString::from(ring.clone()), vec![])
}

#[allow(clippy::cast_precision_loss)]
fn vertex_mean(ring: &Ring) -> Option<Position> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (sx, sy) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
    Some([sx / n, sy / n])
}
