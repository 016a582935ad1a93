#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-in-boundary lookups for interactive hit-testing.
//!
//! Every ring gets an axis-aligned bounding box; a point outside the box
//! never reaches the ray-casting test. [`locate`] works directly on a
//! feature slice, while [`SpatialIndex`] precomputes the boxes once and
//! puts features in an R-tree so pointer-motion queries stay cheap.

use region_map_geometry_models::{Feature, Geometry, Position, Ring};
use rstar::{AABB, RTree, RTreeObject};

/// `MultiPolygon` parts with fewer exterior points than this are skipped
/// during hit-testing (minor islands).
pub const MIN_HIT_TEST_POINTS: usize = 100;

/// Axis-aligned bounding box of a ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum x (longitude).
    pub min_x: f64,
    /// Minimum y (latitude).
    pub min_y: f64,
    /// Maximum x (longitude).
    pub max_x: f64,
    /// Maximum y (latitude).
    pub max_y: f64,
}

impl Bounds {
    /// Computes the bounds of a ring. `None` for an empty ring.
    #[must_use]
    pub fn of_ring(ring: &[Position]) -> Option<Self> {
        let (&[x0, y0], rest) = ring.split_first()?;
        Some(rest.iter().fold(
            Self {
                min_x: x0,
                min_y: y0,
                max_x: x0,
                max_y: y0,
            },
            |b, &[x, y]| Self {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        ))
    }

    /// Returns `true` if the point lies inside or on the box.
    #[must_use]
    pub fn contains(&self, [x, y]: Position) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Ray-casting containment test for a single ring.
///
/// A horizontal ray is cast from the point. For each edge (wrapping last to
/// first) whose y-range satisfies `min < y <= max` and whose right end is
/// not left of the point, the inside flag toggles when the edge is
/// vertical or the point is at or left of the edge's x-intersection.
/// Rings with fewer than three points contain nothing.
///
/// Boundary points are decided by that rule alone: on the unit square, a
/// point on the left edge is outside and one on the right edge is inside.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn ring_contains(ring: &[Position], point: Position) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let [x, y] = point;
    let n = ring.len();
    let mut inside = false;

    let [mut p1x, mut p1y] = ring[0];
    for i in 1..=n {
        let [p2x, p2y] = ring[i % n];
        if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
            // The y-range test above rules out horizontal edges.
            let toggles = p1x == p2x || {
                let x_intersect = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
                x <= x_intersect
            };
            if toggles {
                inside = !inside;
            }
        }
        p1x = p2x;
        p1y = p2y;
    }

    inside
}

/// Rings of a geometry that take part in hit-testing, in declared order.
///
/// For a `Polygon` this is its exterior ring. For a `MultiPolygon` it is
/// the exterior of every part with at least [`MIN_HIT_TEST_POINTS`] points.
fn hit_test_rings(geometry: &Geometry) -> Vec<&Ring> {
    match geometry {
        Geometry::Polygon(rings) => rings.first().into_iter().collect(),
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|p| p.first())
            .filter(|ring| ring.len() >= MIN_HIT_TEST_POINTS)
            .collect(),
    }
}

/// Returns `true` if the point falls inside the feature's geometry.
#[must_use]
pub fn feature_contains(feature: &Feature, point: Position) -> bool {
    hit_test_rings(&feature.geometry).into_iter().any(|ring| {
        Bounds::of_ring(ring).is_some_and(|b| b.contains(point)) && ring_contains(ring, point)
    })
}

/// Returns the index of the first feature, in slice order, containing the
/// point. There is no nearest-feature fallback.
#[must_use]
pub fn locate(point: Position, candidates: &[Feature]) -> Option<usize> {
    candidates
        .iter()
        .position(|feature| feature_contains(feature, point))
}

/// A hit-test ring with its precomputed bounds.
#[derive(Debug, Clone)]
struct IndexedRing {
    bounds: Bounds,
    points: Ring,
}

/// A feature stored in the R-tree: its index in the source slice, its
/// overall envelope, and its hit-test rings.
#[derive(Debug, Clone)]
struct FeatureEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
    rings: Vec<IndexedRing>,
}

impl RTreeObject for FeatureEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Precomputed hit-test structure over a feature set.
///
/// Built once per loaded collection; lookups return the same answer as
/// [`locate`] over the slice it was built from.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<FeatureEntry>,
}

impl SpatialIndex {
    /// Builds the index. Features without any testable ring are left out.
    #[must_use]
    pub fn build(features: &[Feature]) -> Self {
        let entries: Vec<FeatureEntry> = features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let rings: Vec<IndexedRing> = hit_test_rings(&feature.geometry)
                    .into_iter()
                    .filter(|ring| ring.len() >= 3)
                    .filter_map(|ring| {
                        Bounds::of_ring(ring).map(|bounds| IndexedRing {
                            bounds,
                            points: ring.clone(),
                        })
                    })
                    .collect();
                let bounds = rings
                    .iter()
                    .map(|r| r.bounds)
                    .reduce(Bounds::union)?;
                Some(FeatureEntry {
                    index,
                    envelope: bounds.envelope(),
                    rings,
                })
            })
            .collect();

        log::debug!(
            "Built spatial index over {} of {} features",
            entries.len(),
            features.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no feature was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns the source index of the first feature containing the point.
    #[must_use]
    pub fn locate(&self, point: Position) -> Option<usize> {
        let query = AABB::from_point(point);
        let mut candidates: Vec<&FeatureEntry> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .collect();
        candidates.sort_unstable_by_key(|entry| entry.index);

        candidates
            .into_iter()
            .find(|entry| {
                entry
                    .rings
                    .iter()
                    .any(|ring| ring.bounds.contains(point) && ring_contains(&ring.points, point))
            })
            .map(|entry| entry.index)
    }
}

#[cfg(test)]
mod tests {
    use region_map_geometry_models::{FeatureProperties, StateProperties};

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        vec![
            [x0, y0],
            [x0, y0 + size],
            [x0 + size, y0 + size],
            [x0 + size, y0],
        ]
    }

    /// A square with `n` points per side, for `MultiPolygon` parts that must
    /// pass the point-count cutoff.
    #[allow(clippy::cast_precision_loss)]
    fn dense_square(x0: f64, y0: f64, size: f64, n: usize) -> Ring {
        let step = size / n as f64;
        let mut ring = Vec::with_capacity(n * 4);
        for i in 0..n {
            ring.push([x0, y0 + step * i as f64]);
        }
        for i in 0..n {
            ring.push([x0 + step * i as f64, y0 + size]);
        }
        for i in 0..n {
            ring.push([x0 + size, y0 + size - step * i as f64]);
        }
        for i in 0..n {
            ring.push([x0 + size - step * i as f64, y0]);
        }
        ring
    }

    fn state(name: &str, geometry: Geometry) -> Feature {
        Feature {
            geometry,
            properties: FeatureProperties::State(StateProperties {
                name: name.to_string(),
                abbr: String::new(),
                fips: String::new(),
            }),
        }
    }

    #[test]
    fn square_inside_and_outside() {
        let ring = square(0.0, 0.0, 10.0);
        assert!(ring_contains(&ring, [5.0, 5.0]));
        assert!(!ring_contains(&ring, [15.0, 15.0]));
        assert!(!ring_contains(&ring, [-1.0, 5.0]));
    }

    #[test]
    fn square_boundary_follows_toggle_rule() {
        let ring = square(0.0, 0.0, 10.0);
        // Both vertical edges toggle for a point on the left edge.
        assert!(!ring_contains(&ring, [0.0, 5.0]));
        // Only the right edge toggles for a point on it.
        assert!(ring_contains(&ring, [10.0, 5.0]));
        // Top edge: only the right vertical edge toggles.
        assert!(ring_contains(&ring, [5.0, 10.0]));
        // Bottom edge: y > min fails everywhere.
        assert!(!ring_contains(&ring, [5.0, 0.0]));
    }

    #[test]
    fn concave_ring() {
        // A "U" shape opening upwards.
        let ring = vec![
            [0.0, 0.0],
            [0.0, 10.0],
            [3.0, 10.0],
            [3.0, 3.0],
            [7.0, 3.0],
            [7.0, 10.0],
            [10.0, 10.0],
            [10.0, 0.0],
        ];
        assert!(ring_contains(&ring, [1.5, 8.0]));
        assert!(!ring_contains(&ring, [5.0, 8.0]));
        assert!(ring_contains(&ring, [5.0, 1.0]));
    }

    #[test]
    fn short_rings_contain_nothing() {
        assert!(!ring_contains(&[], [0.0, 0.0]));
        assert!(!ring_contains(&[[0.0, 0.0], [1.0, 1.0]], [0.5, 0.5]));
    }

    #[test]
    fn bounds_of_ring() {
        let bounds = Bounds::of_ring(&[[1.0, 5.0], [-2.0, 3.0], [4.0, -1.0]]).unwrap();
        assert_eq!(
            bounds,
            Bounds {
                min_x: -2.0,
                min_y: -1.0,
                max_x: 4.0,
                max_y: 5.0,
            }
        );
        assert!(bounds.contains([4.0, 5.0]));
        assert!(!bounds.contains([4.1, 0.0]));
        assert_eq!(Bounds::of_ring(&[]), None);
    }

    #[test]
    fn multipolygon_skips_small_parts() {
        let feature = state(
            "Islands",
            Geometry::MultiPolygon(vec![
                vec![square(100.0, 100.0, 10.0)],
                vec![dense_square(0.0, 0.0, 10.0, 30)],
            ]),
        );
        assert!(feature_contains(&feature, [5.0, 5.0]));
        // The small part has 4 points, below the cutoff.
        assert!(!feature_contains(&feature, [105.0, 105.0]));
    }

    #[test]
    fn polygon_is_tested_regardless_of_point_count() {
        let feature = state("Small", Geometry::Polygon(vec![square(0.0, 0.0, 1.0)]));
        assert!(feature_contains(&feature, [0.5, 0.5]));
    }

    #[test]
    fn locate_returns_first_match_in_order() {
        let features = vec![
            state("A", Geometry::Polygon(vec![square(20.0, 20.0, 5.0)])),
            state("B", Geometry::Polygon(vec![square(0.0, 0.0, 10.0)])),
            state("C", Geometry::Polygon(vec![square(0.0, 0.0, 10.0)])),
            state("D", Geometry::empty()),
        ];
        assert_eq!(locate([5.0, 5.0], &features), Some(1));
        assert_eq!(locate([22.0, 22.0], &features), Some(0));
        assert_eq!(locate([50.0, 50.0], &features), None);
    }

    #[test]
    fn index_matches_linear_locate() {
        let features = vec![
            state("A", Geometry::Polygon(vec![square(20.0, 20.0, 5.0)])),
            state("B", Geometry::Polygon(vec![square(0.0, 0.0, 10.0)])),
            state("C", Geometry::Polygon(vec![square(0.0, 0.0, 10.0)])),
            state(
                "D",
                Geometry::MultiPolygon(vec![
                    vec![square(40.0, 40.0, 1.0)],
                    vec![dense_square(30.0, 0.0, 10.0, 25)],
                ]),
            ),
            state("E", Geometry::empty()),
        ];
        let index = SpatialIndex::build(&features);
        assert_eq!(index.len(), 4);

        for x in -2..45 {
            for y in -2..45 {
                let point = [f64::from(x) + 0.5, f64::from(y) + 0.5];
                assert_eq!(
                    index.locate(point),
                    locate(point, &features),
                    "mismatch at {point:?}"
                );
            }
        }
    }

    #[test]
    fn empty_index() {
        let index = SpatialIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.locate([0.0, 0.0]), None);
    }
}
