#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary geometry and feature types.
//!
//! These types are the normalized shape of every administrative boundary
//! after it leaves the remote service: geographic positions in degrees,
//! explicit `Polygon`/`MultiPolygon` geometry, and typed properties for
//! states and counties. They serialize to the `GeoJSON` geometry layout so
//! the rendering layer can consume them directly.

pub mod fips;
pub mod remote;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A `[longitude, latitude]` pair in degrees.
pub type Position = [f64; 2];

/// An ordered, implicitly closed sequence of positions.
pub type Ring = Vec<Position>;

/// Polygon geometry of a single boundary.
///
/// The first ring of every polygon is its exterior boundary. Interior
/// holes are not modeled; the remote service only supplies exterior rings
/// per sub-polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// One polygon, given as its rings.
    Polygon(Vec<Ring>),
    /// Several polygons, each given as its rings.
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// An empty `Polygon`, used when a record carries no usable geometry.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Polygon(Vec::new())
    }

    /// Returns `true` if the geometry has no positions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Returns the exterior ring of every polygon, in declared order.
    ///
    /// A `Polygon` with no rings yields nothing.
    #[must_use]
    pub fn exterior_rings(&self) -> Vec<&Ring> {
        match self {
            Self::Polygon(rings) => rings.first().into_iter().collect(),
            Self::MultiPolygon(polygons) => polygons.iter().filter_map(|p| p.first()).collect(),
        }
    }

    /// Number of polygons in the geometry.
    #[must_use]
    pub fn polygon_count(&self) -> usize {
        match self {
            Self::Polygon(rings) => usize::from(!rings.is_empty()),
            Self::MultiPolygon(polygons) => polygons.len(),
        }
    }

    /// Total number of positions across all rings.
    #[must_use]
    pub fn point_count(&self) -> usize {
        match self {
            Self::Polygon(rings) => rings.iter().map(Vec::len).sum(),
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|p| p.iter())
                .map(Vec::len)
                .sum(),
        }
    }
}

/// Which layer a boundary record came from. Drives property extraction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    /// Top-level administrative area (state or state-equivalent).
    State,
    /// Area nested within a state (county or county-equivalent).
    County,
}

/// Properties of a state feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateProperties {
    /// Full state name (e.g. "Nevada").
    #[serde(rename = "NAME")]
    pub name: String,
    /// Two-letter postal abbreviation (e.g. "NV").
    #[serde(rename = "STUSPS")]
    pub abbr: String,
    /// Two-digit state FIPS code (e.g. "32"). Empty if the service omitted it.
    #[serde(rename = "STATE")]
    pub fips: String,
}

/// Properties of a county feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyProperties {
    /// County name (e.g. "Allen Parish").
    #[serde(rename = "NAME")]
    pub name: String,
    /// FIPS code of the parent state.
    #[serde(rename = "STATE")]
    pub state_fips: String,
    /// Census population count. Zero when the service has no value.
    #[serde(rename = "POP100")]
    pub population: f64,
}

/// Typed feature properties.
///
/// Serialized untagged so the output matches the flat attribute layout of
/// the remote layers (`NAME`, `STUSPS`, `STATE`, `POP100`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureProperties {
    /// A state boundary.
    State(StateProperties),
    /// A county boundary.
    County(CountyProperties),
}

impl FeatureProperties {
    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::State(p) => &p.name,
            Self::County(p) => &p.name,
        }
    }

    /// Returns which layer these properties belong to.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::State(_) => EntityKind::State,
            Self::County(_) => EntityKind::County,
        }
    }

    /// FIPS code of the parent state, for sub-state entities only.
    #[must_use]
    pub fn parent_fips(&self) -> Option<&str> {
        match self {
            Self::State(_) => None,
            Self::County(p) => Some(&p.state_fips),
        }
    }

    /// The numeric measure used for classification, if this kind has one.
    #[must_use]
    pub const fn measure(&self) -> Option<f64> {
        match self {
            Self::State(_) => None,
            Self::County(p) => Some(p.population),
        }
    }
}

/// A boundary geometry with its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Boundary polygons in geographic degrees.
    pub geometry: Geometry,
    /// Entity properties.
    pub properties: FeatureProperties,
}

impl Feature {
    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.properties.name()
    }
}

/// An ordered set of features, as handed to the rendering layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Features in acquisition order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates over the features in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Ring {
        vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]
    }

    #[test]
    fn empty_geometry_has_no_points() {
        let geometry = Geometry::empty();
        assert!(geometry.is_empty());
        assert_eq!(geometry.polygon_count(), 0);
        assert!(geometry.exterior_rings().is_empty());
    }

    #[test]
    fn multipolygon_exterior_rings_keep_order() {
        let mut other = square();
        other.push([0.5, 0.5]);
        let geometry = Geometry::MultiPolygon(vec![vec![square()], vec![other.clone()]]);

        let rings = geometry.exterior_rings();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1], &other);
        assert_eq!(geometry.point_count(), 9);
    }

    #[test]
    fn geometry_serializes_as_geojson_layout() {
        let geometry = Geometry::Polygon(vec![square()]);
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(json["type"], "Polygon");
        assert_eq!(json["coordinates"][0][2][0], 1.0);
    }

    #[test]
    fn properties_roundtrip_through_flat_attributes() {
        let county = FeatureProperties::County(CountyProperties {
            name: "Allen Parish".to_string(),
            state_fips: "22".to_string(),
            population: 22750.0,
        });
        let json = serde_json::to_value(&county).unwrap();
        assert_eq!(json["POP100"], 22750.0);

        let back: FeatureProperties = serde_json::from_value(json).unwrap();
        assert_eq!(back, county);
        assert_eq!(back.parent_fips(), Some("22"));
        assert_eq!(back.kind(), EntityKind::County);

        let state: FeatureProperties = serde_json::from_value(serde_json::json!({
            "NAME": "Nevada",
            "STUSPS": "NV",
            "STATE": "32",
        }))
        .unwrap();
        assert_eq!(state.kind(), EntityKind::State);
        assert_eq!(state.parent_fips(), None);
        assert_eq!(state.measure(), None);
    }

    #[test]
    fn entity_kind_parses_case_insensitively() {
        assert_eq!("County".parse::<EntityKind>().unwrap(), EntityKind::County);
        assert_eq!(EntityKind::State.to_string(), "state");
    }
}
