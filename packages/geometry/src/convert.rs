//! Converts remote `ArcGIS` records into normalized [`Feature`] values.
//!
//! Every ring is reprojected from Web Mercator to degrees. A record with a
//! single ring becomes a `Polygon`; a record with several rings becomes a
//! `MultiPolygon` in which each ring is its own single-ring polygon. No
//! attempt is made to detect holes and attach them to a parent ring, so a
//! boundary with a true interior hole renders the hole as an island.

use region_map_geometry_models::remote::{ProjectedRing, RemoteRecord};
use region_map_geometry_models::{
    CountyProperties, EntityKind, Feature, FeatureCollection, FeatureProperties, Geometry, Ring,
    StateProperties, fips,
};

use crate::projection::web_mercator_to_lon_lat;

/// Rings with fewer points than this are dropped when building a
/// `MultiPolygon`.
pub const MIN_RING_POINTS: usize = 4;

/// Entity name attribute.
pub const NAME_FIELD: &str = "NAME";
/// State FIPS attribute, present on both layers.
pub const STATE_FIELD: &str = "STATE";
/// Population attribute on the county layer.
pub const POPULATION_FIELD: &str = "POP100";
/// Abbreviation attributes, in lookup order.
const ABBR_FIELDS: &[&str] = &["STATE_ABBR", "STUSPS"];

/// The `outFields` to request for a layer.
#[must_use]
pub const fn out_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::State => &[NAME_FIELD, STATE_FIELD],
        EntityKind::County => &[NAME_FIELD, STATE_FIELD, POPULATION_FIELD],
    }
}

/// Converts every record of a layer, preserving order.
#[must_use]
pub fn convert_records(records: &[RemoteRecord], kind: EntityKind) -> FeatureCollection {
    records
        .iter()
        .map(|record| convert_record(record, kind))
        .collect::<Vec<_>>()
        .into()
}

/// Converts a single remote record. Never fails: a record without rings
/// yields an empty `Polygon`.
#[must_use]
pub fn convert_record(record: &RemoteRecord, kind: EntityKind) -> Feature {
    let rings: Vec<Ring> = record.rings.iter().map(project_ring).collect();

    let properties = match kind {
        EntityKind::State => FeatureProperties::State(state_properties(record)),
        EntityKind::County => FeatureProperties::County(county_properties(record)),
    };

    let geometry = rings_to_geometry(rings);
    if geometry.is_empty() {
        log::debug!("{kind} '{}' has no usable geometry", properties.name());
    }

    Feature {
        geometry,
        properties,
    }
}

fn project_ring(ring: &ProjectedRing) -> Ring {
    ring.iter()
        .map(|&[x, y]| web_mercator_to_lon_lat(x, y))
        .collect()
}

fn rings_to_geometry(mut rings: Vec<Ring>) -> Geometry {
    match rings.len() {
        0 => Geometry::empty(),
        // A lone ring is kept even when degenerate; hit-testing guards
        // against short rings itself.
        1 => Geometry::Polygon(vec![rings.remove(0)]),
        total => {
            let polygons: Vec<Vec<Ring>> = rings
                .into_iter()
                .filter(|ring| ring.len() >= MIN_RING_POINTS)
                .map(|ring| vec![ring])
                .collect();
            if polygons.len() < total {
                log::debug!(
                    "dropped {} degenerate ring(s) of {total}",
                    total - polygons.len()
                );
            }
            Geometry::MultiPolygon(polygons)
        }
    }
}

fn state_properties(record: &RemoteRecord) -> StateProperties {
    let name = record.attribute_str(NAME_FIELD).unwrap_or_default();

    let abbr = ABBR_FIELDS
        .iter()
        .find_map(|field| record.attribute_str(field))
        .or_else(|| fips::name_to_abbr(&name).map(str::to_string))
        .unwrap_or_else(|| fallback_abbr(&name));

    StateProperties {
        abbr,
        fips: record.attribute_str(STATE_FIELD).unwrap_or_default(),
        name,
    }
}

fn county_properties(record: &RemoteRecord) -> CountyProperties {
    CountyProperties {
        name: record.attribute_str(NAME_FIELD).unwrap_or_default(),
        state_fips: record.attribute_str(STATE_FIELD).unwrap_or_default(),
        population: record.attribute_f64(POPULATION_FIELD).unwrap_or(0.0),
    }
}

/// First two characters of the name, uppercased.
fn fallback_abbr(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> RemoteRecord {
        RemoteRecord::from_feature(&value)
    }

    fn ring(points: usize) -> serde_json::Value {
        let pts: Vec<[f64; 2]> = (0..points)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let v = i as f64 * 1000.0;
                [v, v * 2.0]
            })
            .collect();
        json!(pts)
    }

    #[test]
    fn single_ring_becomes_polygon() {
        let feature = convert_record(
            &record(json!({
                "attributes": { "NAME": "Nevada", "STATE": "32" },
                "geometry": { "rings": [ring(5)] }
            })),
            EntityKind::State,
        );

        let Geometry::Polygon(rings) = &feature.geometry else {
            panic!("expected Polygon, got {:?}", feature.geometry);
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0][0], [0.0, 0.0]);
    }

    #[test]
    fn single_degenerate_ring_is_kept() {
        let feature = convert_record(
            &record(json!({ "geometry": { "rings": [ring(2)] } })),
            EntityKind::County,
        );
        let expected = vec![[0.0, 0.0], web_mercator_to_lon_lat(1000.0, 2000.0)];
        assert_eq!(feature.geometry, Geometry::Polygon(vec![expected]));
    }

    #[test]
    fn multiple_rings_become_independent_polygons() {
        let feature = convert_record(
            &record(json!({
                "attributes": { "NAME": "Hawaii", "STATE": "15" },
                "geometry": { "rings": [ring(120), ring(3), ring(4), ring(10)] }
            })),
            EntityKind::State,
        );

        let Geometry::MultiPolygon(polygons) = &feature.geometry else {
            panic!("expected MultiPolygon, got {:?}", feature.geometry);
        };
        let sizes: Vec<_> = polygons.iter().map(|p| (p.len(), p[0].len())).collect();
        assert_eq!(sizes, vec![(1, 120), (1, 4), (1, 10)]);
    }

    #[test]
    fn all_rings_degenerate_leaves_empty_multipolygon() {
        let feature = convert_record(
            &record(json!({ "geometry": { "rings": [ring(3), ring(1)] } })),
            EntityKind::County,
        );
        assert_eq!(feature.geometry, Geometry::MultiPolygon(vec![]));
    }

    #[test]
    fn missing_geometry_becomes_empty_polygon() {
        let feature = convert_record(
            &record(json!({ "attributes": { "NAME": "Nowhere", "STATE": "99" } })),
            EntityKind::County,
        );
        assert_eq!(feature.geometry, Geometry::empty());
        assert_eq!(feature.name(), "Nowhere");
    }

    #[test]
    fn state_abbreviation_prefers_remote_attribute() {
        let feature = convert_record(
            &record(json!({ "attributes": { "NAME": "Nevada", "STUSPS": "nv", "STATE": "32" } })),
            EntityKind::State,
        );
        let FeatureProperties::State(props) = feature.properties else {
            panic!("expected state properties");
        };
        assert_eq!(props.abbr, "nv");
        assert_eq!(props.fips, "32");
    }

    #[test]
    fn state_abbreviation_falls_back_to_lookup_then_prefix() {
        let lookup = convert_record(
            &record(json!({ "attributes": { "NAME": "New Mexico", "STATE": "35" } })),
            EntityKind::State,
        );
        let FeatureProperties::State(props) = lookup.properties else {
            panic!("expected state properties");
        };
        assert_eq!(props.abbr, "NM");

        let prefix = convert_record(
            &record(json!({ "attributes": { "NAME": "atlantis" } })),
            EntityKind::State,
        );
        let FeatureProperties::State(props) = prefix.properties else {
            panic!("expected state properties");
        };
        assert_eq!(props.abbr, "AT");
        assert_eq!(props.fips, "");
    }

    #[test]
    fn county_population_defaults_to_zero() {
        for attributes in [
            json!({ "NAME": "A", "STATE": "01" }),
            json!({ "NAME": "A", "STATE": "01", "POP100": null }),
        ] {
            let feature = convert_record(
                &record(json!({ "attributes": attributes })),
                EntityKind::County,
            );
            assert_eq!(feature.properties.measure(), Some(0.0));
            assert_eq!(feature.properties.parent_fips(), Some("01"));
        }
    }

    #[test]
    fn convert_records_preserves_order() {
        let records = vec![
            record(json!({ "attributes": { "NAME": "B" } })),
            record(json!({ "attributes": { "NAME": "A" } })),
        ];
        let collection = convert_records(&records, EntityKind::County);
        let names: Vec<_> = collection.iter().map(Feature::name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn out_fields_per_kind() {
        assert_eq!(out_fields(EntityKind::State), &["NAME", "STATE"]);
        assert_eq!(out_fields(EntityKind::County), &["NAME", "STATE", "POP100"]);
    }
}
